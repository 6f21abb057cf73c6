//! pact_crypto — cryptographic primitives for the Pact messaging protocol
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize secret material on drop.
//! - Everything in `lookup` is a pure function of its inputs: both parties
//!   must be able to derive byte-identical pools with no communication.
//!
//! # Module layout
//! - `cipher` — chunked XChaCha20-Poly1305 encrypt/decrypt
//! - `kdf`    — Argon2id profile-key derivation
//! - `hash`   — BLAKE3 utilities (content addresses, pepper hashing)
//! - `lookup` — deterministic one-time lookup pools
//! - `random` — OS randomness helpers
//! - `error`  — unified error type

pub mod cipher;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod lookup;
pub mod random;

pub use cipher::{Cipher, CipherConfig, CipherKind, NonceKind};
pub use error::CryptoError;
pub use lookup::LookupPool;
