//! pact_proto — handshake protocol, wire types, and serialisation for Pact
//!
//! All transmitted and persisted types serialise to JSON and carry a
//! protocol version so the format can evolve without breaking peers.
//!
//! # Modules
//! - `handshake` — peer negotiation: entropy, sort-order agreement, pepper
//! - `strategy`  — per-peer capability-bundle configs (storage + cipher)
//! - `message`   — plaintext message payload carried inside stored blobs
//! - `chatlog`   — append-only, deduplicated, chronologically ordered log

pub mod chatlog;
pub mod handshake;
pub mod message;
pub mod strategy;

pub use chatlog::{ChatLog, ChatLogEntry};
pub use handshake::{Entropy, Handshake, HandshakeError, Negotiator, PeerConfig, Role};
pub use message::ChatData;
pub use strategy::{StrategyConfig, StrategyPeerConfig};

/// Protocol version spoken by this crate.
pub const VERSION: &str = "0.0.1";
