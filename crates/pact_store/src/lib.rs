//! pact_store — storage collaborators, profiles, and the chat session
//!
//! This crate hosts everything that touches durable state:
//! - `backend`  — the closed set of key/value storage backends (local KV,
//!   content-addressed blob store, overwritable rendezvous record)
//! - `strategy` — the live per-peer capability bundle built from configs
//! - `profile`  — password-unlocked, encrypted-at-rest profiles
//! - `chat`     — chat state, peers, and the persisted key layout
//! - `session`  — the orchestrator: unlock, handshakes, and the message
//!   send/retrieve protocol
//!
//! # Concurrency contract
//! Everything here is single-threaded and synchronous. The lookup pools are
//! read-modify-write against durable storage: callers must guarantee at most
//! one in-flight pop-and-persist per (chat, peer) pool at a time. A crash
//! after a pop is persisted but before the dependent write lands burns one
//! token, which is safe; a concurrent double-pop is not.

pub mod backend;
pub mod chat;
pub mod error;
pub mod profile;
pub mod session;
pub mod strategy;

pub use backend::Store;
pub use error::StoreError;
pub use session::{Session, SessionOptions};
pub use strategy::Strategy;
