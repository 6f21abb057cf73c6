//! Strategy configs — the per-peer capability bundle of
//! {rendezvous, message store, cipher}, in its two serialisable forms.
//!
//! `StrategyPeerConfig` is the public, transmissible subset: read-only
//! endpoints plus the consensus rule, shared during handshake. It never
//! carries write endpoints or credentials.
//!
//! `StrategyConfig` is the full subset including write endpoints, for local
//! persistence only.
//!
//! Backends are a closed set of kinds; each config carries its own node list
//! rather than live connections, so configs stay pure data.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use pact_crypto::cipher::CipherConfig;

/// Closed set of storage backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Local key/value store. Private; never shared with peers.
    Kv,
    /// Content-addressed blob store (the message store).
    Blob,
    /// Single overwritable signed-record slot (the rendezvous).
    Record,
}

/// How multiple configured nodes are combined into one result.
/// Only `FirstSuccess` is implemented by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusRule {
    #[default]
    FirstSuccess,
    RedundantPair,
    Majority,
    Unanimous,
}

/// A single storage endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Node {
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub settings: HashMap<String, String>,
}

impl Node {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Public, transmissible view of a storage backend: read endpoints only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStorageConfig {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_nodes: Vec<Node>,
    #[serde(default)]
    pub read_rule: ConsensusRule,
}

/// Full view of a storage backend, for local persistence only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write_nodes: Vec<Node>,
    #[serde(default)]
    pub read_rule: ConsensusRule,
    #[serde(default)]
    pub write_rule: ConsensusRule,
}

impl StorageConfig {
    /// The shareable read-only view. Falls back to the write nodes when no
    /// separate read endpoints are configured (symmetric backends).
    pub fn share(&self) -> PeerStorageConfig {
        let read_nodes = if self.read_nodes.is_empty() {
            self.write_nodes.clone()
        } else {
            self.read_nodes.clone()
        };
        PeerStorageConfig {
            kind: self.kind,
            read_nodes,
            read_rule: self.read_rule,
        }
    }

    /// Rebuild a local config from a peer's shared view. Read-only: the
    /// write side stays empty, so this config can never publish.
    pub fn from_peer(peer: PeerStorageConfig) -> Self {
        Self {
            kind: peer.kind,
            read_nodes: peer.read_nodes,
            write_nodes: Vec::new(),
            read_rule: peer.read_rule,
            write_rule: ConsensusRule::default(),
        }
    }
}

/// Transmissible strategy bundle, shared during handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPeerConfig {
    pub rendezvous: PeerStorageConfig,
    #[serde(rename = "storage")]
    pub message_store: PeerStorageConfig,
    pub cipher: CipherConfig,
}

/// Full strategy bundle, for local persistence only — never transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub rendezvous: StorageConfig,
    #[serde(rename = "storage")]
    pub message_store: StorageConfig,
    pub cipher: CipherConfig,
}

impl StrategyConfig {
    /// Public subset for handshake exchange.
    pub fn share(&self) -> StrategyPeerConfig {
        StrategyPeerConfig {
            rendezvous: self.rendezvous.share(),
            message_store: self.message_store.share(),
            cipher: self.cipher,
        }
    }

    /// Rebuild a read-only strategy config from a peer's shared view.
    pub fn from_peer(peer: StrategyPeerConfig) -> Self {
        Self {
            rendezvous: StorageConfig::from_peer(peer.rendezvous),
            message_store: StorageConfig::from_peer(peer.message_store),
            cipher: peer.cipher,
        }
    }
}
