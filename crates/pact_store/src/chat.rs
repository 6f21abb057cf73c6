//! Chat state and its persisted key layout.
//!
//! A chat is the durable outcome of a consumed handshake: one entry per
//! negotiator (ourselves included), each holding a live [`Strategy`] for
//! reaching that party. Everything is keyed under the owning profile:
//!
//! ```text
//! chats/{chat_id}/{profile_id}/config             chat config
//! chats/{chat_id}/{profile_id}/chatlog            decrypted message log
//! chats/{chat_id}/{profile_id}/lookups/{peer_id}  one pool per peer
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use pact_proto::strategy::StrategyConfig;

use crate::error::StoreError;
use crate::strategy::Strategy;

/// Default message TTL in seconds (one week).
pub const DEFAULT_CHAT_TTL: i64 = 604_800;

/// Upper bound on a plaintext message payload in bytes.
pub const MAX_MESSAGE_SIZE: usize = 250_000;

/// One party to a chat, ourselves included. The peer id is random and local;
/// each participant names the same counterparty differently.
#[derive(Debug)]
pub struct ChatPeer {
    pub id: String,
    pub alias: String,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub max_ttl: i64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_ttl: DEFAULT_CHAT_TTL,
        }
    }
}

/// An established chat, rebuilt from its stored config on load.
#[derive(Debug)]
pub struct Chat {
    pub id: String,
    /// Which entry in `peers` is us. Our strategy is the only one with
    /// write endpoints.
    pub own_peer_id: String,
    /// Content hash of our most recently sent message; parent of the next.
    pub last_sent: String,
    pub peers: HashMap<String, ChatPeer>,
    pub settings: ChatSettings,
}

impl Chat {
    /// Effective message TTL for this chat.
    pub fn ttl(&self) -> i64 {
        if self.settings.max_ttl > 0 {
            self.settings.max_ttl
        } else {
            DEFAULT_CHAT_TTL
        }
    }

    pub fn own_peer(&self) -> Result<&ChatPeer, StoreError> {
        self.peers
            .get(&self.own_peer_id)
            .ok_or(StoreError::OwnPeerNotFound)
    }

    /// Serializable form for local persistence.
    pub fn config(&self) -> Result<ChatConfig, StoreError> {
        let mut peers = HashMap::with_capacity(self.peers.len());
        for (id, peer) in &self.peers {
            peers.insert(
                id.clone(),
                ChatPeerConfig {
                    id: peer.id.clone(),
                    alias: peer.alias.clone(),
                    strategy: peer.strategy.export()?,
                },
            );
        }
        Ok(ChatConfig {
            id: self.id.clone(),
            own_peer_id: self.own_peer_id.clone(),
            last_sent: self.last_sent.clone(),
            peers,
            settings: self.settings,
        })
    }

    /// Rebuild live backends from a stored config.
    pub fn from_config(config: ChatConfig) -> Result<Self, StoreError> {
        let mut peers = HashMap::with_capacity(config.peers.len());
        for (id, peer) in config.peers {
            peers.insert(
                id,
                ChatPeer {
                    id: peer.id,
                    alias: peer.alias,
                    strategy: Strategy::from_config(&peer.strategy)?,
                },
            );
        }
        Ok(Self {
            id: config.id,
            own_peer_id: config.own_peer_id,
            last_sent: config.last_sent,
            peers,
            settings: config.settings,
        })
    }
}

/// Persisted form of a [`Chat`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub id: String,
    pub own_peer_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_sent: String,
    pub peers: HashMap<String, ChatPeerConfig>,
    #[serde(default)]
    pub settings: ChatSettings,
}

/// Persisted form of a [`ChatPeer`]. Our own entry carries write endpoints;
/// imported peer entries are read-only views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPeerConfig {
    pub id: String,
    pub alias: String,
    pub strategy: StrategyConfig,
}

/// Key prefix holding everything a profile stores for one chat.
pub fn chat_prefix(chat_id: &str, profile_id: &str) -> String {
    format!("chats/{chat_id}/{profile_id}/")
}

pub fn config_key(chat_id: &str, profile_id: &str) -> String {
    format!("chats/{chat_id}/{profile_id}/config")
}

pub fn chatlog_key(chat_id: &str, profile_id: &str) -> String {
    format!("chats/{chat_id}/{profile_id}/chatlog")
}

pub fn lookup_key(chat_id: &str, profile_id: &str, peer_id: &str) -> String {
    format!("chats/{chat_id}/{profile_id}/lookups/{peer_id}")
}

/// Distinct chat ids among stored keys that belong to `profile_id`.
pub fn unique_chat_ids(paths: &[String], profile_id: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for path in paths {
        let mut parts = path.split('/');
        let (Some("chats"), Some(chat_id), Some(owner)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if owner != profile_id {
            continue;
        }
        if !ids.iter().any(|id| id == chat_id) {
            ids.push(chat_id.to_string());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::default_strategy_config;

    fn sample_chat() -> Chat {
        let mut peers = HashMap::new();
        for (id, alias) in [("peer-aaaa", "alfa"), ("peer-bbbb", "bravo")] {
            peers.insert(
                id.to_string(),
                ChatPeer {
                    id: id.to_string(),
                    alias: alias.to_string(),
                    strategy: Strategy::from_config(&default_strategy_config()).unwrap(),
                },
            );
        }
        Chat {
            id: "chat-1234".into(),
            own_peer_id: "peer-aaaa".into(),
            last_sent: String::new(),
            peers,
            settings: ChatSettings::default(),
        }
    }

    #[test]
    fn config_roundtrip() {
        let chat = sample_chat();
        let config = chat.config().unwrap();
        let json = serde_json::to_vec(&config).unwrap();
        let back = Chat::from_config(serde_json::from_slice(&json).unwrap()).unwrap();
        assert_eq!(back.id, chat.id);
        assert_eq!(back.own_peer_id, chat.own_peer_id);
        assert_eq!(back.peers.len(), 2);
        assert_eq!(back.ttl(), DEFAULT_CHAT_TTL);
    }

    #[test]
    fn own_peer_lookup() {
        let mut chat = sample_chat();
        assert_eq!(chat.own_peer().unwrap().alias, "alfa");
        chat.own_peer_id = "nobody".into();
        assert!(matches!(chat.own_peer(), Err(StoreError::OwnPeerNotFound)));
    }

    #[test]
    fn unique_chat_ids_filters_by_profile() {
        let paths = vec![
            "chats/c1/me/config".to_string(),
            "chats/c1/me/chatlog".to_string(),
            "chats/c1/me/lookups/p1".to_string(),
            "chats/c2/me/config".to_string(),
            "chats/c3/other/config".to_string(),
            "profiles/me".to_string(),
        ];
        assert_eq!(unique_chat_ids(&paths, "me"), ["c1", "c2"]);
    }

    #[test]
    fn zero_ttl_falls_back_to_default() {
        let mut chat = sample_chat();
        chat.settings.max_ttl = 0;
        assert_eq!(chat.ttl(), DEFAULT_CHAT_TTL);
    }
}
