//! The live per-peer capability bundle: rendezvous + message store + cipher.
//!
//! A strategy is how this party reaches exactly one counterparty (or
//! publishes for them). Own strategies carry write endpoints; strategies
//! imported from a peer's shared config are read-only.

use pact_crypto::cipher::Cipher;
use pact_crypto::random::rand_hex;
use pact_proto::strategy::{
    ConsensusRule, Node, StorageConfig, StorageKind, StrategyConfig, StrategyPeerConfig,
};

use crate::backend::Store;
use crate::error::StoreError;

#[derive(Debug)]
pub struct Strategy {
    pub rendezvous: Store,
    pub message_store: Store,
    pub cipher: Cipher,
}

impl Strategy {
    /// Build live backends from a full (or peer-derived read-only) config.
    pub fn from_config(config: &StrategyConfig) -> Result<Self, StoreError> {
        Ok(Self {
            rendezvous: Store::from_config(&config.rendezvous)?,
            message_store: Store::from_config(&config.message_store)?,
            cipher: Cipher::from_config(&config.cipher)?,
        })
    }

    /// Public, transmissible subset: read endpoints + consensus rule.
    pub fn share(&self) -> Result<StrategyPeerConfig, StoreError> {
        Ok(StrategyPeerConfig {
            rendezvous: self.rendezvous.share()?,
            message_store: self.message_store.share()?,
            cipher: self.cipher.config(),
        })
    }

    /// Full subset including write endpoints, for local persistence only.
    pub fn export(&self) -> Result<StrategyConfig, StoreError> {
        Ok(StrategyConfig {
            rendezvous: self.rendezvous.export()?,
            message_store: self.message_store.export()?,
            cipher: self.cipher.config(),
        })
    }
}

/// Default strategy config for a fresh handshake position: one rendezvous
/// record slot and one content-addressed message store, each under a fresh
/// random namespace, with the default cipher.
pub fn default_strategy_config() -> StrategyConfig {
    StrategyConfig {
        rendezvous: symmetric_config(StorageKind::Record, format!("mem://rdv-{}", rand_hex(9))),
        message_store: symmetric_config(StorageKind::Blob, format!("mem://msg-{}", rand_hex(9))),
        cipher: Cipher::default().config(),
    }
}

/// A config whose read and write sides hit the same single node.
fn symmetric_config(kind: StorageKind, url: String) -> StorageConfig {
    let node = vec![Node::new(url)];
    StorageConfig {
        kind,
        read_nodes: node.clone(),
        write_nodes: node,
        read_rule: ConsensusRule::FirstSuccess,
        write_rule: ConsensusRule::FirstSuccess,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_live_strategy() {
        let config = default_strategy_config();
        let strategy = Strategy::from_config(&config).unwrap();
        assert_eq!(strategy.export().unwrap(), config);
    }

    #[test]
    fn shared_view_loses_nothing_needed_for_reads() {
        let config = default_strategy_config();
        let strategy = Strategy::from_config(&config).unwrap();
        let peer_view = strategy.share().unwrap();
        let rebuilt = Strategy::from_config(&StrategyConfig::from_peer(peer_view)).unwrap();
        // The rebuilt strategy can read but has no write endpoints.
        let exported = rebuilt.export().unwrap();
        assert!(exported.rendezvous.write_nodes.is_empty());
        assert!(!exported.rendezvous.read_nodes.is_empty());
    }

    #[test]
    fn fresh_defaults_use_distinct_namespaces() {
        let a = default_strategy_config();
        let b = default_strategy_config();
        assert_ne!(
            a.rendezvous.write_nodes[0].url,
            b.rendezvous.write_nodes[0].url
        );
    }
}
