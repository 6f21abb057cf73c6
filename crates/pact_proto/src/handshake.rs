//! Peer negotiation.
//!
//! A handshake lets 2+ parties agree on a total sort order and exchange
//! per-peer strategy metadata before any conversation exists. Each party's
//! sole identifying secret is 96 bytes of fresh entropy; once every party
//! holds every negotiator in an agreed order, both sides independently
//! derive the shared 64-byte pepper from the ordered entropy and the
//! handshake is consumed by chat creation.
//!
//! Pepper agreement is the root correctness invariant of the whole system:
//! both parties must compute byte-identical peppers or their lookup pools
//! will never line up.
//!
//! State machine:
//!   Created → (add_peer)* → all_peers_received
//!           → (get_all_configs | sorted_negotiators) → consumed by Chat

use rand::{rngs::OsRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use pact_crypto::hash::hash512;

use crate::strategy::{StrategyConfig, StrategyPeerConfig};

/// Entropy length in bytes; the sole secret identifying a party's position.
pub const ENTROPY_LEN: usize = 96;

/// How many leading entropy bytes feed the pepper.
const PEPPER_SEED_LEN: usize = 32;

/// Default-alias wordlist.
const WORDLIST: [&str; 26] = [
    "alfa", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliett",
    "kilo", "lima", "mike", "november", "oscar", "papa", "quebec", "romeo", "sierra", "tango",
    "uniform", "victor", "whiskey", "x-ray", "yankee", "zulu",
];

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("peer config carries an invalid sort order")]
    InvalidSortOrder,

    #[error("duplicate entropy detected, peers must be unique")]
    DuplicatePeer,

    #[error("initiator position does not match the first negotiator")]
    SortOrderMismatch,

    #[error("sorted negotiator list failed validation (gap, collision, or unassigned entry)")]
    InvalidSortValidation,

    #[error("at least two peers must be present")]
    InsufficientPeers,

    #[error("negotiator count does not match the expected peer total")]
    CountMismatch,

    #[error("only an initiator may produce the personalized config set")]
    NotInitiator,

    #[error("entropy must be {ENTROPY_LEN} base64-decoded bytes")]
    InvalidEntropy,

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

/// 96 bytes of randomness uniquely identifying a handshake participant's
/// position. Generated once per party per handshake; zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Entropy([u8; ENTROPY_LEN]);

impl Entropy {
    /// Fresh entropy from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; ENTROPY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ENTROPY_LEN] {
        &self.0
    }

    /// The leading 32 bytes contributed to the pepper.
    pub fn seed(&self) -> &[u8] {
        &self.0[..PEPPER_SEED_LEN]
    }

    pub fn to_base64(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        STANDARD.encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, HandshakeError> {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        let raw = STANDARD
            .decode(encoded)
            .map_err(|_| HandshakeError::InvalidEntropy)?;
        let bytes: [u8; ENTROPY_LEN] = raw
            .try_into()
            .map_err(|_| HandshakeError::InvalidEntropy)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.write_str("Entropy(..)")
    }
}

/// The two handshake roles. The initiator collects every position and deals
/// out personalized configs; peers receive theirs out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Peer,
}

/// A handshake participant: entropy + alias + strategy + assigned sort order.
#[derive(Debug, Clone)]
pub struct Negotiator {
    pub entropy: Entropy,
    pub alias: String,
    pub strategy: StrategyConfig,
    /// 1-indexed position in the agreed order; 0 until assigned.
    pub sort_order: usize,
}

/// JSON wire form of one negotiator, exchanged out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Base64 of the 96 entropy bytes.
    pub entropy: String,
    pub alias: String,
    /// Public strategy subset; never raw credentials.
    pub config: StrategyPeerConfig,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub item: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub total_items: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Negotiator {
    fn from_config(config: PeerConfig) -> Result<Self, HandshakeError> {
        Ok(Self {
            entropy: Entropy::from_base64(&config.entropy)?,
            alias: config.alias,
            strategy: StrategyConfig::from_peer(config.config),
            sort_order: config.item,
        })
    }

    /// The transmissible form of this negotiator, without sort metadata.
    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            entropy: self.entropy.to_base64(),
            alias: self.alias.clone(),
            config: self.strategy.share(),
            item: 0,
            total_items: 0,
        }
    }

    /// Serialize the peer config for out-of-band transmission.
    pub fn share(&self) -> Result<Vec<u8>, HandshakeError> {
        Ok(serde_json::to_vec(&self.peer_config())?)
    }
}

/// An in-progress peer negotiation. Owned exclusively by a session for its
/// lifetime and destroyed the instant it converts into a chat.
#[derive(Debug)]
pub struct Handshake {
    role: Role,
    position: Negotiator,
    negotiators: Vec<Negotiator>,
    peer_total: usize,
}

impl Handshake {
    /// Create a handshake with fresh entropy and the given strategy config.
    /// Default alias: three random phonetic words.
    pub fn new(role: Role, strategy: StrategyConfig, alias: Option<String>) -> Self {
        let position = Negotiator {
            entropy: Entropy::generate(),
            alias: alias.unwrap_or_else(gen_alias),
            strategy,
            sort_order: 0,
        };
        let mut negotiators = Vec::new();
        if role == Role::Initiator {
            negotiators.push(position.clone());
        }
        Self {
            role,
            position,
            negotiators,
            peer_total: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// This party's own negotiator.
    pub fn position(&self) -> &Negotiator {
        &self.position
    }

    pub fn negotiator_count(&self) -> usize {
        self.negotiators.len()
    }

    pub fn peer_total(&self) -> usize {
        self.peer_total
    }

    /// Serialize this party's position for the counterparty.
    pub fn share_position(&self) -> Result<Vec<u8>, HandshakeError> {
        self.position.share()
    }

    /// Add a counterparty's config to the negotiation.
    ///
    /// Peer role: the config must carry a valid `item`/`total_items`
    /// assignment. The 2-party fast path applies when this peer receives
    /// item 1 of 2 — its own position is auto-appended as sort order 2, so
    /// no extra round trip is needed.
    pub fn add_peer(&mut self, config: PeerConfig) -> Result<(), HandshakeError> {
        if self.role == Role::Peer {
            if config.item == 0 || config.item > config.total_items {
                return Err(HandshakeError::InvalidSortOrder);
            }
            self.peer_total = config.total_items;
        }

        let two_party_fast_path = config.item == 1 && config.total_items == 2;
        let negotiator = Negotiator::from_config(config)?;
        if self
            .negotiators
            .iter()
            .any(|n| n.entropy == negotiator.entropy)
        {
            return Err(HandshakeError::DuplicatePeer);
        }
        self.negotiators.push(negotiator);

        if self.role == Role::Peer && two_party_fast_path {
            let mut own = self.position.clone();
            own.sort_order = 2;
            self.negotiators.push(own);
        }

        if self.role == Role::Initiator {
            self.peer_total = self.negotiators.len();
        }
        Ok(())
    }

    /// True iff the negotiator count matches a non-zero expected total.
    pub fn all_peers_received(&self) -> bool {
        !self.negotiators.is_empty()
            && self.peer_total > 0
            && self.negotiators.len() == self.peer_total
    }

    /// Initiator only: assign sort orders and return one personalized config
    /// per negotiator, each carrying its `item`/`total_items`, to be
    /// delivered out-of-band to the matching peer.
    pub fn get_all_configs(&mut self) -> Result<Vec<PeerConfig>, HandshakeError> {
        if self.role != Role::Initiator {
            return Err(HandshakeError::NotInitiator);
        }
        let total_items = self.negotiators.len();
        if total_items < 2 {
            return Err(HandshakeError::InsufficientPeers);
        }
        // The initiator must occupy slot one; anything else means the
        // negotiator list was built in the wrong order.
        if self.position.entropy != self.negotiators[0].entropy {
            return Err(HandshakeError::SortOrderMismatch);
        }
        self.peer_total = total_items;

        let mut configs = Vec::with_capacity(total_items);
        for (i, negotiator) in self.negotiators.iter_mut().enumerate() {
            let item = i + 1;
            negotiator.sort_order = item;
            let mut config = negotiator.peer_config();
            config.item = item;
            config.total_items = total_items;
            configs.push(config);
        }
        Ok(configs)
    }

    /// The final agreed ordering: each negotiator at index `sort_order - 1`.
    ///
    /// Detects gaps, collisions, and unassigned entries: after placement,
    /// every slot's sort order must equal its index + 1.
    pub fn sorted_negotiators(&self) -> Result<Vec<Negotiator>, HandshakeError> {
        let total = self.negotiators.len();
        if total < 2 {
            return Err(HandshakeError::InsufficientPeers);
        }
        if total != self.peer_total {
            return Err(HandshakeError::CountMismatch);
        }
        let mut sorted: Vec<Option<Negotiator>> = vec![None; total];
        for negotiator in &self.negotiators {
            if negotiator.sort_order < 1 || negotiator.sort_order > total {
                return Err(HandshakeError::InvalidSortOrder);
            }
            sorted[negotiator.sort_order - 1] = Some(negotiator.clone());
        }
        let sorted: Vec<Negotiator> = sorted
            .into_iter()
            .flatten()
            .collect();
        if sorted.len() != total {
            return Err(HandshakeError::InvalidSortValidation);
        }
        for (i, negotiator) in sorted.iter().enumerate() {
            if negotiator.sort_order != i + 1 {
                return Err(HandshakeError::InvalidSortValidation);
            }
        }
        Ok(sorted)
    }

    /// Derive the shared 64-byte pepper from the final ordering:
    /// hash512 of the concatenated first 32 entropy bytes of every
    /// negotiator in sort order.
    pub fn pepper(&self) -> Result<[u8; 64], HandshakeError> {
        let sorted = self.sorted_negotiators()?;
        Ok(pepper_from_negotiators(&sorted))
    }
}

/// Pepper derivation over an already sorted negotiator list.
pub fn pepper_from_negotiators(sorted: &[Negotiator]) -> [u8; 64] {
    let mut seeds = Vec::with_capacity(sorted.len() * PEPPER_SEED_LEN);
    for negotiator in sorted {
        seeds.extend_from_slice(negotiator.entropy.seed());
    }
    let pepper = hash512(&seeds);
    seeds.zeroize();
    pepper
}

/// Three random phonetic words, dash-joined.
pub fn gen_alias() -> String {
    let mut words = Vec::with_capacity(3);
    for _ in 0..3 {
        words.push(WORDLIST[OsRng.gen_range(0..WORDLIST.len())]);
    }
    words.join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ConsensusRule, Node, StorageConfig, StorageKind};
    use pact_crypto::cipher::CipherConfig;

    fn strategy(tag: &str) -> StrategyConfig {
        let store = |kind, url: String| StorageConfig {
            kind,
            read_nodes: vec![],
            write_nodes: vec![Node::new(url)],
            read_rule: ConsensusRule::FirstSuccess,
            write_rule: ConsensusRule::FirstSuccess,
        };
        StrategyConfig {
            rendezvous: store(StorageKind::Record, format!("mem://{tag}-rdv")),
            message_store: store(StorageKind::Blob, format!("mem://{tag}-blob")),
            cipher: CipherConfig::default(),
        }
    }

    fn two_party() -> (Handshake, Handshake) {
        let mut initiator = Handshake::new(Role::Initiator, strategy("alice"), Some("alice".into()));
        let mut peer = Handshake::new(Role::Peer, strategy("bob"), Some("bob".into()));

        let shared = peer.position().peer_config();
        initiator.add_peer(shared).unwrap();
        let configs = initiator.get_all_configs().unwrap();
        assert_eq!(configs.len(), 2);
        // The peer receives the initiator's personalized config (item 1 of 2).
        peer.add_peer(configs[0].clone()).unwrap();
        (initiator, peer)
    }

    #[test]
    fn default_alias_is_three_words() {
        let alias = gen_alias();
        assert!(alias.split('-').filter(|w| !w.is_empty()).count() >= 3);
    }

    #[test]
    fn rejects_zero_sort_order() {
        let mut peer = Handshake::new(Role::Peer, strategy("p"), None);
        let mut config = Handshake::new(Role::Initiator, strategy("i"), None)
            .position()
            .peer_config();
        config.item = 0;
        config.total_items = 2;
        assert!(matches!(
            peer.add_peer(config),
            Err(HandshakeError::InvalidSortOrder)
        ));
    }

    #[test]
    fn rejects_item_beyond_total() {
        let mut peer = Handshake::new(Role::Peer, strategy("p"), None);
        let mut config = Handshake::new(Role::Initiator, strategy("i"), None)
            .position()
            .peer_config();
        config.item = 3;
        config.total_items = 2;
        assert!(matches!(
            peer.add_peer(config),
            Err(HandshakeError::InvalidSortOrder)
        ));
    }

    #[test]
    fn rejects_duplicate_entropy() {
        let mut initiator = Handshake::new(Role::Initiator, strategy("i"), None);
        let other = Handshake::new(Role::Peer, strategy("p"), None);
        initiator.add_peer(other.position().peer_config()).unwrap();
        assert!(matches!(
            initiator.add_peer(other.position().peer_config()),
            Err(HandshakeError::DuplicatePeer)
        ));
    }

    #[test]
    fn two_party_fast_path_appends_own_position() {
        let (initiator, peer) = two_party();
        assert!(initiator.all_peers_received());
        assert!(peer.all_peers_received());
        assert_eq!(peer.negotiator_count(), 2);
        let sorted = peer.sorted_negotiators().unwrap();
        assert_eq!(sorted[1].entropy, peer.position().entropy);
        assert_eq!(sorted[1].sort_order, 2);
    }

    #[test]
    fn pepper_agreement() {
        let (initiator, peer) = two_party();
        assert_eq!(initiator.pepper().unwrap(), peer.pepper().unwrap());
    }

    #[test]
    fn get_all_configs_requires_initiator() {
        let (_, mut peer) = two_party();
        assert!(matches!(
            peer.get_all_configs(),
            Err(HandshakeError::NotInitiator)
        ));
    }

    #[test]
    fn get_all_configs_requires_two_peers() {
        let mut lonely = Handshake::new(Role::Initiator, strategy("i"), None);
        assert!(matches!(
            lonely.get_all_configs(),
            Err(HandshakeError::InsufficientPeers)
        ));
    }

    #[test]
    fn sorted_list_detects_unassigned() {
        let mut initiator = Handshake::new(Role::Initiator, strategy("i"), None);
        let other = Handshake::new(Role::Peer, strategy("p"), None);
        initiator.add_peer(other.position().peer_config()).unwrap();
        // Sort orders never assigned: all entries still 0.
        assert!(matches!(
            initiator.sorted_negotiators(),
            Err(HandshakeError::InvalidSortOrder)
        ));
    }

    #[test]
    fn sorted_list_detects_collision() {
        let (mut initiator, _) = two_party();
        // Force a sort-order collision.
        initiator.negotiators[1].sort_order = 1;
        assert!(matches!(
            initiator.sorted_negotiators(),
            Err(HandshakeError::InvalidSortValidation)
        ));
    }

    #[test]
    fn entropy_base64_roundtrip() {
        let entropy = Entropy::generate();
        let back = Entropy::from_base64(&entropy.to_base64()).unwrap();
        assert_eq!(entropy, back);
    }

    #[test]
    fn entropy_rejects_short_input() {
        assert!(matches!(
            Entropy::from_base64("c2hvcnQ="),
            Err(HandshakeError::InvalidEntropy)
        ));
    }

    #[test]
    fn share_omits_sort_metadata() {
        let handshake = Handshake::new(Role::Peer, strategy("p"), Some("bob".into()));
        let bytes = handshake.share_position().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["alias"], "bob");
        assert!(value.get("item").is_none());
        assert!(value.get("total_items").is_none());
    }
}
