//! The session: one unlocked profile driving handshakes and chats.
//!
//! A session owns the local KV store, the at-rest cipher keyed by the
//! unlock-derived key, at most one in-progress handshake, and the send and
//! retrieve protocols. Everything written to local storage is encrypted
//! before it lands.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use zeroize::Zeroize;

use pact_crypto::cipher::Cipher;
use pact_crypto::lookup::{decode_token, encode_token, LookupPool, DEFAULT_POOL_SIZE, TOKEN_LEN};
use pact_crypto::random::rand_hex;
use pact_crypto::CryptoError;
use pact_proto::chatlog::{ChatLog, ChatLogEntry};
use pact_proto::handshake::{pepper_from_negotiators, Handshake, PeerConfig, Role};
use pact_proto::message::ChatData;

use crate::backend::Store;
use crate::chat::{
    chat_prefix, chatlog_key, config_key, lookup_key, unique_chat_ids, Chat, ChatPeer,
    ChatSettings, MAX_MESSAGE_SIZE,
};
use crate::error::StoreError;
use crate::profile::{self, Profile};
use crate::strategy::{default_strategy_config, Strategy};

const GLOBAL_CONFIG_KEY: &str = "global-config";

/// Ids for chats and chat peers are this many random bytes, hex-encoded.
const CHAT_ID_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub storage_path: PathBuf,
}

/// Application-wide settings, written once at genesis and encrypted at rest
/// like everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub ttl: i64,
    pub max_login_attempts: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            ttl: 300,
            max_login_attempts: 10,
        }
    }
}

pub struct Session {
    storage: Store,
    cipher: Cipher,
    profile: Profile,
    key: [u8; 32],
    handshake: Option<Handshake>,
    global: GlobalConfig,
}

impl Session {
    /// First-run setup: create the genesis profile, then unlock it.
    pub fn genesis(options: &SessionOptions, password: &str) -> Result<Self, StoreError> {
        let mut storage = Store::open_kv(&options.storage_path)?;
        let cipher = Cipher::time_series();
        profile::new_genesis_profile(&mut storage, &cipher, password)?;
        Self::unlock(storage, cipher, password)
    }

    /// Unlock an existing profile.
    pub fn new(options: &SessionOptions, password: &str) -> Result<Self, StoreError> {
        let storage = Store::open_kv(&options.storage_path)?;
        Self::unlock(storage, Cipher::time_series(), password)
    }

    fn unlock(storage: Store, cipher: Cipher, password: &str) -> Result<Self, StoreError> {
        let (profile, key) = profile::unlock(&storage, &cipher, password)?;
        let mut session = Self {
            storage,
            cipher,
            profile,
            key,
            handshake: None,
            global: GlobalConfig::default(),
        };
        match session.load_encrypted::<GlobalConfig>(GLOBAL_CONFIG_KEY)? {
            Some(global) => session.global = global,
            None => {
                let global = GlobalConfig::default();
                session.save_encrypted(GLOBAL_CONFIG_KEY, &global)?;
                session.global = global;
            }
        }
        Ok(session)
    }

    pub fn profile_id(&self) -> &str {
        &self.profile.id
    }

    pub fn global_config(&self) -> &GlobalConfig {
        &self.global
    }

    /// Flush storage and wipe the session key.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.key.zeroize();
        self.storage.close()
    }

    // ---- handshakes ------------------------------------------------------

    /// Begin a handshake with a fresh default strategy, replacing any
    /// handshake already in progress.
    pub fn new_handshake(&mut self, role: Role, alias: Option<String>) {
        self.handshake = Some(Handshake::new(role, default_strategy_config(), alias));
    }

    /// This party's position, serialized for out-of-band delivery.
    pub fn share_handshake_position(&self) -> Result<Vec<u8>, StoreError> {
        let handshake = self.handshake.as_ref().ok_or(StoreError::NoActiveHandshake)?;
        Ok(handshake.share_position()?)
    }

    /// Ingest a counterparty's serialized config. Returns true once every
    /// expected peer is present.
    pub fn add_peer_to_handshake(&mut self, config: &[u8]) -> Result<bool, StoreError> {
        let handshake = self.handshake.as_mut().ok_or(StoreError::NoActiveHandshake)?;
        let peer: PeerConfig = serde_json::from_slice(config)?;
        handshake.add_peer(peer)?;
        Ok(handshake.all_peers_received())
    }

    /// Initiator only: the personalized config for the peer holding 1-indexed
    /// position `item`, serialized for out-of-band delivery.
    pub fn handshake_peer_config(&mut self, item: usize) -> Result<Vec<u8>, StoreError> {
        let handshake = self.handshake.as_mut().ok_or(StoreError::NoActiveHandshake)?;
        let configs = handshake.get_all_configs()?;
        let config = configs
            .get(item.wrapping_sub(1))
            .ok_or(pact_proto::handshake::HandshakeError::InvalidSortOrder)?;
        Ok(serde_json::to_vec(config)?)
    }

    // ---- chats -----------------------------------------------------------

    /// Convert the completed handshake into a chat: derive the pepper and
    /// one lookup pool per negotiator, persist everything, and return the
    /// new chat id. The handshake is consumed either way.
    pub fn new_chat(&mut self) -> Result<String, StoreError> {
        let handshake = self.handshake.take().ok_or(StoreError::NoActiveHandshake)?;
        let sorted = handshake.sorted_negotiators()?;
        let mut pepper = pepper_from_negotiators(&sorted);
        let own_entropy = handshake.position().entropy.clone();

        let chat_id = rand_hex(CHAT_ID_LEN);
        let mut peers = std::collections::HashMap::with_capacity(sorted.len());
        let mut pools = Vec::with_capacity(sorted.len());
        let mut own_peer_id = None;
        for negotiator in &sorted {
            let peer_id = rand_hex(CHAT_ID_LEN);
            let strategy = Strategy::from_config(&negotiator.strategy)?;
            let pool = LookupPool::derive(
                &pepper,
                negotiator.entropy.as_bytes(),
                strategy.cipher.key_len(),
                DEFAULT_POOL_SIZE,
            );
            pools.push((peer_id.clone(), pool));
            if negotiator.entropy == own_entropy {
                own_peer_id = Some(peer_id.clone());
            }
            peers.insert(
                peer_id.clone(),
                ChatPeer {
                    id: peer_id,
                    alias: negotiator.alias.clone(),
                    strategy,
                },
            );
        }
        pepper.zeroize();
        let own_peer_id = own_peer_id.ok_or(StoreError::OwnPeerNotFound)?;

        let chat = Chat {
            id: chat_id.clone(),
            own_peer_id,
            last_sent: String::new(),
            peers,
            settings: ChatSettings::default(),
        };
        if let Err(err) = self.persist_new_chat(&chat, &pools) {
            // Roll back the partial write so a retried handshake does not
            // collide with orphaned keys.
            if let Err(cleanup) = self.remove_chat_keys(&chat_id) {
                tracing::warn!(chat = %chat_id, error = %cleanup, "chat cleanup failed");
            }
            return Err(err);
        }
        Ok(chat_id)
    }

    fn persist_new_chat(
        &mut self,
        chat: &Chat,
        pools: &[(String, LookupPool)],
    ) -> Result<(), StoreError> {
        let profile_id = self.profile.id.clone();
        self.save_encrypted(&config_key(&chat.id, &profile_id), &chat.config()?)?;
        self.save_encrypted(&chatlog_key(&chat.id, &profile_id), &ChatLog::new())?;
        for (peer_id, pool) in pools {
            self.save_encrypted(&lookup_key(&chat.id, &profile_id, peer_id), pool)?;
        }
        Ok(())
    }

    fn remove_chat_keys(&mut self, chat_id: &str) -> Result<(), StoreError> {
        let prefix = chat_prefix(chat_id, &self.profile.id);
        for key in self.storage.list(&prefix)? {
            self.storage.delete(&key)?;
        }
        Ok(())
    }

    /// Chat ids this profile participates in.
    pub fn list_chats(&self) -> Result<Vec<String>, StoreError> {
        let paths = self.storage.list("chats/")?;
        Ok(unique_chat_ids(&paths, &self.profile.id))
    }

    // ---- send ------------------------------------------------------------

    /// Encrypt and publish one message, then update the rendezvous record to
    /// point at it. Returns the chronologically sorted chat log as JSON.
    pub fn send_message(&mut self, chat_id: &str, payload: &[u8]) -> Result<Vec<u8>, StoreError> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(StoreError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let mut chat = self.load_chat(chat_id)?;
        let profile_id = self.profile.id.clone();

        let mut data: ChatData = serde_json::from_slice(payload)?;
        data.parent = chat.last_sent.clone();
        data.timestamp = now_ns();
        data.ttl = chat.ttl();

        let pool_key = lookup_key(chat_id, &profile_id, &chat.own_peer_id);
        let mut pool: LookupPool = self
            .load_encrypted(&pool_key)?
            .ok_or_else(|| StoreError::NotFound(pool_key.clone()))?;

        // Message blob: burn a token, persist the pool, then write. A crash
        // between the two loses one token, never reuses one.
        let (token, mut message_key) = pool.pop_random()?;
        self.save_encrypted(&pool_key, &pool)?;
        let plaintext = serde_json::to_vec(&data)?;
        let hash = {
            let own = chat
                .peers
                .get_mut(&chat.own_peer_id)
                .ok_or(StoreError::OwnPeerNotFound)?;
            let ciphertext = own.strategy.cipher.encrypt(&plaintext, &message_key)?;
            let mut blob = decode_token(&token)?;
            blob.extend_from_slice(&ciphertext);
            own.strategy.message_store.set("", blob)?
        };
        message_key.zeroize();

        // The new head must be durable before the rendezvous points at it.
        chat.last_sent = hash.clone();
        self.save_chat(&chat)?;

        // Rendezvous record: same discipline with a second token.
        let (rdv_token, mut rdv_key) = pool.pop_random()?;
        self.save_encrypted(&pool_key, &pool)?;
        let own = chat
            .peers
            .get_mut(&chat.own_peer_id)
            .ok_or(StoreError::OwnPeerNotFound)?;
        let rdv_ciphertext = own.strategy.cipher.encrypt(hash.as_bytes(), &rdv_key)?;
        rdv_key.zeroize();
        let mut record = decode_token(&rdv_token)?;
        record.extend_from_slice(&rdv_ciphertext);
        own.strategy.rendezvous.set("latest", record)?;

        let log_key = chatlog_key(chat_id, &profile_id);
        let mut log: ChatLog = self.load_encrypted(&log_key)?.unwrap_or_default();
        log.add_entry(ChatLogEntry {
            id: hash,
            sender: chat.own_peer_id.clone(),
            sent: data.timestamp,
            received: 0,
            ttl: data.ttl,
            data,
        })?;
        self.save_encrypted(&log_key, &log)?;
        Ok(log.sorted_json()?)
    }

    // ---- retrieve --------------------------------------------------------

    /// Poll every counterparty's rendezvous record and pull any unseen
    /// messages, walking each sender's parent chain back to known history.
    /// A failing peer is logged and skipped; the rest still deliver. Returns
    /// the chronologically sorted chat log as JSON.
    pub fn retrieve_messages(&mut self, chat_id: &str) -> Result<Vec<u8>, StoreError> {
        let mut chat = self.load_chat(chat_id)?;
        let log_key = chatlog_key(chat_id, &self.profile.id);
        let mut log: ChatLog = self.load_encrypted(&log_key)?.unwrap_or_default();

        let peer_ids: Vec<String> = chat
            .peers
            .keys()
            .filter(|id| **id != chat.own_peer_id)
            .cloned()
            .collect();
        for peer_id in peer_ids {
            if let Err(err) = self.retrieve_from_peer(&mut chat, &peer_id, &mut log) {
                tracing::debug!(peer = %peer_id, error = %err, "peer retrieval failed, skipping");
            }
        }
        self.save_encrypted(&log_key, &log)?;
        Ok(log.sorted_json()?)
    }

    fn retrieve_from_peer(
        &mut self,
        chat: &mut Chat,
        peer_id: &str,
        log: &mut ChatLog,
    ) -> Result<(), StoreError> {
        let pool_key = lookup_key(&chat.id, &self.profile.id, peer_id);
        let mut pool: LookupPool = self
            .load_encrypted(&pool_key)?
            .ok_or_else(|| StoreError::NotFound(pool_key.clone()))?;
        let peer = chat
            .peers
            .get_mut(peer_id)
            .ok_or_else(|| StoreError::NotFound(peer_id.to_string()))?;

        let Some(record) = peer.strategy.rendezvous.get("latest")? else {
            return Ok(());
        };
        if record.len() <= TOKEN_LEN {
            return Err(StoreError::MalformedBlob(
                "rendezvous record shorter than a lookup token".into(),
            ));
        }
        let token = encode_token(&record[..TOKEN_LEN]);
        // A consumed or foreign token means nothing new from this peer.
        let mut rdv_key = match pool.pop_by_token(&token) {
            Ok(key) => key,
            Err(CryptoError::KeyNotFound) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        self.save_encrypted(&pool_key, &pool)?;
        let head_bytes = peer.strategy.cipher.decrypt(&record[TOKEN_LEN..], &rdv_key)?;
        rdv_key.zeroize();
        let head = String::from_utf8(head_bytes).map_err(|_| {
            StoreError::MalformedBlob("rendezvous payload is not a content hash".into())
        })?;

        // Walk the sender's parent chain until it reaches known history.
        let mut work = vec![head];
        while let Some(hash) = work.pop() {
            if hash.is_empty() || log.contains_id(&hash) {
                continue;
            }
            let blob = peer
                .strategy
                .message_store
                .get(&hash)?
                .ok_or_else(|| StoreError::NotFound(hash.clone()))?;
            if blob.len() <= TOKEN_LEN {
                return Err(StoreError::MalformedBlob(
                    "message blob shorter than a lookup token".into(),
                ));
            }
            let blob_token = encode_token(&blob[..TOKEN_LEN]);
            let mut message_key = match pool.pop_by_token(&blob_token) {
                Ok(key) => key,
                Err(CryptoError::KeyNotFound) => continue,
                Err(err) => return Err(err.into()),
            };
            self.save_encrypted(&pool_key, &pool)?;
            let plaintext = peer.strategy.cipher.decrypt(&blob[TOKEN_LEN..], &message_key)?;
            message_key.zeroize();
            let data: ChatData = serde_json::from_slice(&plaintext)?;
            if !data.parent.is_empty() && !log.contains_id(&data.parent) {
                work.push(data.parent.clone());
            }
            log.add_entry(ChatLogEntry {
                id: hash,
                sender: peer_id.to_string(),
                sent: data.timestamp,
                received: now_ns(),
                ttl: data.ttl,
                data,
            })?;
        }
        Ok(())
    }

    // ---- persistence helpers ---------------------------------------------

    fn load_chat(&self, chat_id: &str) -> Result<Chat, StoreError> {
        let key = config_key(chat_id, &self.profile.id);
        let config = self
            .load_encrypted(&key)?
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;
        Chat::from_config(config)
    }

    fn save_chat(&mut self, chat: &Chat) -> Result<(), StoreError> {
        let key = config_key(&chat.id, &self.profile.id);
        self.save_encrypted(&key, &chat.config()?)
    }

    fn save_encrypted<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let mut plaintext = serde_json::to_vec(value)?;
        let data = self.cipher.encrypt(&plaintext, &self.key)?;
        plaintext.zeroize();
        self.storage.set(key, data)?;
        Ok(())
    }

    fn load_encrypted<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.storage.get(key)? {
            Some(data) => {
                let mut plaintext = self.cipher.decrypt(&data, &self.key)?;
                let value = serde_json::from_slice(&plaintext)?;
                plaintext.zeroize();
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// Current time in nanoseconds since the unix epoch.
fn now_ns() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
