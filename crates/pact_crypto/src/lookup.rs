//! Deterministic one-time lookup pools.
//!
//! A pool maps base64 lookup tokens (24 raw bytes) to one-time symmetric
//! keys. Derivation is a pure function of (pepper, entropy, key_len, count):
//! both parties to a chat derive byte-identical pools for each peer with no
//! communication, then burn entries independently as they write and read.
//!
//! Consume-once is the load-bearing invariant: every use of an entry — a
//! message-store write or read, a rendezvous write or read — removes it from
//! the pool, and the caller must persist the mutated pool before treating
//! any dependent write as durable. A missing token during retrieval means
//! "already consumed or not ours", not a failure.

use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Default number of entries derived per (pepper, entropy) pair.
pub const DEFAULT_POOL_SIZE: usize = 10_000;
/// Raw token length in bytes. Tokens travel unencrypted at the front of
/// stored blobs so the reader can locate its key before decrypting.
pub const TOKEN_LEN: usize = 24;

const DERIVE_CONTEXT: &str = "pact lookup pool v1";

/// A finite pool of (token, one-time key) pairs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LookupPool {
    entries: HashMap<String, Vec<u8>>,
}

impl LookupPool {
    /// Derive a pool of `count` unique entries from a 64-byte pepper and a
    /// party's 96-byte entropy.
    ///
    /// The pepper is compressed into a BLAKE3 key; each entry is the keyed
    /// XOF of (entropy || counter), split into a 24-byte token and a
    /// `key_len`-byte key. Counters whose token collides with an earlier one
    /// are skipped, so the result always holds exactly `count` entries and
    /// is identical for identical inputs.
    pub fn derive(pepper: &[u8; 64], entropy: &[u8; 96], key_len: usize, count: usize) -> Self {
        let root = blake3::derive_key(DERIVE_CONTEXT, pepper);
        let mut entries: HashMap<String, Vec<u8>> = HashMap::with_capacity(count);
        let mut counter: u64 = 0;
        let mut buf = vec![0u8; TOKEN_LEN + key_len];
        while entries.len() < count {
            let mut hasher = blake3::Hasher::new_keyed(&root);
            hasher.update(entropy);
            hasher.update(&counter.to_le_bytes());
            hasher.finalize_xof().fill(&mut buf);
            let token = encode_token(&buf[..TOKEN_LEN]);
            entries.entry(token).or_insert_with(|| buf[TOKEN_LEN..].to_vec());
            counter += 1;
        }
        buf.zeroize();
        Self { entries }
    }

    /// Remove and return the key for an exact token match.
    ///
    /// `KeyNotFound` means the entry was already consumed or the token is
    /// foreign; during retrieval callers treat that as "nothing new".
    pub fn pop_by_token(&mut self, token: &str) -> Result<Vec<u8>, CryptoError> {
        self.entries.remove(token).ok_or(CryptoError::KeyNotFound)
    }

    /// Remove and return an arbitrary remaining entry. Used when this party
    /// originates the token (writes).
    pub fn pop_random(&mut self) -> Result<(String, Vec<u8>), CryptoError> {
        if self.entries.is_empty() {
            return Err(CryptoError::PoolExhausted);
        }
        let idx = OsRng.gen_range(0..self.entries.len());
        let token = self
            .entries
            .keys()
            .nth(idx)
            .cloned()
            .ok_or(CryptoError::PoolExhausted)?;
        let key = self.entries.remove(&token).ok_or(CryptoError::PoolExhausted)?;
        Ok((token, key))
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for LookupPool {
    fn drop(&mut self) {
        for key in self.entries.values_mut() {
            key.zeroize();
        }
    }
}

/// Base64 encoding of a raw token, the form used as the pool map key.
pub fn encode_token(raw: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    STANDARD.encode(raw)
}

/// Decode a base64 token back to its raw 24 bytes.
pub fn decode_token(token: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    STANDARD.decode(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_LEN: usize = 32;

    fn pepper(seed: u8) -> [u8; 64] {
        [seed; 64]
    }

    fn entropy(seed: u8) -> [u8; 96] {
        [seed; 96]
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = LookupPool::derive(&pepper(1), &entropy(2), KEY_LEN, 500);
        let b = LookupPool::derive(&pepper(1), &entropy(2), KEY_LEN, 500);
        assert_eq!(a, b);
        assert_eq!(a.len(), 500);
    }

    #[test]
    fn differing_inputs_share_no_tokens() {
        let a = LookupPool::derive(&pepper(1), &entropy(2), KEY_LEN, 200);
        let b = LookupPool::derive(&pepper(1), &entropy(3), KEY_LEN, 200);
        let c = LookupPool::derive(&pepper(9), &entropy(2), KEY_LEN, 200);
        for token in a.entries.keys() {
            assert!(!b.contains(token));
            assert!(!c.contains(token));
        }
    }

    #[test]
    fn consume_once() {
        let mut pool = LookupPool::derive(&pepper(1), &entropy(2), KEY_LEN, 50);
        let (token, key) = pool.pop_random().unwrap();
        assert_eq!(key.len(), KEY_LEN);
        assert_eq!(pool.len(), 49);
        assert!(matches!(
            pool.pop_by_token(&token),
            Err(CryptoError::KeyNotFound)
        ));
    }

    #[test]
    fn pop_by_token_matches_counterparty_copy() {
        let mut writer = LookupPool::derive(&pepper(7), &entropy(8), KEY_LEN, 50);
        let mut reader = LookupPool::derive(&pepper(7), &entropy(8), KEY_LEN, 50);
        let (token, key) = writer.pop_random().unwrap();
        assert_eq!(reader.pop_by_token(&token).unwrap(), key);
    }

    #[test]
    fn exhaustion() {
        let mut pool = LookupPool::derive(&pepper(1), &entropy(2), KEY_LEN, 3);
        for _ in 0..3 {
            pool.pop_random().unwrap();
        }
        assert!(matches!(pool.pop_random(), Err(CryptoError::PoolExhausted)));
    }

    #[test]
    fn token_roundtrip() {
        let raw = [0xabu8; TOKEN_LEN];
        assert_eq!(decode_token(&encode_token(&raw)).unwrap(), raw);
    }

    #[test]
    fn serde_roundtrip() {
        let pool = LookupPool::derive(&pepper(4), &entropy(5), KEY_LEN, 20);
        let json = serde_json::to_vec(&pool).unwrap();
        let back: LookupPool = serde_json::from_slice(&json).unwrap();
        assert_eq!(pool, back);
    }
}
