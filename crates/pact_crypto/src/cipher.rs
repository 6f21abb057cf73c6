//! Chunked authenticated encryption.
//!
//! XChaCha20-Poly1305 applied in fixed-size plaintext chunks. Each chunk is
//! framed as:
//!
//!   [ nonce (24 bytes) | ciphertext + tag (chunk + 16 bytes) ]
//!
//! so a full ciphertext chunk is exactly `chunk_size + 40` bytes, and the
//! last chunk may be shorter. Decryption fails closed: an authentication
//! failure on any chunk aborts the whole decrypt.
//!
//! Two nonce kinds are supported. `Random` draws all 24 bytes from the OS
//! CSPRNG. `TimeSeries` overwrites the first 4 bytes with little-endian unix
//! seconds, prefixing the random tail with time-series data to make an
//! already unlikely nonce collision even less likely for long-lived at-rest
//! encryption.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CryptoError;

/// Default plaintext chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 16_000;
/// Nonce length for XChaCha20-Poly1305.
pub const NONCE_LEN: usize = 24;
/// Poly1305 authentication tag length.
pub const TAG_LEN: usize = 16;
/// Per-chunk ciphertext overhead (nonce + tag).
pub const CHUNK_OVERHEAD: usize = NONCE_LEN + TAG_LEN;
/// Key length for the XChaCha20-Poly1305 construction.
pub const KEY_LEN: usize = 32;

/// Nonce generation scheme for a cipher instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NonceKind {
    #[default]
    Random,
    /// First 4 bytes are LE unix seconds, remainder random.
    TimeSeries,
}

/// Cipher construction identifiers, shared with peers during handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CipherKind {
    #[default]
    #[serde(rename = "xchacha20poly1305")]
    XChaCha20Poly1305,
}

/// Transmissible cipher settings (part of a strategy config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherConfig {
    #[serde(rename = "type")]
    pub kind: CipherKind,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            kind: CipherKind::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Closed set of cipher constructions.
///
/// A single variant today; the enum keeps the strategy model pluggable
/// without open-ended dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cipher {
    XChaCha(ChunkCipher),
}

/// The chunked XChaCha20-Poly1305 cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCipher {
    pub nonce: NonceKind,
    pub chunk_size: usize,
}

impl Default for Cipher {
    fn default() -> Self {
        Self::XChaCha(ChunkCipher {
            nonce: NonceKind::Random,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }
}

impl Cipher {
    /// Cipher used for encrypting state at rest (profiles, chat configs,
    /// lookup pools).
    pub fn time_series() -> Self {
        Self::XChaCha(ChunkCipher {
            nonce: NonceKind::TimeSeries,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Required key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            Self::XChaCha(_) => KEY_LEN,
        }
    }

    /// Encrypt `data` under `key`, producing chunk-framed ciphertext.
    /// Empty input produces empty output.
    pub fn encrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::XChaCha(c) => c.encrypt(data, key),
        }
    }

    /// Decrypt chunk-framed ciphertext. Fails closed on any chunk.
    pub fn decrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::XChaCha(c) => c.decrypt(data, key),
        }
    }

    /// Settings shared with a peer during handshake.
    pub fn config(&self) -> CipherConfig {
        match self {
            Self::XChaCha(c) => CipherConfig {
                kind: CipherKind::XChaCha20Poly1305,
                chunk_size: c.chunk_size,
            },
        }
    }

    /// Rebuild a cipher from an imported config. Imported ciphers always use
    /// random nonces; the time-series kind is a local at-rest concern.
    pub fn from_config(config: &CipherConfig) -> Result<Self, CryptoError> {
        match config.kind {
            CipherKind::XChaCha20Poly1305 => Ok(Self::XChaCha(ChunkCipher {
                nonce: NonceKind::Random,
                chunk_size: config.chunk_size,
            })),
        }
    }
}

impl ChunkCipher {
    fn encrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = aead(key)?;
        let mut out = Vec::with_capacity(data.len() + CHUNK_OVERHEAD * (data.len() / self.chunk_size + 1));
        for chunk in data.chunks(self.chunk_size) {
            let nonce_bytes = self.gen_nonce();
            let nonce = XNonce::from_slice(&nonce_bytes);
            let ct = cipher.encrypt(nonce, chunk).map_err(|_| CryptoError::Encrypt)?;
            out.extend_from_slice(&nonce_bytes);
            out.extend_from_slice(&ct);
        }
        Ok(out)
    }

    fn decrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = aead(key)?;
        let stride = self.chunk_size + CHUNK_OVERHEAD;
        let mut out = Vec::with_capacity(data.len());
        for chunk in data.chunks(stride) {
            if chunk.len() < CHUNK_OVERHEAD {
                return Err(CryptoError::TruncatedCiphertext);
            }
            let (nonce_bytes, ct) = chunk.split_at(NONCE_LEN);
            let nonce = XNonce::from_slice(nonce_bytes);
            let plain = cipher.decrypt(nonce, ct).map_err(|_| CryptoError::Decrypt)?;
            out.extend_from_slice(&plain);
        }
        Ok(out)
    }

    fn gen_nonce(&self) -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        if self.nonce == NonceKind::TimeSeries {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            nonce[..4].copy_from_slice(&(secs as u32).to_le_bytes());
        }
        nonce
    }
}

fn aead(key: &[u8]) -> Result<XChaCha20Poly1305, CryptoError> {
    XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_LEN,
        got: key.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rand_bytes;

    fn roundtrip(cipher: &Cipher, len: usize) {
        let key = rand_bytes(KEY_LEN);
        let msg = rand_bytes(len);
        let ct = cipher.encrypt(&msg, &key).unwrap();
        if len > 0 {
            let chunks = len.div_ceil(DEFAULT_CHUNK_SIZE);
            assert_eq!(ct.len(), len + chunks * CHUNK_OVERHEAD);
        }
        assert_eq!(cipher.decrypt(&ct, &key).unwrap(), msg);
    }

    #[test]
    fn roundtrip_chunk_boundaries() {
        let cipher = Cipher::default();
        roundtrip(&cipher, 0);
        roundtrip(&cipher, 1);
        roundtrip(&cipher, DEFAULT_CHUNK_SIZE);
        roundtrip(&cipher, DEFAULT_CHUNK_SIZE + 1);
        roundtrip(&cipher, 3 * DEFAULT_CHUNK_SIZE + 17);
    }

    #[test]
    fn roundtrip_time_series_nonce() {
        roundtrip(&Cipher::time_series(), 100);
    }

    #[test]
    fn empty_message_yields_empty_ciphertext() {
        let cipher = Cipher::default();
        let key = rand_bytes(KEY_LEN);
        assert!(cipher.encrypt(b"", &key).unwrap().is_empty());
        assert!(cipher.decrypt(b"", &key).unwrap().is_empty());
    }

    #[test]
    fn tampering_fails_closed() {
        let cipher = Cipher::default();
        let key = rand_bytes(KEY_LEN);
        let mut ct = cipher.encrypt(b"authentic message", &key).unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(matches!(cipher.decrypt(&ct, &key), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn wrong_key_fails() {
        let cipher = Cipher::default();
        let ct = cipher.encrypt(b"hello", &rand_bytes(KEY_LEN)).unwrap();
        assert!(cipher.decrypt(&ct, &rand_bytes(KEY_LEN)).is_err());
    }

    #[test]
    fn bad_key_length_rejected() {
        let cipher = Cipher::default();
        let err = cipher.encrypt(b"hello", &[0u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyLength { got: 16, .. }));
    }

    #[test]
    fn config_roundtrip() {
        let cipher = Cipher::default();
        let config = cipher.config();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        let rebuilt = Cipher::from_config(&config).unwrap();
        assert_eq!(rebuilt.key_len(), KEY_LEN);
    }
}
