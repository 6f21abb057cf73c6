use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed: authentication tag mismatch")]
    Decrypt,

    #[error("ciphertext chunk is truncated")]
    TruncatedCiphertext,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("lookup token not found")]
    KeyNotFound,

    #[error("lookup pool exhausted")]
    PoolExhausted,
}
