//! Password key derivation.
//!
//! Argon2id derives the 32-byte key that encrypts a profile at rest. The
//! profile id doubles as the salt, so unlocking iterates stored profiles and
//! trial-decrypts each one.

use argon2::{Algorithm, Argon2, Params, Version};

use crate::cipher::KEY_LEN;
use crate::error::CryptoError;

/// Argon2id parameters: 1 pass over 64 MiB with 4 lanes.
fn params() -> Result<Params, CryptoError> {
    Params::new(64 * 1024, 1, 4, Some(KEY_LEN))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Derive a 32-byte storage key from a password and salt.
pub fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params()?);
    let mut out = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = derive_key(b"correct horse", b"0123456789abcdef01234567").unwrap();
        let b = derive_key(b"correct horse", b"0123456789abcdef01234567").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn password_and_salt_both_matter() {
        let base = derive_key(b"pw", b"0123456789abcdef01234567").unwrap();
        assert_ne!(base, derive_key(b"pw2", b"0123456789abcdef01234567").unwrap());
        assert_ne!(base, derive_key(b"pw", b"0123456789abcdef01234568").unwrap());
    }
}
