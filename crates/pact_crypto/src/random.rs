//! OS randomness helpers.

use rand::{rngs::OsRng, RngCore};

/// Fill a fresh vec of `len` bytes from the OS CSPRNG.
pub fn rand_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Random bytes, hex-encoded. Used for chat, peer, and profile ids.
pub fn rand_hex(len: usize) -> String {
    hex::encode(rand_bytes(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths() {
        assert_eq!(rand_bytes(12).len(), 12);
        assert_eq!(rand_hex(12).len(), 24);
    }

    #[test]
    fn not_constant() {
        assert_ne!(rand_bytes(32), rand_bytes(32));
    }
}
