//! BLAKE3 hash utilities.
//!
//! - `content_hash` — hex content addresses for stored blobs
//! - `hash512` — 64-byte XOF digest, used to derive the shared pepper from
//!   the ordered negotiator entropy

/// 32-byte BLAKE3 digest, hex-encoded. The content address returned by the
/// blob store.
pub fn content_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// 64-byte BLAKE3 XOF digest.
pub fn hash512(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    let mut hasher = blake3::Hasher::new();
    hasher.update(data);
    hasher.finalize_xof().fill(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_hex() {
        let h = content_hash(b"hello, world");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash(b"hello, world"));
        assert_ne!(h, content_hash(b"hello, world!"));
    }

    #[test]
    fn hash512_prefix_matches_plain_hash() {
        // The XOF's first 32 bytes are the plain BLAKE3 digest.
        let long = hash512(b"pepper input");
        let short: [u8; 32] = blake3::hash(b"pepper input").into();
        assert_eq!(&long[..32], &short);
    }
}
