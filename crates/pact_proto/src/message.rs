//! Plaintext message payload, carried encrypted inside stored blobs.

use serde::{Deserialize, Serialize};

/// The decrypted content of one stored message. Immutable once encrypted
/// and stored.
///
/// `parent` is the content hash of the sender's previous message, forming a
/// per-sender hash-linked chain that lets a receiver walk backwards through
/// an arbitrary backlog. Empty for the sender's first message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChatData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent: String,
    /// Send time in nanoseconds since the unix epoch. Advisory, for log
    /// display only; ordering is enforced by parent pointers.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ttl: i64,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_omitted() {
        let data = ChatData {
            message: "hi".into(),
            ..ChatData::default()
        };
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"message":"hi"}"#);
    }

    #[test]
    fn caller_payload_parses_into_chat_data() {
        // The shape callers hand to send_message.
        let data: ChatData = serde_json::from_str(r#"{ "message": "hello, world" }"#).unwrap();
        assert_eq!(data.message, "hello, world");
        assert!(data.parent.is_empty());
    }

    #[test]
    fn full_roundtrip() {
        let data = ChatData {
            parent: "abc123".into(),
            timestamp: 1_700_000_000_000_000_000,
            media: vec!["hash-a".into()],
            message: "with media".into(),
            ttl: 604_800,
        };
        let json = serde_json::to_vec(&data).unwrap();
        assert_eq!(serde_json::from_slice::<ChatData>(&json).unwrap(), data);
    }
}
