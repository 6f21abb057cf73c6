//! The chat log: an append-only, deduplicated, chronologically ordered
//! record of decrypted messages.
//!
//! Entries are keyed `"{timestamp:020}-{id}"` (sent time, falling back to
//! received time) inside a BTreeMap, so iteration order is stable and
//! chronological. The timestamp is zero-padded to a fixed width so the
//! lexicographic key order matches numeric time order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::message::ChatData;

#[derive(Debug, Error)]
pub enum ChatLogError {
    #[error("chat log entry has no valid timestamp")]
    MissingTimestamp,
}

/// One decrypted message as recorded locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChatLogEntry {
    /// Content hash of the stored message blob.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Chat-peer id of the sender, as known locally.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sender: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub sent: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub received: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ttl: i64,
    pub data: ChatData,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// Deduplicated, deterministically ordered message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChatLog {
    entries: BTreeMap<String, ChatLogEntry>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Requires at least one of sent/received to be set.
    /// Duplicate ids are callers' concern; use `contains_id` before fetching
    /// or decrypting to keep retrieval idempotent.
    pub fn add_entry(&mut self, entry: ChatLogEntry) -> Result<(), ChatLogError> {
        if entry.sent == 0 && entry.received == 0 {
            return Err(ChatLogError::MissingTimestamp);
        }
        let timestamp = if entry.sent != 0 { entry.sent } else { entry.received };
        let key = format!("{timestamp:020}-{}", entry.id);
        self.entries.insert(key, entry);
        Ok(())
    }

    /// True iff a message with this content hash is already logged.
    pub fn contains_id(&self, id: &str) -> bool {
        self.entries.values().any(|e| e.id == id)
    }

    /// Entries in chronological order.
    pub fn sorted(&self) -> Vec<ChatLogEntry> {
        self.entries.values().cloned().collect()
    }

    /// Chronologically sorted entries as JSON, the caller-facing result of
    /// send and retrieve.
    pub fn sorted_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.sorted())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
