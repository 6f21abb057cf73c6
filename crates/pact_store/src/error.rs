use thiserror::Error;

use pact_crypto::CryptoError;
use pact_proto::chatlog::ChatLogError;
use pact_proto::handshake::HandshakeError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("chat log error: {0}")]
    ChatLog(#[from] ChatLogError),

    #[error("token decode error: {0}")]
    TokenDecode(#[from] base64::DecodeError),

    #[error("invalid password")]
    InvalidPassword,

    #[error("no profile found")]
    NoProfiles,

    #[error("existing profiles found: genesis may only run on first setup")]
    ProfileExists,

    #[error("no handshake in progress")]
    NoActiveHandshake,

    #[error("chat not found: {0}")]
    ChatNotFound(String),

    #[error("message of {size} bytes exceeds the {max} byte maximum")]
    MessageTooLarge { size: usize, max: usize },

    #[error("no chat peer matches our own handshake entropy")]
    OwnPeerNotFound,

    #[error("this storage does not support shared or exported configs")]
    NotShareable,

    #[error("no nodes configured for this operation")]
    NoNodes,

    #[error("no nodes available")]
    NoNodesAvailable,

    #[error("consensus rule not yet implemented")]
    ConsensusRuleUnimplemented,

    #[error("storage kind does not support this operation")]
    UnsupportedOperation,

    #[error("stored blob is malformed: {0}")]
    MalformedBlob(String),

    #[error("record not found: {0}")]
    NotFound(String),
}
