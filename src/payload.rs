//! Application payloads exchanged over a channel.

use serde::{Deserialize, Serialize};

use crate::{Error, Message, PeerId, Result};

/// Everything a peer may send over a channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Payload {
    /// The sender's full log, sent when a channel opens.
    Sync { messages: Vec<Message> },
    /// Newly authored messages.
    Message { messages: Vec<Message> },
    /// Introduction carrying the sender's own identifier.
    Init {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
    },
}

impl Payload {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    /// Decode a payload. Unknown `kind` tags are rejected, not skipped.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Sync { .. } => "sync",
            Payload::Message { .. } => "message",
            Payload::Init { .. } => "init",
        }
    }
}
