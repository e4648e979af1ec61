use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Error, PeerId, Result};

const SUFFIX_LEN: usize = 9;
const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A chat message. Never mutated after creation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// `{origin}_{timestamp}_{suffix}`, the merge key.
    pub id: String,
    #[serde(rename = "peerId", alias = "originPeerId")]
    pub origin_peer_id: PeerId,
    pub text: String,
    /// Milliseconds since the Unix epoch, on the author's clock.
    pub timestamp: u64,
}

impl Message {
    /// Author a new message stamped with the current time.
    pub fn new(origin: &PeerId, text: &str) -> Result<Self> {
        Self::at(origin, text, now_millis())
    }

    /// Author a new message with an explicit timestamp.
    pub fn at(origin: &PeerId, text: &str, timestamp: u64) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("Message cannot be empty.".to_string()));
        }
        Ok(Self {
            id: format!("{}_{}_{}", origin, timestamp, random_suffix()),
            origin_peer_id: origin.clone(),
            text: text.to_string(),
            timestamp,
        })
    }

    pub fn is_from(&self, peer_id: &PeerId) -> bool {
        &self.origin_peer_id == peer_id
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_origin_timestamp_and_suffix() {
        let origin = PeerId::from("alice");
        let msg = Message::at(&origin, "  hello  ", 100).unwrap();
        let parts: Vec<&str> = msg.id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "alice");
        assert_eq!(parts[1], "100");
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
        assert_eq!(msg.text, "hello");
        assert!(msg.is_from(&origin));
    }

    #[test]
    fn blank_text_is_rejected() {
        let origin = PeerId::from("alice");
        assert!(matches!(
            Message::new(&origin, "   "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn ids_do_not_collide_within_the_same_millisecond() {
        let origin = PeerId::from("alice");
        let a = Message::at(&origin, "a", 5).unwrap();
        let b = Message::at(&origin, "a", 5).unwrap();
        assert_ne!(a.id, b.id);
    }
}
