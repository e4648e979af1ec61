//! Append-only message log with de-duplicating merge.

use std::collections::HashSet;

use crate::{Message, PeerId, Result};

/// Locally known messages, ordered by `(timestamp, id)`.
///
/// The `id` tiebreak makes the order identical on every peer that holds the same set,
/// whatever order the batches arrived in.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    ids: HashSet<String>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Author a message and add it to the log.
    pub fn append(&mut self, text: &str, origin: &PeerId) -> Result<Message> {
        let message = Message::new(origin, text)?;
        self.insert(message.clone());
        self.sort();
        Ok(message)
    }

    /// Incorporate a batch, returning only the messages that were not known before.
    pub fn merge(&mut self, batch: impl IntoIterator<Item = Message>) -> Vec<Message> {
        let accepted: Vec<Message> = batch
            .into_iter()
            .filter(|message| self.insert(message.clone()))
            .collect();
        if !accepted.is_empty() {
            self.sort();
        }
        accepted
    }

    /// Ordered copy of the log.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn insert(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    fn sort(&mut self) {
        self.messages
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, timestamp: u64) -> Message {
        Message {
            id: id.to_string(),
            origin_peer_id: PeerId::from("p"),
            text: id.to_string(),
            timestamp,
        }
    }

    fn ids(log: &MessageLog) -> Vec<String> {
        log.messages().iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn append_rejects_blank_text() {
        let mut log = MessageLog::new();
        let me = PeerId::from("me");
        assert!(matches!(
            log.append("", &me),
            Err(crate::Error::InvalidInput(_))
        ));
        assert!(matches!(
            log.append("   ", &me),
            Err(crate::Error::InvalidInput(_))
        ));
        assert!(log.is_empty());

        let message = log.append("hi", &me).unwrap();
        assert_eq!(log.snapshot(), vec![message]);
    }

    #[test]
    fn merge_drops_known_ids_and_reports_new_ones() {
        let mut log = MessageLog::new();
        let accepted = log.merge(vec![msg("b", 2), msg("a", 1)]);
        assert_eq!(accepted.len(), 2);
        assert_eq!(ids(&log), vec!["a", "b"]);

        let accepted = log.merge(vec![msg("a", 1), msg("c", 3), msg("c", 3)]);
        assert_eq!(accepted, vec![msg("c", 3)]);
        assert_eq!(ids(&log), vec!["a", "b", "c"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let batch = vec![msg("x", 10), msg("y", 5)];
        let mut log = MessageLog::new();
        log.merge(batch.clone());
        let before = log.snapshot();
        assert!(log.merge(batch).is_empty());
        assert_eq!(log.snapshot(), before);
    }

    #[test]
    fn equal_timestamps_order_by_id() {
        let mut one = MessageLog::new();
        one.merge(vec![msg("b", 7), msg("a", 7)]);
        let mut two = MessageLog::new();
        two.merge(vec![msg("a", 7)]);
        two.merge(vec![msg("b", 7)]);
        assert_eq!(ids(&one), vec!["a", "b"]);
        assert_eq!(one.snapshot(), two.snapshot());
    }

    #[test]
    fn snapshot_stays_sorted_after_out_of_order_merges() {
        let mut log = MessageLog::new();
        log.merge(vec![msg("late", 300)]);
        log.merge(vec![msg("early", 100), msg("mid", 200)]);
        let timestamps: Vec<u64> = log.messages().iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
    }
}
