use super::*;
use crate::{Message, PeerSet};

impl ChatRoom {
    /// Ordered copy of the message log.
    pub async fn snapshot(&self) -> Result<Vec<Message>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Connected peers plus ourselves.
    pub async fn peer_count(&self) -> Result<usize> {
        self.request(|reply| Command::PeerCount { reply }).await
    }

    pub async fn peers(&self) -> Result<PeerSet> {
        self.request(|reply| Command::Peers { reply }).await
    }
}
