use super::*;
use crate::{PeerSet, Session};

impl<T: Transport> SyncCore<T> {
    /// Ordered copy of the log.
    pub fn snapshot(&self) -> Vec<Message> {
        self.log.snapshot()
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Open sessions, plus one for ourselves once we have an identity.
    pub fn peer_count(&self) -> usize {
        self.sessions.open_count() + usize::from(self.identity.is_some())
    }

    pub fn local_identity(&self) -> Option<&PeerId> {
        self.identity.as_ref()
    }

    pub fn peers(&self) -> PeerSet {
        self.sessions.open_peers()
    }

    pub fn session(&self, peer_id: &PeerId) -> Option<&Session<T::Channel>> {
        self.sessions.get(peer_id)
    }

    pub fn sessions(&self) -> &SessionManager<T::Channel> {
        &self.sessions
    }

    /// Take every pending notification, oldest first.
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        self.events.drain(..).collect()
    }
}
