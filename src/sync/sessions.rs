use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tracing::debug;

use super::{Channel, ChannelId};
use crate::{Direction, PeerId, PeerSet, Session, SessionState};

/// One session per peer identifier.
#[derive(Debug)]
pub struct SessionManager<C> {
    sessions: HashMap<PeerId, Session<C>>,
}

impl<C> Default for SessionManager<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> SessionManager<C> {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&Session<C>> {
        self.sessions.get(peer_id)
    }

    /// A Connecting or Open session exists for this peer.
    pub fn is_live(&self, peer_id: &PeerId) -> bool {
        self.sessions.get(peer_id).is_some_and(Session::is_live)
    }

    pub fn state(&self, peer_id: &PeerId) -> Option<SessionState> {
        self.sessions.get(peer_id).map(Session::state)
    }

    pub fn open_peers(&self) -> PeerSet {
        self.sessions
            .values()
            .filter(|s| s.state == SessionState::Open)
            .map(|s| s.peer_id.clone())
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state == SessionState::Open)
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Channel id of the dial still outstanding for this peer.
    pub fn pending_dial(&self, peer_id: &PeerId) -> Option<ChannelId> {
        self.sessions.get(peer_id).and_then(|s| s.dial)
    }

    pub(crate) fn insert_connecting(
        &mut self,
        peer_id: PeerId,
        dial: ChannelId,
        now: Instant,
    ) -> &Session<C> {
        debug!(peer = %peer_id, dial, "session connecting");
        self.sessions
            .entry(peer_id.clone())
            .insert_entry(Session::connecting(peer_id, dial, now))
            .into_mut()
    }

    /// Replace any session for this peer with an Open one on `channel`.
    pub(crate) fn insert_open(
        &mut self,
        peer_id: PeerId,
        direction: Direction,
        channel: C,
        dial: Option<ChannelId>,
    ) {
        debug!(peer = %peer_id, ?direction, "session open");
        self.sessions
            .insert(peer_id.clone(), Session::open(peer_id, direction, channel, dial));
    }

    /// Forget the outstanding dial without touching the session itself.
    pub(crate) fn clear_dial(&mut self, peer_id: &PeerId) {
        if let Some(session) = self.sessions.get_mut(peer_id) {
            session.dial = None;
        }
    }

    /// Remove a session, marking it Closed. The caller decides what to do with the channel.
    pub(crate) fn remove(&mut self, peer_id: &PeerId) -> Option<Session<C>> {
        let mut session = self.sessions.remove(peer_id)?;
        debug!(peer = %peer_id, from = ?session.state, "session closed");
        session.state = SessionState::Closed;
        Some(session)
    }

    /// Peers still Connecting after `timeout`.
    pub(crate) fn stale_connecting(&self, timeout: Duration, now: Instant) -> Vec<PeerId> {
        self.sessions
            .values()
            .filter(|s| {
                s.state == SessionState::Connecting
                    && now.saturating_duration_since(s.started) >= timeout
            })
            .map(|s| s.peer_id.clone())
            .collect()
    }
}

impl<C: Channel> SessionManager<C> {
    /// Open sessions with their channels.
    pub(crate) fn open_channels(&self) -> impl Iterator<Item = (&PeerId, &C)> {
        self.sessions.iter().filter_map(|(peer_id, session)| match session.state {
            SessionState::Open => session.channel.as_ref().map(|c| (peer_id, c)),
            _ => None,
        })
    }

    /// The session for this peer is Open on exactly this channel.
    pub fn is_current_channel(&self, peer_id: &PeerId, channel_id: ChannelId) -> bool {
        self.sessions
            .get(peer_id)
            .and_then(|s| s.channel.as_ref())
            .is_some_and(|c| c.id() == channel_id)
    }
}
