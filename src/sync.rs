//! Synchronization core
//!
//! [`SyncCore`] owns the message log and the session map. It is driven entirely by
//! method calls: the user-facing actions in `actions`, and the transport callbacks in
//! `handlers`. Nothing in here blocks or spawns, so the same core runs inside the iroh
//! runtime and inside plain synchronous tests.

mod actions;
mod handlers;
mod queries;
mod sessions;

use std::collections::VecDeque;

use crate::{Direction, Message, MessageLog, Payload, PeerId, Result};

pub use sessions::SessionManager;

/// Identity of one underlying connection, used to discard events from a channel that
/// has since been replaced.
pub type ChannelId = u64;

/// Handle to a bidirectional channel owned by the transport.
pub trait Channel {
    fn id(&self) -> ChannelId;
    /// Queue a payload for delivery. Must not block.
    fn send(&self, payload: &Payload) -> Result<()>;
    fn is_open(&self) -> bool;
    /// Close immediately, dropping anything still in flight.
    fn close(&self);
}

/// Outbound half of the transport contract.
///
/// `dial` only requests a channel and returns the id the resulting channel will carry.
/// The outcome is reported back through [`SyncCore::on_channel_open`] or
/// [`SyncCore::on_dial_failed`].
pub trait Transport {
    type Channel: Channel;

    fn dial(&mut self, peer_id: &PeerId) -> Result<ChannelId>;
}

/// Notifications for the presentation layer, drained with [`SyncCore::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Messages that entered the log, local or remote.
    MessagesAccepted(Vec<Message>),
    /// The peer count (open sessions plus self) may have changed.
    PeersChanged(usize),
    /// User-visible, non-fatal notice.
    Status(String),
}

pub struct SyncCore<T: Transport> {
    identity: Option<PeerId>,
    log: MessageLog,
    sessions: SessionManager<T::Channel>,
    transport: T,
    events: VecDeque<SyncEvent>,
}

impl<T: Transport> SyncCore<T> {
    /// Create a core with no local identity yet.
    pub fn new(transport: T) -> Self {
        Self {
            identity: None,
            log: MessageLog::new(),
            sessions: SessionManager::new(),
            transport,
            events: VecDeque::new(),
        }
    }

    /// Create a core whose identity is already known.
    pub fn with_identity(identity: PeerId, transport: T) -> Self {
        let mut core = Self::new(transport);
        core.set_identity(identity);
        core
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub(crate) fn emit(&mut self, event: SyncEvent) {
        self.events.push_back(event);
    }

    pub(crate) fn status(&mut self, status: impl Into<String>) {
        self.emit(SyncEvent::Status(status.into()));
    }

    pub(crate) fn peers_changed(&mut self) {
        let count = self.peer_count();
        self.emit(SyncEvent::PeersChanged(count));
    }

    /// When both sides dial each other, the connection dialed by the smaller identifier
    /// survives on both ends.
    fn preferred_direction(&self, peer_id: &PeerId) -> Direction {
        match &self.identity {
            Some(identity) if identity < peer_id => Direction::Outbound,
            _ => Direction::Inbound,
        }
    }

    /// Send the full log followed by our introduction.
    fn send_sync(&self, channel: &T::Channel) -> Result<()> {
        channel.send(&Payload::Sync {
            messages: self.log.snapshot(),
        })?;
        if let Some(identity) = &self.identity {
            channel.send(&Payload::Init {
                peer_id: identity.clone(),
            })?;
        }
        Ok(())
    }
}
