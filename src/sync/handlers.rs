use tracing::{debug, info, warn};

use super::*;
use crate::{Direction, Error, SessionState};

impl<T: Transport> SyncCore<T> {
    /// A channel to `peer_id` is open, in either direction.
    ///
    /// The new peer immediately receives our whole log plus our introduction. An outbound
    /// channel is only taken if it answers the dial still pending for that peer. When a
    /// session is already open, the connection dialed by the smaller identifier wins on
    /// both ends and the other one is closed.
    pub fn on_channel_open(&mut self, peer_id: PeerId, channel: T::Channel, direction: Direction) {
        let dial = self.sessions.pending_dial(&peer_id);
        if direction == Direction::Outbound {
            if dial != Some(channel.id()) {
                debug!(peer = %peer_id, channel_id = channel.id(), "dial abandoned, closing");
                channel.close();
                return;
            }
            self.sessions.clear_dial(&peer_id);
        }

        let mut replaced = false;
        if let Some(current) = self.sessions.get(&peer_id)
            && current.state() == SessionState::Open
        {
            if current.direction == direction || direction != self.preferred_direction(&peer_id)
            {
                debug!(peer = %peer_id, ?direction, "already open, dropping surplus channel");
                channel.close();
                return;
            }
            debug!(peer = %peer_id, ?direction, "both sides dialed, switching channel");
            if let Some(old) = current.channel() {
                old.close();
            }
            replaced = true;
        }

        info!(peer = %peer_id, ?direction, "connection open");
        if let Err(e) = self.send_sync(&channel) {
            warn!(peer = %peer_id, error = %e, "initial sync failed");
            channel.close();
            self.sessions.remove(&peer_id);
            self.status(format!("Connection error: {e}"));
            self.peers_changed();
            return;
        }
        // an inbound channel may arrive while our own dial is still out
        let dial = match direction {
            Direction::Inbound => dial,
            Direction::Outbound => None,
        };
        self.sessions
            .insert_open(peer_id.clone(), direction, channel, dial);
        if !replaced {
            self.status(format!("Connected to {peer_id}"));
            self.peers_changed();
        }
    }

    /// Handle one payload received from `peer_id`.
    ///
    /// Returns the messages newly accepted into the log, which are never relayed onwards.
    pub fn on_channel_data(&mut self, peer_id: &PeerId, bytes: &[u8]) -> Result<Vec<Message>> {
        match Payload::from_bytes(bytes)? {
            Payload::Sync { messages } | Payload::Message { messages } => {
                debug!(peer = %peer_id, received = messages.len(), "received messages");
                let accepted = self.log.merge(messages);
                if !accepted.is_empty() {
                    self.emit(SyncEvent::MessagesAccepted(accepted.clone()));
                }
                Ok(accepted)
            }
            Payload::Init { peer_id: introduced } => {
                self.on_introduction(peer_id, introduced)?;
                Ok(Vec::new())
            }
        }
    }

    /// A frame arrived on channel `channel_id`. Frames from a channel that no longer
    /// backs the peer's session are dropped.
    pub fn on_channel_frame(
        &mut self,
        peer_id: &PeerId,
        channel_id: ChannelId,
        bytes: &[u8],
    ) -> Result<Vec<Message>> {
        if !self.sessions.is_current_channel(peer_id, channel_id) {
            debug!(peer = %peer_id, channel_id, "data from stale channel");
            return Ok(Vec::new());
        }
        self.on_channel_data(peer_id, bytes)
    }

    /// Channel `channel_id` ended. Only closes the session it still backs.
    pub fn on_channel_ended(&mut self, peer_id: &PeerId, channel_id: ChannelId) {
        if self.sessions.is_current_channel(peer_id, channel_id) {
            self.on_channel_close(peer_id);
        } else {
            debug!(peer = %peer_id, channel_id, "stale channel ended");
        }
    }

    /// The dial that reserved `channel_id` failed.
    ///
    /// Failures of abandoned dials are ignored. If an inbound channel already opened the
    /// session, it stays open.
    pub fn on_dial_failed(&mut self, peer_id: &PeerId, channel_id: ChannelId, error: &str) {
        if self.sessions.pending_dial(peer_id) != Some(channel_id) {
            debug!(peer = %peer_id, channel_id, "abandoned dial failed");
            return;
        }
        if self.sessions.state(peer_id) == Some(SessionState::Connecting) {
            self.on_channel_error(peer_id, error);
        } else {
            debug!(peer = %peer_id, error, "dial failed, keeping inbound channel");
            self.sessions.clear_dial(peer_id);
        }
    }

    /// The channel to `peer_id` closed.
    pub fn on_channel_close(&mut self, peer_id: &PeerId) {
        if let Some(session) = self.sessions.remove(peer_id) {
            if let Some(channel) = session.channel() {
                channel.close();
            }
            info!(peer = %peer_id, "connection closed");
            self.status(format!("Connection closed with {peer_id}"));
            self.peers_changed();
        }
    }

    /// The transport reported an error for `peer_id`. Any session with it is closed.
    pub fn on_channel_error(&mut self, peer_id: &PeerId, error: &str) {
        warn!(peer = %peer_id, error, "connection error");
        if let Some(session) = self.sessions.remove(peer_id) {
            if let Some(channel) = session.channel() {
                channel.close();
            }
            self.peers_changed();
        }
        self.status(format!("Connection error: {error}"));
    }

    /// Connect back to an introduced peer we have no session with.
    fn on_introduction(&mut self, from: &PeerId, introduced: PeerId) -> Result<()> {
        if introduced.is_blank()
            || self.identity.as_ref() == Some(&introduced)
            || self.sessions.is_live(&introduced)
        {
            return Ok(());
        }
        info!(peer = %introduced, via = %from, "initiating back-connection");
        match self.connect(&introduced).map(|_| ()) {
            Ok(()) => Ok(()),
            Err(e @ Error::NotInitialized) => Err(e),
            Err(e) => {
                self.status(format!("Back-connection error: {e}"));
                Err(e)
            }
        }
    }
}
