use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::*;
use crate::{Error, Session};

impl<T: Transport> SyncCore<T> {
    /// Assign the local identity once the transport has one for us.
    pub fn set_identity(&mut self, identity: PeerId) {
        info!(peer = %identity, "local identity assigned");
        self.identity = Some(identity);
        self.peers_changed();
    }

    /// Author a message and broadcast it to every open session.
    pub fn append(&mut self, text: &str) -> Result<Message> {
        let identity = self.identity.clone().ok_or(Error::NotInitialized)?;
        let message = self.log.append(text, &identity)?;
        self.broadcast(&Payload::Message {
            messages: vec![message.clone()],
        });
        self.emit(SyncEvent::MessagesAccepted(vec![message.clone()]));
        Ok(message)
    }

    /// Request a channel to `peer_id` and track it as Connecting.
    pub fn connect(&mut self, peer_id: &PeerId) -> Result<&Session<T::Channel>> {
        let identity = self.identity.as_ref().ok_or(Error::NotInitialized)?;
        if peer_id.is_blank() || peer_id == identity {
            return Err(Error::InvalidTarget(peer_id.to_string()));
        }
        if self.sessions.is_live(peer_id) {
            return Err(Error::AlreadyConnected(peer_id.clone()));
        }
        let dial = self.transport.dial(peer_id)?;
        info!(peer = %peer_id, dial, "connecting");
        Ok(self
            .sessions
            .insert_connecting(peer_id.clone(), dial, Instant::now()))
    }

    /// Close the session with `peer_id` immediately. A dial still in flight is abandoned:
    /// its channel is closed on arrival.
    pub fn disconnect(&mut self, peer_id: &PeerId) -> Result<()> {
        let session = self
            .sessions
            .remove(peer_id)
            .ok_or_else(|| Error::NotConnected(peer_id.clone()))?;
        if let Some(channel) = session.channel() {
            channel.close();
        }
        info!(peer = %peer_id, "disconnected");
        self.status(format!("Disconnected from {peer_id}"));
        self.peers_changed();
        Ok(())
    }

    /// Give up on sessions that never opened, as if their channel had closed.
    pub fn expire_connecting(&mut self, timeout: Duration, now: Instant) -> Vec<PeerId> {
        let stale = self.sessions.stale_connecting(timeout, now);
        for peer_id in &stale {
            warn!(peer = %peer_id, ?timeout, "connection attempt timed out");
            self.sessions.remove(peer_id);
            self.status(format!("Connection to {peer_id} timed out"));
        }
        stale
    }

    /// Send `payload` to every open session, pruning the ones that can no longer take it.
    ///
    /// Returns how many sessions the payload was handed to.
    pub fn broadcast(&mut self, payload: &Payload) -> usize {
        debug!(kind = payload.kind(), sessions = self.sessions.open_count(), "broadcasting");
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (peer_id, channel) in self.sessions.open_channels() {
            if !channel.is_open() {
                debug!(peer = %peer_id, "channel closed, removing");
                dead.push(peer_id.clone());
                continue;
            }
            match channel.send(payload) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(peer = %peer_id, error = %e, "send failed, removing");
                    dead.push(peer_id.clone());
                }
            }
        }
        if !dead.is_empty() {
            for peer_id in &dead {
                if let Some(session) = self.sessions.remove(peer_id)
                    && let Some(channel) = session.channel()
                {
                    channel.close();
                }
            }
            self.peers_changed();
        }
        delivered
    }
}
