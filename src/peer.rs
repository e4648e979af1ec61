use std::{
    collections::BTreeSet,
    fmt::Display,
    ops::{Deref, DerefMut},
    str::FromStr,
    time::Instant,
};

use iroh::EndpointId;
use serde::{Deserialize, Serialize};

use crate::ChannelId;

/// Opaque identifier naming a participant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for identifiers that are empty once whitespace is stripped.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Interpret this identifier as an iroh endpoint id.
    pub fn to_endpoint_id(&self) -> anyhow::Result<EndpointId> {
        Ok(EndpointId::from_str(self.0.trim())?)
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<EndpointId> for PeerId {
    fn from(id: EndpointId) -> Self {
        Self(id.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// Which side initiated the connection.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// One live connection to a remote peer.
///
/// The session only holds a handle to the channel; the transport owns the connection.
#[derive(Debug)]
pub struct Session<C> {
    pub peer_id: PeerId,
    pub direction: Direction,
    pub(crate) state: SessionState,
    pub(crate) channel: Option<C>,
    /// Channel id reserved for our outstanding dial to this peer, if any.
    pub(crate) dial: Option<ChannelId>,
    pub(crate) started: Instant,
}

impl<C> Session<C> {
    pub(crate) fn connecting(peer_id: PeerId, dial: ChannelId, started: Instant) -> Self {
        Self {
            peer_id,
            direction: Direction::Outbound,
            state: SessionState::Connecting,
            channel: None,
            dial: Some(dial),
            started,
        }
    }

    pub(crate) fn open(
        peer_id: PeerId,
        direction: Direction,
        channel: C,
        dial: Option<ChannelId>,
    ) -> Self {
        Self {
            peer_id,
            direction,
            state: SessionState::Open,
            channel: Some(channel),
            dial,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    /// Our dial to this peer has not resolved yet.
    pub fn dial_pending(&self) -> bool {
        self.dial.is_some()
    }

    /// Connecting or Open.
    pub fn is_live(&self) -> bool {
        matches!(self.state, SessionState::Connecting | SessionState::Open)
    }
}

/// Peers currently believed reachable.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSet(BTreeSet<PeerId>);

impl Deref for PeerSet {
    type Target = BTreeSet<PeerId>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for PeerSet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<PeerId> for PeerSet {
    fn from_iter<I: IntoIterator<Item = PeerId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for PeerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for id in self.0.iter() {
            let mut id = id.to_string();
            id.truncate(10);
            writeln!(f, "[{}...]", id)?;
        }
        Ok(())
    }
}
