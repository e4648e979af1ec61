#![allow(dead_code)]

//! In-memory transport and a mesh harness that pumps payloads between cores
//! synchronously.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashSet, VecDeque},
    rc::Rc,
};

use peer_chat_sync::*;

#[derive(Debug, Clone)]
pub struct MemoryChannel {
    id: ChannelId,
    open: Rc<Cell<bool>>,
    outbox: Rc<RefCell<VecDeque<Vec<u8>>>>,
}

impl MemoryChannel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            open: Rc::new(Cell::new(true)),
            outbox: Rc::default(),
        }
    }

    /// Both ends of one connection: closing either closes both.
    pub fn pair(local: ChannelId, remote: ChannelId) -> (Self, Self) {
        let near = Self::new(local);
        let far = Self {
            id: remote,
            open: near.open.clone(),
            outbox: Rc::default(),
        };
        (near, far)
    }

    /// Simulate the remote end going away without telling us.
    pub fn break_link(&self) {
        self.open.set(false);
    }

    /// Everything sent so far and not yet delivered, decoded.
    pub fn pending(&self) -> Vec<Payload> {
        self.outbox
            .borrow()
            .iter()
            .map(|bytes| Payload::from_bytes(bytes).unwrap())
            .collect()
    }

    fn take(&self) -> Vec<Vec<u8>> {
        self.outbox.borrow_mut().drain(..).collect()
    }
}

impl Channel for MemoryChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn send(&self, payload: &Payload) -> Result<()> {
        if !self.open.get() {
            return Err(Error::Transport("channel closed".to_string()));
        }
        self.outbox.borrow_mut().push_back(payload.to_bytes()?);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn close(&self) {
        self.open.set(false);
    }
}

/// Records dial requests; peers in `refuse` fail immediately.
///
/// Dials reserve channel ids counting up from 1.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pub dials: Vec<PeerId>,
    pub refuse: HashSet<PeerId>,
    reserved: Vec<ChannelId>,
}

impl MemoryTransport {
    /// Channel id reserved by the latest dial to `peer_id`.
    pub fn dial_id(&self, peer_id: &PeerId) -> ChannelId {
        let index = self.dials.iter().rposition(|p| p == peer_id).unwrap();
        self.reserved[index]
    }

    /// The channel that answers the latest dial to `peer_id`.
    pub fn answer(&self, peer_id: &PeerId) -> MemoryChannel {
        MemoryChannel::new(self.dial_id(peer_id))
    }
}

impl Transport for MemoryTransport {
    type Channel = MemoryChannel;

    fn dial(&mut self, peer_id: &PeerId) -> Result<ChannelId> {
        if self.refuse.contains(peer_id) {
            return Err(Error::Transport(format!("connection refused by {peer_id}")));
        }
        let id = self.reserved.len() as ChannelId + 1;
        self.dials.push(peer_id.clone());
        self.reserved.push(id);
        Ok(id)
    }
}

pub type Core = SyncCore<MemoryTransport>;

pub fn new_core(name: &str) -> Core {
    SyncCore::with_identity(PeerId::from(name), MemoryTransport::default())
}

pub fn msg(id: &str, origin: &str, timestamp: u64) -> Message {
    Message {
        id: id.to_string(),
        origin_peer_id: PeerId::from(origin),
        text: format!("text of {id}"),
        timestamp,
    }
}

pub fn ids(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.id.clone()).collect()
}

struct Wire {
    from: PeerId,
    to: PeerId,
    channel: MemoryChannel,
}

/// A set of named cores with explicit links between them.
#[derive(Default)]
pub struct Mesh {
    pub cores: BTreeMap<String, Core>,
    wires: Vec<Wire>,
    next_channel_id: ChannelId,
}

impl Mesh {
    pub fn new(names: &[&str]) -> Self {
        let mut mesh = Self::default();
        for name in names {
            mesh.cores.insert(name.to_string(), new_core(name));
        }
        mesh
    }

    pub fn core(&self, name: &str) -> &Core {
        &self.cores[name]
    }

    pub fn core_mut(&mut self, name: &str) -> &mut Core {
        self.cores.get_mut(name).unwrap()
    }

    /// `from` connects to `to` and both ends see the channel open.
    pub fn link(&mut self, from: &str, to: &str) {
        let (a, b) = (PeerId::from(from), PeerId::from(to));
        self.core_mut(from).connect(&b).unwrap();
        let outbound = self.core(from).transport().answer(&b);
        let inbound = self.channel();
        self.core_mut(from)
            .on_channel_open(b.clone(), outbound.clone(), Direction::Outbound);
        self.core_mut(to)
            .on_channel_open(a.clone(), inbound.clone(), Direction::Inbound);
        self.wires.push(Wire {
            from: a.clone(),
            to: b.clone(),
            channel: outbound,
        });
        self.wires.push(Wire {
            from: b,
            to: a,
            channel: inbound,
        });
    }

    /// The channel `from` uses to talk to `to`.
    pub fn wire(&self, from: &str, to: &str) -> &MemoryChannel {
        let (from, to) = (PeerId::from(from), PeerId::from(to));
        &self
            .wires
            .iter()
            .rev()
            .find(|w| w.from == from && w.to == to)
            .unwrap()
            .channel
    }

    /// Deliver queued payloads until every wire is empty.
    pub fn pump(&mut self) {
        loop {
            let mut delivered = false;
            for i in 0..self.wires.len() {
                let frames = self.wires[i].channel.take();
                if frames.is_empty() {
                    continue;
                }
                delivered = true;
                let from = self.wires[i].from.clone();
                let to = self.wires[i].to.to_string();
                for frame in frames {
                    self.core_mut(&to).on_channel_data(&from, &frame).unwrap();
                }
            }
            if !delivered {
                break;
            }
        }
    }

    /// Inbound ids start high so they never meet a dial's reserved id.
    fn channel(&mut self) -> MemoryChannel {
        self.next_channel_id += 1;
        MemoryChannel::new(1000 + self.next_channel_id)
    }
}
