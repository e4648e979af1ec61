use std::time::{Duration, Instant};

use iroh::endpoint::Connection;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{IrohTransport, Message, PeerId, PeerSet, Result, SyncCore, SyncEvent, TransportEvent};

const TICK: Duration = Duration::from_secs(1);

/// Public events the room sends to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// The full ordered log, sent whenever it gains messages.
    MessagesUpdated(Vec<Message>),
    /// Connected peers plus ourselves.
    PeerCountChanged(usize),
    /// Non-fatal notice, e.g. an invalid peer ID or a dropped connection.
    Status(String),
}

pub(crate) enum Command {
    Connect {
        peer_id: PeerId,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        peer_id: PeerId,
        reply: oneshot::Sender<Result<()>>,
    },
    Send {
        text: String,
        reply: oneshot::Sender<Result<Message>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Message>>,
    },
    PeerCount {
        reply: oneshot::Sender<usize>,
    },
    Peers {
        reply: oneshot::Sender<PeerSet>,
    },
}

/// Owns the core and feeds it one input at a time.
pub(crate) struct EventLoop {
    core: SyncCore<IrohTransport>,
    ui: mpsc::Sender<UiEvent>,
    connect_timeout: Duration,
}

impl EventLoop {
    pub(crate) fn new(
        core: SyncCore<IrohTransport>,
        ui: mpsc::Sender<UiEvent>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            core,
            ui,
            connect_timeout,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut transport: mpsc::UnboundedReceiver<TransportEvent>,
        mut inbound: mpsc::Receiver<Connection>,
    ) {
        let mut tick = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break, // Room dropped
                },
                Some(event) = transport.recv() => self.handle_transport(event),
                Some(connection) = inbound.recv() => self.core.transport().accept(connection),
                _ = tick.tick() => {
                    self.core.expire_connecting(self.connect_timeout, Instant::now());
                }
            }
            if self.flush().await.is_err() {
                break; // UI channel closed
            }
        }
        debug!("event loop finished");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { peer_id, reply } => {
                let result = self.core.connect(&peer_id).map(|_| ());
                reply.send(self.reported(result)).ok();
            }
            Command::Disconnect { peer_id, reply } => {
                let result = self.core.disconnect(&peer_id);
                reply.send(self.reported(result)).ok();
            }
            Command::Send { text, reply } => {
                let result = self.core.append(&text);
                reply.send(self.reported(result)).ok();
            }
            Command::Snapshot { reply } => {
                reply.send(self.core.snapshot()).ok();
            }
            Command::PeerCount { reply } => {
                reply.send(self.core.peer_count()).ok();
            }
            Command::Peers { reply } => {
                reply.send(self.core.peers()).ok();
            }
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened {
                peer_id,
                channel,
                direction,
            } => self.core.on_channel_open(peer_id, channel, direction),
            TransportEvent::Data {
                peer_id,
                channel_id,
                bytes,
            } => {
                let result = self.core.on_channel_frame(&peer_id, channel_id, &bytes);
                if let Err(e) = result {
                    warn!(peer = %peer_id, error = %e, "rejected payload");
                    self.core.status(e.to_string());
                }
            }
            TransportEvent::Closed {
                peer_id,
                channel_id,
            } => self.core.on_channel_ended(&peer_id, channel_id),
            TransportEvent::DialFailed {
                peer_id,
                channel_id,
                error,
            } => self.core.on_dial_failed(&peer_id, channel_id, &error),
            TransportEvent::AcceptFailed { error } => {
                self.core.status(format!("Connection error: {error}"));
            }
        }
    }

    /// Surface a failed operation as a status notice as well as returning it.
    fn reported<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.core.status(format!("Error: {e}"));
        }
        result
    }

    /// Forward pending core notifications to the UI, coalescing redundant ones.
    async fn flush(&mut self) -> std::result::Result<(), mpsc::error::SendError<UiEvent>> {
        let mut log_changed = false;
        let mut peer_count = None;
        let mut statuses = Vec::new();
        for event in self.core.drain_events() {
            match event {
                SyncEvent::MessagesAccepted(_) => log_changed = true,
                SyncEvent::PeersChanged(count) => peer_count = Some(count),
                SyncEvent::Status(status) => statuses.push(status),
            }
        }
        for status in statuses {
            self.ui.send(UiEvent::Status(status)).await?;
        }
        if let Some(count) = peer_count {
            self.ui.send(UiEvent::PeerCountChanged(count)).await?;
        }
        if log_changed {
            self.ui
                .send(UiEvent::MessagesUpdated(self.core.snapshot()))
                .await?;
        }
        Ok(())
    }
}
