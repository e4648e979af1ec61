//! Chat room runtime
//!
//! [`ChatRoom`] is a handle to a task that owns the [`SyncCore`] and feeds it user
//! commands, transport events and a connect-timeout tick one at a time.

mod actions;
mod events;
mod queries;

use crate::{ChatConfig, Error, Iroh, IrohTransport, PeerId, Result, SyncCore};
use anyhow::Context;
use tokio::sync::{mpsc, oneshot};

pub use events::UiEvent;
use events::{Command, EventLoop};

/// Handle to a running chat node.
///
/// The synchronization core lives inside a single task; every method here is a request
/// to that task, so operations never interleave.
pub struct ChatRoom {
    id: PeerId,
    iroh: Iroh,
    commands: mpsc::Sender<Command>,
    /// Event loop handle
    event_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Drop for ChatRoom {
    fn drop(&mut self) {
        if let Some(handle) = self.event_handle.take() {
            handle.abort();
        }
    }
}

impl ChatRoom {
    /// Bind an endpoint and start the event loop.
    pub async fn create(config: ChatConfig) -> anyhow::Result<(Self, mpsc::Receiver<UiEvent>)> {
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let iroh = Iroh::new(config.store_path.clone(), inbound_tx)
            .await
            .context("failed to start iroh endpoint")?;
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let transport =
            IrohTransport::new(iroh.endpoint().clone(), transport_tx, config.max_frame_len);
        let id = iroh.id();
        let core = SyncCore::with_identity(id.clone(), transport);

        let (ui_tx, ui_rx) = mpsc::channel(config.event_capacity);
        let (command_tx, command_rx) = mpsc::channel(32);
        let event_loop = EventLoop::new(core, ui_tx, config.connect_timeout);
        let event_handle = tokio::spawn(event_loop.run(command_rx, transport_rx, inbound_rx));

        Ok((
            Self {
                id,
                iroh,
                commands: command_tx,
                event_handle: Some(event_handle),
            },
            ui_rx,
        ))
    }

    /// Local identity, to be shared with others so they can connect.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn iroh(&self) -> &Iroh {
        &self.iroh
    }

    /// Stop the event loop and close the endpoint.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(handle) = self.event_handle.take() {
            handle.abort();
        }
        self.iroh.clone().shutdown().await
    }

    async fn request<R>(&self, command: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| Error::Closed)?;
        response.await.map_err(|_| Error::Closed)
    }
}
