use thiserror::Error;

use crate::PeerId;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the synchronization core.
///
/// None of these are fatal: the runtime reports them as status text and carries on.
#[derive(Error, PartialEq, Debug, Clone)]
pub enum Error {
    #[error("Peer not initialized. Wait a moment and try again.")]
    NotInitialized,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid peer ID: {0}")]
    InvalidTarget(String),
    #[error("Already connected to peer {0}.")]
    AlreadyConnected(PeerId),
    #[error("Not connected to peer {0}.")]
    NotConnected(PeerId),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Chat room has shut down.")]
    Closed,
}
