mod config;
mod error;
mod iroh;
mod log;
mod message;
mod payload;
mod peer;
mod room;
mod sync;
mod transport;

pub use config::ChatConfig;
pub use error::{Error, Result};
pub use self::iroh::{ALPN, Iroh};
pub use log::MessageLog;
pub use message::Message;
pub use payload::Payload;
pub use peer::{Direction, PeerId, PeerSet, Session, SessionState};
pub use room::{ChatRoom, UiEvent};
pub use sync::{Channel, ChannelId, SessionManager, SyncCore, SyncEvent, Transport};
pub use transport::{IrohChannel, IrohTransport, TransportEvent};
