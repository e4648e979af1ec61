//! iroh-backed transport
//!
//! Every connection carries a single bidirectional QUIC stream of length-prefixed
//! frames. The dialing side opens with a [`Hello`] frame naming itself, since a QUIC
//! stream is invisible to the acceptor until something is written on it. The acceptor
//! names the peer by the connection's authenticated endpoint id and refuses a hello
//! that claims otherwise. After that, each frame is one JSON-encoded [`Payload`].

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use iroh::endpoint::{Connection, RecvStream, SendStream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, warn};

use crate::{ALPN, Channel, ChannelId, Direction, Error, Payload, PeerId, Transport};

const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

/// Events produced by connection tasks, consumed by the room's event loop.
#[derive(Debug)]
pub enum TransportEvent {
    Opened {
        peer_id: PeerId,
        channel: IrohChannel,
        direction: Direction,
    },
    Data {
        peer_id: PeerId,
        channel_id: ChannelId,
        bytes: Bytes,
    },
    Closed {
        peer_id: PeerId,
        channel_id: ChannelId,
    },
    DialFailed {
        peer_id: PeerId,
        channel_id: ChannelId,
        error: String,
    },
    /// An inbound connection failed before it identified itself.
    AcceptFailed { error: String },
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Hello {
    peer_id: PeerId,
}

/// Sending half of one connection.
#[derive(Debug, Clone)]
pub struct IrohChannel {
    id: ChannelId,
    outbox: mpsc::UnboundedSender<Bytes>,
    open: Arc<AtomicBool>,
    connection: Connection,
}

impl Channel for IrohChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn send(&self, payload: &Payload) -> crate::Result<()> {
        let bytes = payload.to_bytes()?;
        self.outbox
            .send(Bytes::from(bytes))
            .map_err(|_| Error::Transport("channel closed".to_string()))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbox.is_closed()
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.connection.close(0u32.into(), b"closed");
        }
    }
}

/// Opens and accepts connections on an iroh endpoint.
#[derive(Debug, Clone)]
pub struct IrohTransport {
    endpoint: iroh::Endpoint,
    local_id: PeerId,
    events: mpsc::UnboundedSender<TransportEvent>,
    next_channel_id: Arc<AtomicU64>,
    max_frame_len: usize,
}

impl IrohTransport {
    pub fn new(
        endpoint: iroh::Endpoint,
        events: mpsc::UnboundedSender<TransportEvent>,
        max_frame_len: usize,
    ) -> Self {
        let local_id = PeerId::from(endpoint.id());
        Self {
            endpoint,
            local_id,
            events,
            next_channel_id: Arc::new(AtomicU64::new(1)),
            max_frame_len,
        }
    }

    /// Take over a connection accepted by the protocol router.
    pub fn accept(&self, connection: Connection) {
        let transport = self.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.open_inbound(connection).await {
                warn!(error = %e, "inbound connection failed");
                transport.emit(TransportEvent::AcceptFailed {
                    error: format!("{e:#}"),
                });
            }
        });
    }

    async fn open_outbound(&self, peer_id: PeerId, channel_id: ChannelId) -> Result<()> {
        let target = peer_id.to_endpoint_id()?;
        let connection = self
            .endpoint
            .connect(target, ALPN)
            .await
            .with_context(|| format!("failed to connect to {peer_id}"))?;
        let (send, recv) = connection.open_bi().await?;
        let mut writer = FramedWrite::new(send, self.codec());
        let hello = serde_json::to_vec(&Hello {
            peer_id: self.local_id.clone(),
        })?;
        writer.send(Bytes::from(hello)).await?;
        let reader = FramedRead::new(recv, self.codec());
        self.spawn_channel(
            peer_id,
            channel_id,
            Direction::Outbound,
            connection,
            writer,
            reader,
        );
        Ok(())
    }

    async fn open_inbound(&self, connection: Connection) -> Result<()> {
        let remote = PeerId::from(connection.remote_id());
        let (send, recv) = connection.accept_bi().await?;
        let mut reader = FramedRead::new(recv, self.codec());
        let frame = tokio::time::timeout(HELLO_TIMEOUT, reader.next())
            .await
            .context("peer did not introduce itself")?
            .ok_or_else(|| anyhow!("stream ended before hello"))??;
        let hello: Hello = serde_json::from_slice(&frame).context("malformed hello")?;
        if let Err(e) = check_hello(&remote, &hello) {
            connection.close(1u32.into(), b"identity mismatch");
            return Err(e);
        }
        let writer = FramedWrite::new(send, self.codec());
        let channel_id = self.reserve_channel_id();
        self.spawn_channel(
            remote,
            channel_id,
            Direction::Inbound,
            connection,
            writer,
            reader,
        );
        Ok(())
    }

    fn spawn_channel(
        &self,
        peer_id: PeerId,
        channel_id: ChannelId,
        direction: Direction,
        connection: Connection,
        writer: FramedWrite<SendStream, LengthDelimitedCodec>,
        reader: FramedRead<RecvStream, LengthDelimitedCodec>,
    ) {
        let open = Arc::new(AtomicBool::new(true));
        let (outbox, inbox) = mpsc::unbounded_channel();
        let channel = IrohChannel {
            id: channel_id,
            outbox,
            open: open.clone(),
            connection: connection.clone(),
        };
        debug!(peer = %peer_id, channel_id, ?direction, "channel established");

        // Opened must be queued before the reader can produce Data for this channel.
        self.emit(TransportEvent::Opened {
            peer_id: peer_id.clone(),
            channel,
            direction,
        });
        tokio::spawn(write_loop(writer, inbox, open.clone()));
        tokio::spawn(read_loop(
            peer_id,
            channel_id,
            connection,
            reader,
            open,
            self.events.clone(),
        ));
    }

    fn reserve_channel_id(&self) -> ChannelId {
        self.next_channel_id.fetch_add(1, Ordering::Relaxed)
    }

    fn codec(&self) -> LengthDelimitedCodec {
        LengthDelimitedCodec::builder()
            .max_frame_length(self.max_frame_len)
            .new_codec()
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            debug!("room gone, dropping transport event");
        }
    }
}

impl Transport for IrohTransport {
    type Channel = IrohChannel;

    fn dial(&mut self, peer_id: &PeerId) -> crate::Result<ChannelId> {
        peer_id
            .to_endpoint_id()
            .map_err(|e| Error::InvalidTarget(format!("{peer_id}: {e}")))?;
        let channel_id = self.reserve_channel_id();
        let transport = self.clone();
        let peer_id = peer_id.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.open_outbound(peer_id.clone(), channel_id).await {
                warn!(peer = %peer_id, error = %e, "dial failed");
                transport.emit(TransportEvent::DialFailed {
                    peer_id,
                    channel_id,
                    error: format!("{e:#}"),
                });
            }
        });
        Ok(channel_id)
    }
}

/// The hello must name the endpoint that authenticated the connection.
fn check_hello(remote: &PeerId, hello: &Hello) -> Result<()> {
    if hello.peer_id.as_str().trim() != remote.as_str() {
        return Err(anyhow!(
            "peer {remote} introduced itself as {}",
            hello.peer_id
        ));
    }
    Ok(())
}

async fn write_loop(
    mut writer: FramedWrite<SendStream, LengthDelimitedCodec>,
    mut inbox: mpsc::UnboundedReceiver<Bytes>,
    open: Arc<AtomicBool>,
) {
    while let Some(frame) = inbox.recv().await {
        if let Err(e) = writer.send(frame).await {
            debug!(error = %e, "write failed");
            break;
        }
    }
    open.store(false, Ordering::Release);
    writer.into_inner().finish().ok();
}

async fn read_loop(
    peer_id: PeerId,
    channel_id: ChannelId,
    connection: Connection,
    mut reader: FramedRead<RecvStream, LengthDelimitedCodec>,
    open: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(bytes) => {
                let event = TransportEvent::Data {
                    peer_id: peer_id.clone(),
                    channel_id,
                    bytes: bytes.freeze(),
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(peer = %peer_id, error = %e, "read failed");
                break;
            }
        }
    }
    open.store(false, Ordering::Release);
    events
        .send(TransportEvent::Closed {
            peer_id,
            channel_id,
        })
        .ok();
    connection.close(0u32.into(), b"bye");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_must_match_authenticated_peer() {
        let remote = PeerId::from("k3y");
        let honest = Hello {
            peer_id: PeerId::from("k3y"),
        };
        let impostor = Hello {
            peer_id: PeerId::from("someone-else"),
        };
        assert!(check_hello(&remote, &honest).is_ok());
        let err = check_hello(&remote, &impostor).unwrap_err();
        assert!(err.to_string().contains("someone-else"));
    }

    #[test]
    fn hello_uses_camel_case() {
        let hello: Hello = serde_json::from_slice(br#"{"peerId":"k3y"}"#).unwrap();
        assert_eq!(hello.peer_id, PeerId::from("k3y"));
    }
}
