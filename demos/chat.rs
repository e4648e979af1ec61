//! # Terminal chat
//!
//! Start a node, share the printed peer ID, and connect to someone else's.
//!
//! ```sh
//! cargo run --example chat
//! cargo run --example chat -- --connect <peer-id>
//! ```
//!
//! Type a line to send it. Commands: `/connect <id>`, `/disconnect <id>`, `/peers`, `/quit`.

use std::{collections::HashSet, path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use peer_chat_sync::{ChatConfig, ChatRoom, Message, PeerId, UiEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Keep the node's identity in this directory across runs
    #[arg(long)]
    store: Option<PathBuf>,
    /// Peer to connect to on startup
    #[arg(long)]
    connect: Option<String>,
    /// Seconds to wait for a connection attempt before giving up
    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let mut config =
        ChatConfig::default().with_connect_timeout(Duration::from_secs(cli.connect_timeout));
    if let Some(store) = cli.store {
        config = config.with_store_path(store);
    }
    let (room, mut events) = ChatRoom::create(config).await?;
    let me = room.id().clone();
    println!("My peer ID: {me} (share this with others to connect)");

    if let Some(peer) = cli.connect {
        // errors also arrive as status events
        room.connect(peer).await.ok();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = HashSet::new();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&room, line.trim()).await {
                    break;
                }
            }
            Some(event) = events.recv() => match event {
                UiEvent::MessagesUpdated(messages) => {
                    for message in messages.iter().filter(|m| shown.insert(m.id.clone())) {
                        render(&me, message);
                    }
                }
                UiEvent::PeerCountChanged(count) => println!("-- peers: {count}"),
                UiEvent::Status(status) => println!("-- {status}"),
            },
        }
    }
    room.shutdown().await
}

/// Returns false when the user asked to quit.
async fn handle_line(room: &ChatRoom, line: &str) -> bool {
    match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => return false,
        ("/connect", peer) => {
            room.connect(peer.trim()).await.ok();
        }
        ("/disconnect", peer) => {
            room.disconnect(peer.trim()).await.ok();
        }
        ("/peers", _) => match room.peers().await {
            Ok(peers) => print!("{peers}"),
            Err(e) => println!("-- {e}"),
        },
        _ => {
            room.send_message(line).await.ok();
        }
    }
    true
}

fn render(me: &PeerId, message: &Message) {
    let mut from = message.origin_peer_id.to_string();
    from.truncate(10);
    if message.is_from(me) {
        println!("[me] {}", message.text);
    } else {
        println!("[{from}] {}", message.text);
    }
}
