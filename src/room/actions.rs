use super::*;
use crate::Message;

impl ChatRoom {
    /// Connect to another peer by its identifier.
    pub async fn connect(&self, peer_id: impl Into<PeerId>) -> Result<()> {
        let peer_id = peer_id.into();
        self.request(|reply| Command::Connect { peer_id, reply })
            .await?
    }

    /// Close the connection to a peer.
    pub async fn disconnect(&self, peer_id: impl Into<PeerId>) -> Result<()> {
        let peer_id = peer_id.into();
        self.request(|reply| Command::Disconnect { peer_id, reply })
            .await?
    }

    /// Author a message and send it to every connected peer.
    pub async fn send_message(&self, text: &str) -> Result<Message> {
        let text = text.to_string();
        self.request(|reply| Command::Send { text, reply }).await?
    }
}
