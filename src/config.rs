use std::{path::PathBuf, time::Duration};

/// Settings for a [`ChatRoom`](crate::ChatRoom).
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Directory holding the node's secret key. `None` means a throwaway identity.
    pub store_path: Option<PathBuf>,
    /// How long an outbound connection may stay Connecting.
    pub connect_timeout: Duration,
    /// Bound of the UI event channel.
    pub event_capacity: usize,
    /// Largest framed payload accepted from a peer, in bytes.
    pub max_frame_len: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            connect_timeout: Duration::from_secs(30),
            event_capacity: 32,
            max_frame_len: 8 * 1024 * 1024,
        }
    }
}

impl ChatConfig {
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
