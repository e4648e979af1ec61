use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use iroh::SecretKey;
use iroh::endpoint::Connection;
use iroh::protocol::{AcceptError, ProtocolHandler, Router};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::PeerId;

/// ALPN spoken between chat peers.
pub const ALPN: &[u8] = b"peer-chat-sync/0";

/// A bound iroh endpoint accepting chat connections.
#[derive(Clone, Debug)]
pub struct Iroh {
    router: Router,
    path: Option<PathBuf>,
}

impl Iroh {
    /// Bind an endpoint and start accepting connections on [`ALPN`].
    ///
    /// With a `path`, the secret key is loaded from (or created in) that directory so the
    /// node keeps its identity across restarts. Without one the identity is ephemeral.
    /// Accepted connections are handed to `inbound`.
    pub async fn new(path: Option<PathBuf>, inbound: mpsc::Sender<Connection>) -> Result<Self> {
        let key = match &path {
            Some(path) => {
                // create dir if it doesn't already exist
                tokio::fs::create_dir_all(path).await?;
                load_secret_key(path.join("keypair")).await?
            }
            None => SecretKey::generate(&mut rand::rng()),
        };
        let endpoint = iroh::Endpoint::builder().secret_key(key).bind().await?;
        info!(id = %endpoint.id(), "endpoint bound");
        let router = Router::builder(endpoint)
            .accept(ALPN, SyncProtocol { inbound })
            .spawn();
        Ok(Self { router, path })
    }

    pub fn endpoint(&self) -> &iroh::Endpoint {
        self.router.endpoint()
    }

    pub fn id(&self) -> PeerId {
        PeerId::from(self.endpoint().id())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn shutdown(self) -> Result<()> {
        self.router.shutdown().await?;
        Ok(())
    }
}

/// Forwards accepted connections to the room and keeps them alive until they close.
#[derive(Debug, Clone)]
struct SyncProtocol {
    inbound: mpsc::Sender<Connection>,
}

impl ProtocolHandler for SyncProtocol {
    async fn accept(&self, connection: Connection) -> std::result::Result<(), AcceptError> {
        if self.inbound.send(connection.clone()).await.is_err() {
            debug!("room gone, refusing inbound connection");
            return Ok(());
        }
        connection.closed().await;
        Ok(())
    }
}

async fn load_secret_key(key_path: PathBuf) -> Result<SecretKey> {
    if key_path.exists() {
        let key_bytes = tokio::fs::read(&key_path).await?;
        let key_bytes: [u8; 32] = key_bytes
            .get(..32)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| anyhow::anyhow!("keyfile '{}' is truncated", key_path.display()))?;
        Ok(SecretKey::from_bytes(&key_bytes))
    } else {
        let secret_key = SecretKey::generate(&mut rand::rng());

        // Try to canonicalize if possible
        let key_path = key_path.canonicalize().unwrap_or(key_path);
        let key_path_parent = key_path.parent().ok_or_else(|| {
            anyhow::anyhow!("no parent directory found for '{}'", key_path.display())
        })?;
        tokio::fs::create_dir_all(&key_path_parent).await?;

        // write to tempfile, then move into place
        let (file, temp_file_path) = tempfile::NamedTempFile::new_in(key_path_parent)
            .context("unable to create tempfile")?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);
        file.write_all(&secret_key.to_bytes())
            .await
            .context("unable to write keyfile")?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(temp_file_path, &key_path)
            .await
            .context("failed to rename keyfile")?;
        debug!(path = %key_path.display(), "generated new secret key");

        Ok(secret_key)
    }
}
