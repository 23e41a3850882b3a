//! Avatar distribution.
//!
//! Holds the current profile picture and pushes it to friends as an
//! `Avatar` transfer whenever it changes or a friend comes online. Fetching
//! the picture is delegated to an [`AvatarFetcher`].

use crate::error::{Error, Result};
use crate::logging::ShortKey;
use crate::transfer::TransferEngine;
use crate::transport::{FileKind, FriendHandle, TransferId, Transport};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Resolves an avatar source identifier to image bytes.
#[async_trait]
pub trait AvatarFetcher: Send + Sync + 'static {
    /// Fetch the payload behind `source`.
    async fn fetch(&self, source: &str) -> Result<Vec<u8>>;
}

/// Treats the source identifier as a path on the local file system.
#[derive(Debug, Clone, Default)]
pub struct FileAvatarFetcher {
    base_dir: Option<PathBuf>,
}

impl FileAvatarFetcher {
    /// Resolve relative sources against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }
}

#[async_trait]
impl AvatarFetcher for FileAvatarFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        let path = match &self.base_dir {
            Some(dir) => dir.join(source),
            None => PathBuf::from(source),
        };
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::Avatar(format!("{}: {}", path.display(), e)))
    }
}

/// The avatar currently advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    /// Identifier it was fetched from.
    pub source: String,
    /// Image bytes.
    pub payload: Arc<Vec<u8>>,
}

/// Holder of the current avatar.
#[derive(Default)]
pub struct AvatarStore {
    current: RwLock<Option<Avatar>>,
}

impl AvatarStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `source` is the avatar already held.
    pub async fn is_current(&self, source: &str) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .map(|a| a.source == source)
            .unwrap_or(false)
    }

    /// Store a new avatar. Returns `None` if `source` is already held,
    /// otherwise the stored avatar.
    pub async fn replace(&self, source: &str, payload: Vec<u8>) -> Option<Avatar> {
        let mut current = self.current.write().await;
        if current.as_ref().map(|a| a.source == source).unwrap_or(false) {
            return None;
        }
        let avatar = Avatar {
            source: source.to_string(),
            payload: Arc::new(payload),
        };
        info!(source = %ShortKey(source), size = avatar.payload.len(), "Avatar updated");
        *current = Some(avatar.clone());
        Some(avatar)
    }

    /// The avatar currently held, if any.
    pub async fn current(&self) -> Option<Avatar> {
        self.current.read().await.clone()
    }
}

/// Offer `avatar` to one friend and register the outbound transfer.
pub async fn send_avatar(
    transport: &dyn Transport,
    transfers: &TransferEngine,
    friend: FriendHandle,
    filename: &str,
    avatar: &Avatar,
) -> Result<TransferId> {
    let payload = avatar.payload.as_ref().clone();
    let transfer = transport
        .send_file(friend, FileKind::Avatar, filename, payload.len() as u64)
        .await?;
    transfers
        .register_outbound(friend, transfer, FileKind::Avatar, filename, payload)
        .await;
    debug!(friend, transfer, "Avatar offered");
    Ok(transfer)
}
