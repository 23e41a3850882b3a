//! Session configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default cap on inbound transfer size (64 MiB).
pub const DEFAULT_MAX_TRANSFER_SIZE: u64 = 64 * 1024 * 1024;

/// Default capacity of the application event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Where `persist()` asks the transport to write its snapshot.
    pub save_path: Option<PathBuf>,
    /// JSON bootstrap node list, read on every connect and reconnect.
    pub nodes_path: Option<PathBuf>,
    /// Bootstrap + restart attempts after losing connectivity.
    pub reconnect_attempts: u32,
    /// Delay between reconnect attempts, in seconds.
    pub reconnect_backoff_secs: u64,
    /// Whether a paused outbound transfer withholds chunks.
    pub honor_pause: bool,
    /// Inbound offers larger than this are cancelled.
    pub max_transfer_size: u64,
    /// File name used when sending the avatar.
    pub avatar_filename: String,
    /// Capacity of the application event channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_path: None,
            nodes_path: None,
            reconnect_attempts: 1,
            reconnect_backoff_secs: 5,
            honor_pause: true,
            max_transfer_size: DEFAULT_MAX_TRANSFER_SIZE,
            avatar_filename: "avatar.png".to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Delay between reconnect attempts.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }
}
