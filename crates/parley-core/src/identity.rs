//! Friend identity cache.
//!
//! Maps transport-local friend handles to long-term public-key hex strings
//! and back. Entries are filled lazily and never evicted during a session:
//! the transport never reuses a handle for a different key while running.

use crate::address::public_key_hex;
use crate::error::{Error, Result};
use crate::logging::ShortKey;
use crate::transport::{FriendHandle, Transport};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Default)]
struct Maps {
    by_handle: HashMap<FriendHandle, String>,
    by_hex: HashMap<String, FriendHandle>,
}

impl Maps {
    fn insert(&mut self, friend: FriendHandle, hex: String) {
        self.by_hex.insert(hex.clone(), friend);
        self.by_handle.insert(friend, hex);
    }
}

/// Bidirectional handle ↔ hex cache.
#[derive(Default)]
pub struct IdentityCache {
    maps: RwLock<Maps>,
}

impl IdentityCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a public-key hex string to a friend handle.
    ///
    /// A miss triggers one full friend-list refresh before giving up.
    pub async fn resolve_handle(&self, transport: &dyn Transport, hex: &str) -> Result<FriendHandle> {
        let hex = normalize(hex);
        if let Some(friend) = self.maps.read().await.by_hex.get(&hex) {
            return Ok(*friend);
        }

        debug!(key = %ShortKey(&hex), "Identity miss, refreshing friend list");
        self.refresh(transport).await?;

        self.maps
            .read()
            .await
            .by_hex
            .get(&hex)
            .copied()
            .ok_or(Error::UnknownFriend(hex))
    }

    /// Resolve a friend handle to its public-key hex string.
    ///
    /// A miss costs exactly one transport lookup.
    pub async fn resolve_hex(&self, transport: &dyn Transport, friend: FriendHandle) -> Result<String> {
        if let Some(hex) = self.maps.read().await.by_handle.get(&friend) {
            return Ok(hex.clone());
        }

        let key = transport.friend_public_key(friend).await?;
        let hex = public_key_hex(&key);
        self.maps.write().await.insert(friend, hex.clone());
        debug!(friend, key = %ShortKey(&hex), "Cached friend identity");
        Ok(hex)
    }

    /// Fetch the full friend list and cache every handle not yet known.
    ///
    /// Returns the number of new entries. A single failed key lookup is
    /// logged and skipped.
    pub async fn refresh(&self, transport: &dyn Transport) -> Result<usize> {
        let friends = transport.friend_list().await?;
        let mut added = 0;

        for friend in friends {
            if self.maps.read().await.by_handle.contains_key(&friend) {
                continue;
            }
            match transport.friend_public_key(friend).await {
                Ok(key) => {
                    self.maps.write().await.insert(friend, public_key_hex(&key));
                    added += 1;
                }
                Err(e) => warn!(friend, error = %e, "Failed to fetch friend key"),
            }
        }

        debug!(added, "Friend list refreshed");
        Ok(added)
    }

    /// Record a pair learned outside of a lookup (e.g. an accepted request).
    pub async fn insert(&self, friend: FriendHandle, hex: &str) {
        self.maps.write().await.insert(friend, normalize(hex));
    }

    /// Cached hex for a handle, without touching the transport.
    pub async fn cached_hex(&self, friend: FriendHandle) -> Option<String> {
        self.maps.read().await.by_handle.get(&friend).cloned()
    }

    /// Number of cached friends.
    pub async fn len(&self) -> usize {
        self.maps.read().await.by_handle.len()
    }

    /// Whether nothing is cached yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn normalize(hex: &str) -> String {
    hex.trim().to_ascii_uppercase()
}
