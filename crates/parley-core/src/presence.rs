//! Friend presence tracking.
//!
//! Fed only by transport presence events. Friends never seen are offline.

use crate::transport::{FriendHandle, UserStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Last known presence of one friend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceState {
    /// Whether the friend is reachable.
    pub online: bool,
    /// Advertised status.
    pub status: Option<UserStatus>,
    /// Advertised status message.
    pub status_message: Option<String>,
    /// Whether the friend is typing.
    pub typing: Option<bool>,
}

/// Per-friend presence map.
#[derive(Default)]
pub struct PresenceTracker {
    friends: RwLock<HashMap<FriendHandle, PresenceState>>,
}

impl PresenceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record connectivity. Returns `true` on an offline → online transition.
    pub async fn set_online(&self, friend: FriendHandle, online: bool) -> bool {
        let mut friends = self.friends.write().await;
        let state = friends.entry(friend).or_default();
        let was_online = state.online;
        state.online = online;
        if !online {
            state.typing = None;
        }
        online && !was_online
    }

    /// Whether the friend is currently online.
    pub async fn is_online(&self, friend: FriendHandle) -> bool {
        self.friends
            .read()
            .await
            .get(&friend)
            .map(|s| s.online)
            .unwrap_or(false)
    }

    /// Record a raw status code and return the interpreted status.
    pub async fn set_status(&self, friend: FriendHandle, code: u8) -> UserStatus {
        let status = UserStatus::from_code(code);
        self.friends.write().await.entry(friend).or_default().status = Some(status);
        status
    }

    /// Record a status message.
    pub async fn set_status_message(&self, friend: FriendHandle, message: &str) {
        self.friends
            .write()
            .await
            .entry(friend)
            .or_default()
            .status_message = Some(message.to_string());
    }

    /// Record the typing flag.
    pub async fn set_typing(&self, friend: FriendHandle, typing: bool) {
        self.friends.write().await.entry(friend).or_default().typing = Some(typing);
    }

    /// Full presence of one friend.
    pub async fn snapshot(&self, friend: FriendHandle) -> PresenceState {
        self.friends
            .read()
            .await
            .get(&friend)
            .cloned()
            .unwrap_or_default()
    }

    /// Handles of every friend currently online, in ascending order.
    pub async fn online_friends(&self) -> Vec<FriendHandle> {
        let mut online: Vec<FriendHandle> = self
            .friends
            .read()
            .await
            .iter()
            .filter(|(_, s)| s.online)
            .map(|(f, _)| *f)
            .collect();
        online.sort_unstable();
        online
    }

    /// Mark everyone offline. Used when our own connectivity drops.
    pub async fn clear(&self) {
        for state in self.friends.write().await.values_mut() {
            state.online = false;
            state.typing = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_friend_offline() {
        let presence = PresenceTracker::new();
        assert!(!presence.is_online(99).await);
        assert_eq!(presence.snapshot(99).await, PresenceState::default());
    }

    #[tokio::test]
    async fn test_transition_reported_once() {
        let presence = PresenceTracker::new();
        assert!(presence.set_online(1, true).await);
        assert!(!presence.set_online(1, true).await);
        assert!(!presence.set_online(1, false).await);
        assert!(presence.set_online(1, true).await);
    }

    #[tokio::test]
    async fn test_status_passthrough() {
        let presence = PresenceTracker::new();
        assert_eq!(presence.set_status(3, 2).await, UserStatus::Busy);
        assert_eq!(presence.set_status(4, 200).await, UserStatus::Online);
        presence.set_status_message(3, "brb").await;
        presence.set_typing(3, true).await;

        let state = presence.snapshot(3).await;
        assert_eq!(state.status, Some(UserStatus::Busy));
        assert_eq!(state.status_message.as_deref(), Some("brb"));
        assert_eq!(state.typing, Some(true));
        assert!(!state.online);
    }

    #[tokio::test]
    async fn test_online_friends_and_clear() {
        let presence = PresenceTracker::new();
        presence.set_online(5, true).await;
        presence.set_online(2, true).await;
        presence.set_online(9, false).await;
        assert_eq!(presence.online_friends().await, vec![2, 5]);

        presence.clear().await;
        assert!(presence.online_friends().await.is_empty());
        assert!(presence.set_online(5, true).await);
    }
}
