//! Per-friend outbound queue for sends attempted while a friend is offline.
//!
//! Entries are consumed strictly FIFO by a single drain per friend. The
//! drain flag lives under the same lock as the queues so that "queue empty"
//! and "drain finished" are observed together. A drain requested while one
//! is running is not lost: the running drain picks it up before releasing.

use crate::logging::ByteCount;
use crate::transport::FriendHandle;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use tokio::sync::Mutex;

/// A send waiting for its friend to come online.
#[derive(Clone, PartialEq, Eq)]
pub enum QueueEntry {
    /// Text message.
    Text {
        /// Message body.
        body: String,
        /// Whether it is an action message.
        is_action: bool,
    },
    /// File transfer.
    File {
        /// Full payload.
        payload: Vec<u8>,
        /// Display name.
        filename: String,
    },
}

impl fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueEntry::Text { body, is_action } => f
                .debug_struct("Text")
                .field("body", &ByteCount(body.as_bytes()))
                .field("is_action", is_action)
                .finish(),
            QueueEntry::File { payload, filename } => f
                .debug_struct("File")
                .field("payload", &ByteCount(payload))
                .field("filename", filename)
                .finish(),
        }
    }
}

#[derive(Default)]
struct State {
    queues: HashMap<FriendHandle, VecDeque<QueueEntry>>,
    draining: HashSet<FriendHandle>,
    rerun: HashSet<FriendHandle>,
}

/// Queues of every offline friend.
#[derive(Default)]
pub struct MessageQueue {
    state: Mutex<State>,
}

impl MessageQueue {
    /// Create an empty queue map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to a friend's queue.
    pub async fn push(&self, friend: FriendHandle, entry: QueueEntry) {
        self.state
            .lock()
            .await
            .queues
            .entry(friend)
            .or_default()
            .push_back(entry);
    }

    /// Put an entry back at the head, used when a drain is interrupted.
    pub async fn push_front(&self, friend: FriendHandle, entry: QueueEntry) {
        self.state
            .lock()
            .await
            .queues
            .entry(friend)
            .or_default()
            .push_front(entry);
    }

    /// Claim the drain for a friend. Returns `false` if one is already
    /// running; that drain is then asked to go round again before stopping.
    pub async fn begin_drain(&self, friend: FriendHandle) -> bool {
        let mut state = self.state.lock().await;
        if state.draining.insert(friend) {
            return true;
        }
        state.rerun.insert(friend);
        false
    }

    /// Pop the next entry of a running drain.
    ///
    /// When the queue is empty it is removed and the drain released in the
    /// same step, so an entry pushed afterwards waits for the next drain.
    pub async fn next_for_drain(&self, friend: FriendHandle) -> Option<QueueEntry> {
        let mut state = self.state.lock().await;
        let next = state.queues.get_mut(&friend).and_then(VecDeque::pop_front);
        if next.is_none() {
            state.queues.remove(&friend);
            state.draining.remove(&friend);
            state.rerun.remove(&friend);
        }
        next
    }

    /// Stop a drain that could not empty the queue.
    ///
    /// If another drain was requested in the meantime the claim is kept and
    /// `true` is returned: the caller must go round again.
    pub async fn abort_drain(&self, friend: FriendHandle) -> bool {
        let mut state = self.state.lock().await;
        if state.rerun.remove(&friend) {
            return true;
        }
        state.draining.remove(&friend);
        false
    }

    /// Number of entries waiting for a friend.
    pub async fn pending(&self, friend: FriendHandle) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(&friend)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Whether a friend has a queue at all.
    pub async fn has_queue(&self, friend: FriendHandle) -> bool {
        self.state.lock().await.queues.contains_key(&friend)
    }
}
