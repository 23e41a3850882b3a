//! In-memory transport used by the integration tests.
//!
//! Friends are seeded with a handle and a key. Each call is recorded in
//! order; refused calls land in a separate log so tests can tell "attempted"
//! from "sent".

#![allow(dead_code)]

use async_trait::async_trait;
use parley_core::transport::{
    FileControl, FileKind, FriendHandle, MessageKind, PublicKey, TransferId, Transport,
    TransportError,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// One accepted call into the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AddFriend(PublicKey),
    Message {
        friend: FriendHandle,
        kind: MessageKind,
        body: String,
    },
    SendFile {
        friend: FriendHandle,
        kind: FileKind,
        filename: String,
        size: u64,
        transfer: TransferId,
    },
    Chunk {
        friend: FriendHandle,
        transfer: TransferId,
        position: u64,
        data: Vec<u8>,
    },
    Control {
        friend: FriendHandle,
        transfer: TransferId,
        control: FileControl,
    },
    Bootstrap {
        address: String,
        port: u16,
    },
    SetName(String),
    Start,
    Stop,
    Save(PathBuf),
}

#[derive(Default)]
struct State {
    friends: HashMap<FriendHandle, PublicKey>,
    names: HashMap<FriendHandle, String>,
    offline: HashSet<FriendHandle>,
    calls: Vec<Call>,
    refused: Vec<Call>,
    key_lookups: usize,
    next_transfer: TransferId,
    next_friend: FriendHandle,
    fail_start: bool,
    fail_chunks: bool,
    fail_identity: bool,
    rejected_bodies: HashSet<String>,
    hold: Option<(String, Arc<Notify>)>,
    holding: bool,
    fail_bootstrap: HashSet<String>,
}

/// Scriptable [`Transport`] double.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

pub const OWN_KEY: PublicKey = [0xAB; 32];
pub const OWN_NOSPAM: u32 = 0x0102_0304;

/// Deterministic key for a friend handle.
pub fn key_for(friend: FriendHandle) -> PublicKey {
    let mut key = [0u8; 32];
    key[0] = 0x10;
    key[28..].copy_from_slice(&friend.to_be_bytes());
    key
}

/// Upper-case hex of [`key_for`].
pub fn hex_for(friend: FriendHandle) -> String {
    hex::encode_upper(key_for(friend))
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a friend that is online as far as the transport is concerned.
    pub fn with_friend(self, friend: FriendHandle) -> Self {
        {
            let mut state = self.lock();
            state.friends.insert(friend, key_for(friend));
            state.next_friend = state.next_friend.max(friend + 1);
        }
        self
    }

    pub fn set_name_of(&self, friend: FriendHandle, name: &str) {
        self.lock().names.insert(friend, name.to_string());
    }

    /// Make sends to `friend` fail with `FriendNotConnected`.
    pub fn set_offline(&self, friend: FriendHandle, offline: bool) {
        let mut state = self.lock();
        if offline {
            state.offline.insert(friend);
        } else {
            state.offline.remove(&friend);
        }
    }

    pub fn fail_start(&self, fail: bool) {
        self.lock().fail_start = fail;
    }

    pub fn fail_chunks(&self, fail: bool) {
        self.lock().fail_chunks = fail;
    }

    pub fn fail_identity(&self, fail: bool) {
        self.lock().fail_identity = fail;
    }

    /// Refuse every message with this body with a generic failure.
    pub fn reject_body(&self, body: &str) {
        self.lock().rejected_bodies.insert(body.to_string());
    }

    /// Park the next send of `body` after its outcome is decided, until the
    /// returned handle is notified.
    pub fn hold_message(&self, body: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.lock().hold = Some((body.to_string(), Arc::clone(&notify)));
        notify
    }

    /// Whether a held send is currently parked.
    pub fn is_holding(&self) -> bool {
        self.lock().holding
    }

    pub fn fail_bootstrap(&self, address: &str) {
        self.lock().fail_bootstrap.insert(address.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn refused(&self) -> Vec<Call> {
        self.lock().refused.clone()
    }

    pub fn key_lookups(&self) -> usize {
        self.lock().key_lookups
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Message { body, .. } => Some(body),
                _ => None,
            })
            .collect()
    }

    pub fn send_files(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SendFile { .. }))
            .collect()
    }

    pub fn chunks(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Chunk { .. }))
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("mock state poisoned")
    }

    fn gate(&self, friend: FriendHandle, call: Call) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.friends.contains_key(&friend) {
            state.refused.push(call);
            return Err(TransportError::FriendNotFound);
        }
        if state.offline.contains(&friend) {
            state.refused.push(call);
            return Err(TransportError::FriendNotConnected);
        }
        state.calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn add_friend_norequest(
        &self,
        public_key: &PublicKey,
    ) -> Result<FriendHandle, TransportError> {
        let mut state = self.lock();
        let friend = state.next_friend;
        state.next_friend += 1;
        state.friends.insert(friend, *public_key);
        state.calls.push(Call::AddFriend(*public_key));
        Ok(friend)
    }

    async fn send_message(
        &self,
        friend: FriendHandle,
        kind: MessageKind,
        body: &str,
    ) -> Result<u32, TransportError> {
        let call = Call::Message {
            friend,
            kind,
            body: body.to_string(),
        };
        let (rejected, hold) = {
            let mut state = self.lock();
            let held = state.hold.as_ref().map_or(false, |(held, _)| held == body);
            let hold = if held {
                state.hold.take().map(|(_, notify)| notify)
            } else {
                None
            };
            (state.rejected_bodies.contains(body), hold)
        };

        let result = if rejected {
            self.lock().refused.push(call);
            Err(TransportError::Failed("message rejected".into()))
        } else {
            self.gate(friend, call)
        };

        if let Some(release) = hold {
            self.lock().holding = true;
            release.notified().await;
            self.lock().holding = false;
        }
        result.map(|()| 0)
    }

    async fn send_file(
        &self,
        friend: FriendHandle,
        kind: FileKind,
        filename: &str,
        size: u64,
    ) -> Result<TransferId, TransportError> {
        let transfer = self.lock().next_transfer;
        self.gate(
            friend,
            Call::SendFile {
                friend,
                kind,
                filename: filename.to_string(),
                size,
                transfer,
            },
        )?;
        self.lock().next_transfer += 1;
        Ok(transfer)
    }

    async fn send_file_chunk(
        &self,
        friend: FriendHandle,
        transfer: TransferId,
        position: u64,
        data: Vec<u8>,
    ) -> Result<(), TransportError> {
        let call = Call::Chunk {
            friend,
            transfer,
            position,
            data,
        };
        let mut state = self.lock();
        if state.fail_chunks {
            state.refused.push(call);
            return Err(TransportError::Failed("chunk queue full".into()));
        }
        state.calls.push(call);
        Ok(())
    }

    async fn file_control(
        &self,
        friend: FriendHandle,
        transfer: TransferId,
        control: FileControl,
    ) -> Result<(), TransportError> {
        self.lock().calls.push(Call::Control {
            friend,
            transfer,
            control,
        });
        Ok(())
    }

    async fn friend_list(&self) -> Result<Vec<FriendHandle>, TransportError> {
        let mut friends: Vec<_> = self.lock().friends.keys().copied().collect();
        friends.sort_unstable();
        Ok(friends)
    }

    async fn friend_public_key(&self, friend: FriendHandle) -> Result<PublicKey, TransportError> {
        let mut state = self.lock();
        state.key_lookups += 1;
        state
            .friends
            .get(&friend)
            .copied()
            .ok_or(TransportError::FriendNotFound)
    }

    async fn friend_name(&self, friend: FriendHandle) -> Result<String, TransportError> {
        self.lock()
            .names
            .get(&friend)
            .cloned()
            .ok_or(TransportError::FriendNotFound)
    }

    async fn own_public_key(&self) -> Result<PublicKey, TransportError> {
        if self.lock().fail_identity {
            return Err(TransportError::Failed("identity unavailable".into()));
        }
        Ok(OWN_KEY)
    }

    async fn own_nospam(&self) -> Result<u32, TransportError> {
        Ok(OWN_NOSPAM)
    }

    async fn set_name(&self, name: &str) -> Result<(), TransportError> {
        self.lock().calls.push(Call::SetName(name.to_string()));
        Ok(())
    }

    async fn start(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.fail_start {
            state.refused.push(Call::Start);
            return Err(TransportError::Failed("start refused".into()));
        }
        state.calls.push(Call::Start);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.lock().calls.push(Call::Stop);
        Ok(())
    }

    async fn bootstrap(
        &self,
        address: &str,
        port: u16,
        _public_key: &PublicKey,
    ) -> Result<(), TransportError> {
        let call = Call::Bootstrap {
            address: address.to_string(),
            port,
        };
        let mut state = self.lock();
        if state.fail_bootstrap.contains(address) {
            state.refused.push(call);
            return Err(TransportError::Failed("unreachable".into()));
        }
        state.calls.push(call);
        Ok(())
    }

    async fn save(&self, path: &Path) -> Result<(), TransportError> {
        self.lock().calls.push(Call::Save(path.to_path_buf()));
        Ok(())
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
