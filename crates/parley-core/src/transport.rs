//! Boundary to the peer-to-peer protocol layer.
//!
//! The transport owns encryption, discovery and NAT traversal. Parley only
//! sees it through the [`Transport`] trait (calls going down) and the
//! [`TransportEvent`] enum (callbacks coming up).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Size of a long-term public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Transport-local friend number, stable for the lifetime of a session.
pub type FriendHandle = u32;

/// Transport-assigned file number, unique among one friend's live transfers.
pub type TransferId = u32;

/// Raw long-term public key.
pub type PublicKey = [u8; PUBLIC_KEY_SIZE];

/// Errors reported by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The friend exists but is not currently reachable.
    #[error("friend not connected")]
    FriendNotConnected,

    /// No friend with that handle.
    #[error("friend not found")]
    FriendNotFound,

    /// Any other failure. The string is diagnostic only.
    #[error("transport call failed: {0}")]
    Failed(String),
}

/// Text message flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Ordinary text.
    Normal,
    /// An action ("/me waves").
    Action,
}

impl MessageKind {
    /// Pick the kind from the application's action flag.
    pub fn from_action(is_action: bool) -> Self {
        if is_action {
            MessageKind::Action
        } else {
            MessageKind::Normal
        }
    }

    /// Whether this is an action message.
    pub fn is_action(self) -> bool {
        self == MessageKind::Action
    }
}

/// Declared purpose of a file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// Ordinary file payload.
    Data,
    /// Profile picture.
    Avatar,
}

/// Transfer control signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileControl {
    /// Accept or continue a transfer.
    Resume,
    /// Temporarily stop a transfer.
    Pause,
    /// Abort a transfer.
    Cancel,
}

/// Friend's advertised status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UserStatus {
    /// Available.
    #[default]
    Online,
    /// Away from keyboard.
    Away,
    /// Do not disturb.
    Busy,
}

impl UserStatus {
    /// Map the transport's numeric code. Unrecognised codes read as `Online`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => UserStatus::Away,
            2 => UserStatus::Busy,
            _ => UserStatus::Online,
        }
    }
}

/// Callbacks raised by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A friend changed their display name.
    FriendName {
        /// Friend handle.
        friend: FriendHandle,
        /// New name.
        name: String,
    },
    /// Someone asked to become a friend.
    FriendRequest {
        /// Requester's long-term public key.
        public_key: PublicKey,
        /// Greeting attached to the request.
        message: String,
    },
    /// A friend came online or went offline.
    FriendConnectionStatus {
        /// Friend handle.
        friend: FriendHandle,
        /// Whether the friend is now reachable.
        connected: bool,
    },
    /// A text message arrived.
    FriendMessage {
        /// Sender handle.
        friend: FriendHandle,
        /// Normal or action.
        kind: MessageKind,
        /// Message body.
        body: String,
    },
    /// A friend changed their status.
    FriendStatus {
        /// Friend handle.
        friend: FriendHandle,
        /// Raw status code.
        status: u8,
    },
    /// A friend changed their status message.
    FriendStatusMessage {
        /// Friend handle.
        friend: FriendHandle,
        /// New status message.
        message: String,
    },
    /// A friend started or stopped typing.
    FriendTyping {
        /// Friend handle.
        friend: FriendHandle,
        /// Whether the friend is typing.
        typing: bool,
    },
    /// Our own connectivity to the network changed.
    SelfConnectionStatus {
        /// Whether we are connected.
        connected: bool,
    },
    /// Control signal for an existing transfer.
    FileRecvControl {
        /// Friend handle.
        friend: FriendHandle,
        /// Transfer number.
        transfer: TransferId,
        /// Pause, resume or cancel.
        control: FileControl,
    },
    /// The peer pulls the next slice of an outbound transfer.
    FileChunkRequest {
        /// Friend handle.
        friend: FriendHandle,
        /// Transfer number.
        transfer: TransferId,
        /// Offset of the slice.
        position: u64,
        /// Length of the slice; zero means the transfer is complete.
        length: usize,
    },
    /// The peer offers a file.
    FileRecv {
        /// Friend handle.
        friend: FriendHandle,
        /// Transfer number.
        transfer: TransferId,
        /// Declared purpose.
        kind: FileKind,
        /// Declared total size.
        size: u64,
        /// Declared file name.
        filename: String,
    },
    /// A slice of an inbound transfer arrived.
    FileRecvChunk {
        /// Friend handle.
        friend: FriendHandle,
        /// Transfer number.
        transfer: TransferId,
        /// Offset of the slice.
        position: u64,
        /// Slice contents.
        data: Vec<u8>,
        /// Whether this is the last slice.
        is_final: bool,
    },
}

/// Calls Parley makes into the protocol layer.
///
/// Every method is a suspension point: other events may be handled while a
/// call is in flight.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Add a friend by public key without sending a request.
    async fn add_friend_norequest(&self, public_key: &PublicKey)
        -> Result<FriendHandle, TransportError>;

    /// Send a text message. Returns the transport's message number.
    async fn send_message(
        &self,
        friend: FriendHandle,
        kind: MessageKind,
        body: &str,
    ) -> Result<u32, TransportError>;

    /// Offer a file to a friend. Returns the assigned transfer number.
    async fn send_file(
        &self,
        friend: FriendHandle,
        kind: FileKind,
        filename: &str,
        size: u64,
    ) -> Result<TransferId, TransportError>;

    /// Submit one slice of an outbound transfer.
    async fn send_file_chunk(
        &self,
        friend: FriendHandle,
        transfer: TransferId,
        position: u64,
        data: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// Pause, resume or cancel a transfer.
    async fn file_control(
        &self,
        friend: FriendHandle,
        transfer: TransferId,
        control: FileControl,
    ) -> Result<(), TransportError>;

    /// Handles of every known friend.
    async fn friend_list(&self) -> Result<Vec<FriendHandle>, TransportError>;

    /// Long-term public key of a friend.
    async fn friend_public_key(&self, friend: FriendHandle) -> Result<PublicKey, TransportError>;

    /// Display name of a friend.
    async fn friend_name(&self, friend: FriendHandle) -> Result<String, TransportError>;

    /// Our own long-term public key.
    async fn own_public_key(&self) -> Result<PublicKey, TransportError>;

    /// Our own anti-spam nonce.
    async fn own_nospam(&self) -> Result<u32, TransportError>;

    /// Set our display name.
    async fn set_name(&self, name: &str) -> Result<(), TransportError>;

    /// Start the protocol loop.
    async fn start(&self) -> Result<(), TransportError>;

    /// Stop the protocol loop.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Contact a bootstrap node.
    async fn bootstrap(
        &self,
        address: &str,
        port: u16,
        public_key: &PublicKey,
    ) -> Result<(), TransportError>;

    /// Write the opaque session snapshot to `path`.
    async fn save(&self, path: &Path) -> Result<(), TransportError>;
}
