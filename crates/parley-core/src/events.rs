//! Events delivered to the hosting application.
//!
//! Friends are identified by their public-key hex string, never by the
//! transport-local handle.

use crate::transfer::TransferRecord;
use crate::transport::UserStatus;

/// Notifications emitted by a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A friend changed their display name.
    FriendName {
        /// Friend's public key.
        friend: String,
        /// New name.
        name: String,
    },
    /// A friend changed their status.
    FriendStatus {
        /// Friend's public key.
        friend: String,
        /// New status.
        status: UserStatus,
    },
    /// A friend changed their status message.
    FriendStatusMessage {
        /// Friend's public key.
        friend: String,
        /// New status message.
        message: String,
    },
    /// A friend started or stopped typing.
    FriendTyping {
        /// Friend's public key.
        friend: String,
        /// Typing flag.
        typing: bool,
    },
    /// A text message arrived.
    Message {
        /// Sender's public key.
        friend: String,
        /// Message body.
        body: String,
        /// Whether it is an action message.
        is_action: bool,
    },
    /// An inbound file finished.
    File {
        /// Sender's public key.
        friend: String,
        /// Completed transfer.
        record: TransferRecord,
    },
    /// A friend's avatar finished downloading.
    FriendAvatar {
        /// Sender's public key.
        friend: String,
        /// Completed transfer.
        record: TransferRecord,
    },
    /// A friend request was accepted automatically.
    FriendRequestAccepted {
        /// New friend's public key.
        friend: String,
        /// Greeting that came with the request.
        message: String,
    },
    /// We joined the network. Carries our full address.
    Connected {
        /// Our address: key, nospam and checksum in hex.
        address: String,
    },
    /// We lost the network.
    Disconnected,
}
