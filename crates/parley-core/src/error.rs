//! Error types for Parley.
//!
//! Errors from application commands propagate to the caller. Errors raised
//! inside background work (queue drains, avatar fan-out, chunk production,
//! reconnects) are logged by the task that hit them and never surface.

use crate::transport::{FriendHandle, TransportError};
use thiserror::Error;

/// Core error type for session operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No friend with this public key, even after refreshing the friend list.
    #[error("unknown friend: {0}")]
    UnknownFriend(String),

    /// The transport rejected a call for a reason other than connectivity.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The transport says the friend is offline while presence says online.
    /// Only surfaced when the two disagree; otherwise the send is queued.
    #[error("friend {0} not connected")]
    FriendNotConnected(FriendHandle),

    /// A chunk event referenced an unknown transfer or an out-of-range slice.
    #[error("malformed transfer: {0}")]
    MalformedTransfer(String),

    /// The bootstrap node list could not be read, or a node was rejected.
    #[error("bootstrap failure: {0}")]
    Bootstrap(String),

    /// Bootstrap and restart after a connectivity drop failed.
    #[error("reconnect failure: {0}")]
    Reconnect(String),

    /// An identity string failed length, hex or checksum validation.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Avatar payload could not be resolved.
    #[error("avatar unavailable: {0}")]
    Avatar(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias using Parley's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error only concerns the event that raised it.
    /// Such events are logged and dropped by the event loop.
    pub fn is_event_local(&self) -> bool {
        matches!(self, Error::MalformedTransfer(_) | Error::UnknownFriend(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Bootstrap(e.to_string())
    }
}
