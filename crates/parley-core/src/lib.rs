//! # Parley Core Library
//!
//! Session layer for a peer-to-peer messaging transport. The transport owns
//! the wire protocol, routing and encryption; Parley turns its callbacks
//! into a friendlier application model:
//!
//! - friends addressed by public key instead of transport-local handles
//! - presence and typing state
//! - sends made while a friend is offline queued and replayed in order
//! - chunked file transfers driven by the remote peer
//! - avatar distribution on change and on friend reconnect
//! - bootstrap and reconnect supervision
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Application                │
//! ├───────────────── Session ───────────────┤
//! │ identity │ presence │ queue │ transfer  │
//! │  avatar  │      supervisor   │ nodes    │
//! ├─────────────────────────────────────────┤
//! │          Transport (trait)              │
//! └─────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod address;
pub mod avatar;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod logging;
pub mod nodes;
pub mod presence;
pub mod queue;
pub mod session;
pub mod supervisor;
pub mod transfer;
pub mod transport;

pub use address::ToxAddress;
pub use avatar::{AvatarFetcher, FileAvatarFetcher};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use nodes::{BootstrapNode, JsonNodeFile, NodeSource, StaticNodes};
pub use presence::PresenceState;
pub use session::{Session, SessionBuilder};
pub use supervisor::ConnectionState;
pub use transfer::TransferRecord;
pub use transport::{Transport, TransportError, TransportEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
