//! Chunked file transfer engine.
//!
//! Both directions are pulled by the remote peer:
//!
//! - **Outbound**: the peer requests `(position, length)` slices of a payload
//!   we registered after a successful send-file call. A zero length ends the
//!   transfer.
//! - **Inbound**: the peer offers a file, we allocate a buffer of the
//!   declared size and accept. Chunks are written where the peer says; the
//!   final chunk completes the transfer and hands the buffer upward.
//!
//! Buffers never change size after creation and every slice is checked
//! against `[0, size)`. Records are always looked up by key, so a cancel or
//! completion handled while a chunk submission is in flight is harmless.

use crate::error::{Error, Result};
use crate::logging::ByteCount;
use crate::transport::{FileControl, FileKind, FriendHandle, TransferId, Transport};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Composite key of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferKey {
    /// Friend on the other end.
    pub friend: FriendHandle,
    /// Transport-assigned transfer number.
    pub transfer: TransferId,
}

impl TransferKey {
    /// Build a key.
    pub fn new(friend: FriendHandle, transfer: TransferId) -> Self {
        Self { friend, transfer }
    }
}

impl fmt::Display for TransferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.friend, self.transfer)
    }
}

/// Which side owns the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// We send, the peer pulls.
    Outbound,
    /// The peer sends, we assemble.
    Inbound,
}

/// An in-flight transfer.
pub struct Transfer {
    key: TransferKey,
    direction: Direction,
    kind: FileKind,
    filename: String,
    buffer: Vec<u8>,
    paused: bool,
    bytes_moved: u64,
}

impl Transfer {
    /// Outbound transfer over an owned payload.
    pub fn outbound(key: TransferKey, kind: FileKind, filename: &str, payload: Vec<u8>) -> Self {
        Self {
            key,
            direction: Direction::Outbound,
            kind,
            filename: filename.to_string(),
            buffer: payload,
            paused: false,
            bytes_moved: 0,
        }
    }

    /// Inbound transfer with a zeroed buffer of the declared size.
    pub fn inbound(key: TransferKey, kind: FileKind, filename: &str, size: usize) -> Self {
        Self {
            key,
            direction: Direction::Inbound,
            kind,
            filename: filename.to_string(),
            buffer: vec![0u8; size],
            paused: false,
            bytes_moved: 0,
        }
    }

    /// Transfer key.
    pub fn key(&self) -> TransferKey {
        self.key
    }

    /// Direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Declared purpose.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Display name.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Total size in bytes.
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the peer paused the transfer.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Bytes read out (outbound) or written in (inbound) so far.
    pub fn bytes_moved(&self) -> u64 {
        self.bytes_moved
    }

    /// Copy `[position, position + length)` out of the buffer.
    pub fn read_chunk(&mut self, position: u64, length: usize) -> Result<Vec<u8>> {
        let (start, end) = self.bounds(position, length)?;
        self.bytes_moved += length as u64;
        Ok(self.buffer[start..end].to_vec())
    }

    /// Copy `data` into the buffer at `position`.
    pub fn write_chunk(&mut self, position: u64, data: &[u8]) -> Result<()> {
        let (start, end) = self.bounds(position, data.len())?;
        self.buffer[start..end].copy_from_slice(data);
        self.bytes_moved += data.len() as u64;
        Ok(())
    }

    fn bounds(&self, position: u64, length: usize) -> Result<(usize, usize)> {
        let start = usize::try_from(position).ok();
        let end = start.and_then(|s| s.checked_add(length));
        match (start, end) {
            (Some(start), Some(end)) if end <= self.buffer.len() => Ok((start, end)),
            _ => Err(Error::MalformedTransfer(format!(
                "slice {}+{} outside transfer {} of {} bytes",
                position,
                length,
                self.key,
                self.buffer.len()
            ))),
        }
    }

    fn into_record(self) -> TransferRecord {
        TransferRecord {
            friend: self.key.friend,
            transfer: self.key.transfer,
            kind: self.kind,
            filename: self.filename,
            data: self.buffer,
        }
    }
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("key", &self.key)
            .field("direction", &self.direction)
            .field("kind", &self.kind)
            .field("filename", &self.filename)
            .field("buffer", &ByteCount(&self.buffer))
            .field("paused", &self.paused)
            .finish()
    }
}

/// A completed inbound transfer handed to the application.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Sender handle.
    pub friend: FriendHandle,
    /// Transfer number.
    pub transfer: TransferId,
    /// Data or avatar.
    pub kind: FileKind,
    /// Declared file name.
    pub filename: String,
    /// Assembled payload.
    pub data: Vec<u8>,
}

impl fmt::Debug for TransferRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferRecord")
            .field("friend", &self.friend)
            .field("transfer", &self.transfer)
            .field("kind", &self.kind)
            .field("filename", &self.filename)
            .field("data", &ByteCount(&self.data))
            .finish()
    }
}

/// Owner of every in-flight transfer.
pub struct TransferEngine {
    transfers: Mutex<HashMap<TransferKey, Transfer>>,
    honor_pause: bool,
    max_inbound_size: u64,
}

impl TransferEngine {
    /// Create an engine.
    ///
    /// With `honor_pause`, chunk requests for a paused outbound transfer are
    /// ignored. Inbound offers above `max_inbound_size` are cancelled.
    pub fn new(honor_pause: bool, max_inbound_size: u64) -> Self {
        Self {
            transfers: Mutex::new(HashMap::new()),
            honor_pause,
            max_inbound_size,
        }
    }

    /// Track an outbound transfer the transport has just accepted.
    pub async fn register_outbound(
        &self,
        friend: FriendHandle,
        transfer: TransferId,
        kind: FileKind,
        filename: &str,
        payload: Vec<u8>,
    ) {
        let key = TransferKey::new(friend, transfer);
        let size = payload.len();
        let replaced = self
            .transfers
            .lock()
            .await
            .insert(key, Transfer::outbound(key, kind, filename, payload));
        if replaced.is_some() {
            warn!(transfer = %key, "Replaced a stale transfer with the same key");
        }
        info!(transfer = %key, ?kind, filename, size, "Outbound transfer registered");
    }

    /// Serve a chunk request for an outbound transfer.
    ///
    /// A zero length completes the transfer. A failed submission is logged and
    /// the record kept so the peer can ask again.
    pub async fn on_chunk_request(
        &self,
        transport: &dyn Transport,
        friend: FriendHandle,
        transfer: TransferId,
        position: u64,
        length: usize,
    ) -> Result<()> {
        let key = TransferKey::new(friend, transfer);

        let chunk = {
            let mut transfers = self.transfers.lock().await;
            let entry = transfers
                .get_mut(&key)
                .filter(|t| t.direction == Direction::Outbound)
                .ok_or_else(|| {
                    Error::MalformedTransfer(format!("chunk request for unknown transfer {}", key))
                })?;

            if length == 0 {
                if let Some(done) = transfers.remove(&key) {
                    info!(transfer = %key, bytes = done.bytes_moved(), "Outbound transfer complete");
                }
                return Ok(());
            }

            if self.honor_pause && entry.is_paused() {
                debug!(transfer = %key, position, "Chunk request while paused, ignoring");
                return Ok(());
            }

            entry.read_chunk(position, length)?
        };

        if let Err(e) = transport
            .send_file_chunk(friend, transfer, position, chunk)
            .await
        {
            warn!(transfer = %key, position, length, error = %e, "Failed to submit chunk");
        }
        Ok(())
    }

    /// Accept an inbound offer: allocate its buffer and resume it.
    pub async fn on_offer(
        &self,
        transport: &dyn Transport,
        friend: FriendHandle,
        transfer: TransferId,
        kind: FileKind,
        size: u64,
        filename: &str,
    ) -> Result<()> {
        let key = TransferKey::new(friend, transfer);

        let size = match usize::try_from(size) {
            Ok(size) if (size as u64) <= self.max_inbound_size => size,
            _ => {
                warn!(transfer = %key, size, "Inbound offer too large, cancelling");
                if let Err(e) = transport.file_control(friend, transfer, FileControl::Cancel).await {
                    warn!(transfer = %key, error = %e, "Failed to cancel oversized offer");
                }
                return Err(Error::MalformedTransfer(format!(
                    "offer {} of {} bytes exceeds limit of {}",
                    key, size, self.max_inbound_size
                )));
            }
        };

        self.transfers
            .lock()
            .await
            .insert(key, Transfer::inbound(key, kind, filename, size));
        info!(transfer = %key, ?kind, filename, size, "Inbound transfer offered");

        if let Err(e) = transport.file_control(friend, transfer, FileControl::Resume).await {
            self.transfers.lock().await.remove(&key);
            return Err(e.into());
        }
        Ok(())
    }

    /// Store an inbound chunk. Returns the finished record on the final chunk.
    pub async fn on_chunk(
        &self,
        friend: FriendHandle,
        transfer: TransferId,
        position: u64,
        data: &[u8],
        is_final: bool,
    ) -> Result<Option<TransferRecord>> {
        let key = TransferKey::new(friend, transfer);
        let mut transfers = self.transfers.lock().await;

        let entry = transfers
            .get_mut(&key)
            .filter(|t| t.direction == Direction::Inbound)
            .ok_or_else(|| Error::MalformedTransfer(format!("chunk for unknown transfer {}", key)))?;

        if !data.is_empty() {
            entry.write_chunk(position, data)?;
        }

        if !is_final {
            return Ok(None);
        }

        let record = transfers.remove(&key).map(Transfer::into_record);
        if let Some(record) = &record {
            info!(transfer = %key, filename = %record.filename, size = record.data.len(), "Inbound transfer complete");
        }
        Ok(record)
    }

    /// Apply a pause, resume or cancel signal from the peer.
    pub async fn on_control(
        &self,
        friend: FriendHandle,
        transfer: TransferId,
        control: FileControl,
    ) -> Result<()> {
        let key = TransferKey::new(friend, transfer);
        let mut transfers = self.transfers.lock().await;

        if control == FileControl::Cancel {
            if transfers.remove(&key).is_some() {
                info!(transfer = %key, "Transfer cancelled by peer");
            }
            return Ok(());
        }

        let entry = transfers.get_mut(&key).ok_or_else(|| {
            Error::MalformedTransfer(format!("{:?} for unknown transfer {}", control, key))
        })?;
        entry.paused = control == FileControl::Pause;
        debug!(transfer = %key, paused = entry.paused, "Transfer control applied");
        Ok(())
    }

    /// Drop every transfer. Returns how many were abandoned.
    pub async fn clear(&self) -> usize {
        let mut transfers = self.transfers.lock().await;
        let count = transfers.len();
        transfers.clear();
        if count > 0 {
            info!(count, "Abandoned in-flight transfers");
        }
        count
    }

    /// Whether a transfer is in flight.
    pub async fn contains(&self, key: TransferKey) -> bool {
        self.transfers.lock().await.contains_key(&key)
    }

    /// Pause flag of a transfer, if it exists.
    pub async fn is_paused(&self, key: TransferKey) -> Option<bool> {
        self.transfers.lock().await.get(&key).map(Transfer::is_paused)
    }

    /// Number of in-flight transfers.
    pub async fn len(&self) -> usize {
        self.transfers.lock().await.len()
    }

    /// Whether no transfer is in flight.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
