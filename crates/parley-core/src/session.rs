//! Session: routes transport events and application commands.
//!
//! A `Session` owns one instance of every component. Transport callbacks go
//! through [`Session::handle_event`] (or the [`Session::run`] loop), commands
//! from the hosting application through the public methods. Results for the
//! application come back on a broadcast channel ([`Session::subscribe`]).
//!
//! Queue drains, avatar fan-out and reconnects are spawned onto the runtime
//! and never awaited by the handler that triggered them.

use crate::address::{public_key_hex, ToxAddress};
use crate::avatar::{self, Avatar, AvatarFetcher, AvatarStore, FileAvatarFetcher};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::SessionEvent;
use crate::identity::IdentityCache;
use crate::logging::ShortKey;
use crate::nodes::{JsonNodeFile, NodeSource, StaticNodes};
use crate::presence::{PresenceState, PresenceTracker};
use crate::queue::{MessageQueue, QueueEntry};
use crate::supervisor::{ConnectionState, Supervisor};
use crate::transfer::TransferEngine;
use crate::transport::{
    FileKind, FriendHandle, MessageKind, PublicKey, Transport, TransportError, TransportEvent,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// A send the transport refused, with the entry handed back.
struct Undelivered {
    error: TransportError,
    entry: QueueEntry,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    identities: IdentityCache,
    presence: PresenceTracker,
    queue: MessageQueue,
    transfers: TransferEngine,
    avatar: AvatarStore,
    fetcher: Arc<dyn AvatarFetcher>,
    supervisor: Supervisor,
    events: broadcast::Sender<SessionEvent>,
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    nodes: Option<Arc<dyn NodeSource>>,
    fetcher: Option<Arc<dyn AvatarFetcher>>,
}

impl SessionBuilder {
    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Bootstrap node source. Defaults to `config.nodes_path`, or no nodes.
    pub fn nodes(mut self, nodes: impl NodeSource) -> Self {
        self.nodes = Some(Arc::new(nodes));
        self
    }

    /// Avatar resolver. Defaults to reading local files.
    pub fn avatar_fetcher(mut self, fetcher: impl AvatarFetcher) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Build the session.
    pub fn build(self) -> Session {
        let config = self.config;
        let nodes = self.nodes.unwrap_or_else(|| match &config.nodes_path {
            Some(path) => Arc::new(JsonNodeFile::new(path)) as Arc<dyn NodeSource>,
            None => Arc::new(StaticNodes::default()),
        });
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(FileAvatarFetcher::default()));
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Session {
            inner: Arc::new(Inner {
                transport: self.transport,
                identities: IdentityCache::new(),
                presence: PresenceTracker::new(),
                queue: MessageQueue::new(),
                transfers: TransferEngine::new(config.honor_pause, config.max_transfer_size),
                avatar: AvatarStore::new(),
                fetcher,
                supervisor: Supervisor::new(
                    nodes,
                    config.reconnect_attempts,
                    config.reconnect_backoff(),
                ),
                events,
                config,
            }),
        }
    }
}

/// Session layer over a [`Transport`]. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Start building a session over `transport`.
    pub fn builder(transport: Arc<dyn Transport>) -> SessionBuilder {
        SessionBuilder {
            transport,
            config: SessionConfig::default(),
            nodes: None,
            fetcher: None,
        }
    }

    /// Session with default configuration.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::builder(transport).build()
    }

    /// Subscribe to application events.
    ///
    /// Emission never waits for subscribers; one that falls behind by more
    /// than `event_capacity` events sees a lag error and skips ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ---------------------------------------------------------------------
    // Application commands
    // ---------------------------------------------------------------------

    /// Bootstrap and start the transport.
    pub async fn connect(&self) -> Result<()> {
        self.inner
            .supervisor
            .connect(self.inner.transport.as_ref())
            .await
    }

    /// Stop the transport. In-flight transfers are abandoned.
    pub async fn disconnect(&self) -> Result<()> {
        let result = self
            .inner
            .supervisor
            .disconnect(self.inner.transport.as_ref())
            .await;
        self.inner.transfers.clear().await;
        self.inner.presence.clear().await;
        result
    }

    /// Send a text message, queueing it if the friend is offline.
    pub async fn send_message(&self, friend: &str, body: &str, is_action: bool) -> Result<()> {
        let handle = self.resolve(friend).await?;
        let entry = QueueEntry::Text {
            body: body.to_string(),
            is_action,
        };
        self.inner.send_or_queue(handle, entry).await
    }

    /// Send a file, queueing it if the friend is offline.
    pub async fn send_file(&self, friend: &str, payload: Vec<u8>, filename: &str) -> Result<()> {
        let handle = self.resolve(friend).await?;
        let entry = QueueEntry::File {
            payload,
            filename: filename.to_string(),
        };
        self.inner.send_or_queue(handle, entry).await
    }

    /// Our full address: public key, nospam and checksum.
    pub async fn self_identity(&self) -> Result<String> {
        Ok(self.inner.own_address().await?.to_hex())
    }

    /// Display name of a friend.
    pub async fn friend_name(&self, friend: &str) -> Result<String> {
        let handle = self.resolve(friend).await?;
        Ok(self.inner.transport.friend_name(handle).await?)
    }

    /// Set our display name.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        self.inner.transport.set_name(name).await?;
        info!(name, "Own name updated");
        Ok(())
    }

    /// Replace the avatar and push it to every online friend.
    ///
    /// Setting the avatar already held does nothing.
    pub async fn set_avatar(&self, source: &str) -> Result<()> {
        if self.inner.avatar.is_current(source).await {
            debug!(source = %ShortKey(source), "Avatar unchanged");
            return Ok(());
        }

        let payload = self.inner.fetcher.fetch(source).await?;
        let Some(avatar) = self.inner.avatar.replace(source, payload).await else {
            return Ok(());
        };

        let friends = self.inner.presence.online_friends().await;
        info!(friends = friends.len(), "Distributing avatar");
        for friend in friends {
            self.inner.spawn_avatar_send(friend, avatar.clone());
        }
        Ok(())
    }

    /// Ask the transport to write its snapshot to `config.save_path`.
    pub async fn persist(&self) -> Result<()> {
        let path = self
            .inner
            .config
            .save_path
            .as_deref()
            .ok_or_else(|| Error::Config("no save path configured".into()))?;
        self.inner.transport.save(path).await?;
        debug!(path = %path.display(), "Session persisted");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Observation
    // ---------------------------------------------------------------------

    /// Our connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.supervisor.state().await
    }

    /// Presence of a friend.
    pub async fn presence(&self, friend: &str) -> Result<PresenceState> {
        let handle = self.resolve(friend).await?;
        Ok(self.inner.presence.snapshot(handle).await)
    }

    /// Number of sends waiting for a friend to come online.
    pub async fn queued(&self, friend: &str) -> Result<usize> {
        let handle = self.resolve(friend).await?;
        Ok(self.inner.queue.pending(handle).await)
    }

    /// Number of in-flight transfers.
    pub async fn transfers_in_flight(&self) -> usize {
        self.inner.transfers.len().await
    }

    /// The avatar currently advertised.
    pub async fn avatar(&self) -> Option<Avatar> {
        self.inner.avatar.current().await
    }

    // ---------------------------------------------------------------------
    // Transport events
    // ---------------------------------------------------------------------

    /// Handle one transport callback.
    pub async fn handle_event(&self, event: TransportEvent) -> Result<()> {
        self.inner.handle_event(event).await
    }

    /// Consume transport callbacks until the channel closes.
    ///
    /// A failing event is logged and dropped; the loop keeps going.
    pub async fn run(&self, mut events: mpsc::Receiver<TransportEvent>) {
        info!("Session event loop started");
        while let Some(event) = events.recv().await {
            if let Err(e) = self.inner.handle_event(event).await {
                if e.is_event_local() {
                    warn!(error = %e, "Dropped transport event");
                } else {
                    error!(error = %e, "Transport event failed");
                }
            }
        }
        info!("Session event loop stopped");
    }

    async fn resolve(&self, friend: &str) -> Result<FriendHandle> {
        self.inner
            .identities
            .resolve_handle(self.inner.transport.as_ref(), friend)
            .await
    }
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    async fn hex(&self, friend: FriendHandle) -> Result<String> {
        self.identities
            .resolve_hex(self.transport.as_ref(), friend)
            .await
    }

    async fn own_address(&self) -> Result<ToxAddress> {
        let public_key = self.transport.own_public_key().await?;
        let nospam = self.transport.own_nospam().await?;
        Ok(ToxAddress::new(public_key, nospam))
    }

    /// Hand one entry to the transport. A file entry counts as sent only
    /// once its transfer is registered.
    async fn dispatch(
        &self,
        friend: FriendHandle,
        entry: QueueEntry,
    ) -> std::result::Result<(), Undelivered> {
        match entry {
            QueueEntry::Text { body, is_action } => {
                match self
                    .transport
                    .send_message(friend, MessageKind::from_action(is_action), &body)
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(error) => Err(Undelivered {
                        error,
                        entry: QueueEntry::Text { body, is_action },
                    }),
                }
            }
            QueueEntry::File { payload, filename } => {
                let size = payload.len() as u64;
                match self
                    .transport
                    .send_file(friend, FileKind::Data, &filename, size)
                    .await
                {
                    Ok(transfer) => {
                        self.transfers
                            .register_outbound(friend, transfer, FileKind::Data, &filename, payload)
                            .await;
                        Ok(())
                    }
                    Err(error) => Err(Undelivered {
                        error,
                        entry: QueueEntry::File { payload, filename },
                    }),
                }
            }
        }
    }

    async fn send_or_queue(self: &Arc<Self>, friend: FriendHandle, entry: QueueEntry) -> Result<()> {
        match self.dispatch(friend, entry).await {
            Ok(()) => Ok(()),
            Err(Undelivered {
                error: TransportError::FriendNotConnected,
                entry,
            }) => {
                if self.presence.is_online(friend).await {
                    warn!(friend, "Transport reports friend offline but presence says online");
                    return Err(Error::FriendNotConnected(friend));
                }
                self.queue.push(friend, entry).await;
                let pending = self.queue.pending(friend).await;
                debug!(friend, pending, "Friend offline, send queued");

                // The friend may have come online between the check and the push.
                if self.presence.is_online(friend).await {
                    self.spawn_drain(friend);
                }
                Ok(())
            }
            Err(Undelivered { error, .. }) => Err(error.into()),
        }
    }

    /// Replay a friend's queue in order.
    ///
    /// A friend that went offline again stops the drain with the entry put
    /// back at the head. Any other refusal drops that entry and moves on.
    async fn drain(&self, friend: FriendHandle) {
        if !self.queue.begin_drain(friend).await {
            debug!(friend, "Drain already running, asked it to go again");
            return;
        }

        let mut delivered = 0usize;
        let mut dropped = 0usize;
        while let Some(entry) = self.queue.next_for_drain(friend).await {
            match self.dispatch(friend, entry).await {
                Ok(()) => delivered += 1,
                Err(Undelivered {
                    error: TransportError::FriendNotConnected,
                    entry,
                }) => {
                    self.queue.push_front(friend, entry).await;
                    if self.queue.abort_drain(friend).await {
                        debug!(friend, "Drain requested again while interrupted, retrying");
                        continue;
                    }
                    warn!(friend, delivered, "Friend went offline, drain interrupted");
                    return;
                }
                Err(Undelivered { error, entry }) => {
                    dropped += 1;
                    warn!(friend, entry = ?entry, error = %error, "Dropping queued send the transport refused");
                }
            }
        }

        if dropped > 0 {
            warn!(friend, delivered, dropped, "Offline queue drained with losses");
            return;
        }

        if delivered > 0 {
            info!(friend, delivered, "Offline queue drained");
        }
    }

    fn spawn_drain(self: &Arc<Self>, friend: FriendHandle) {
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.drain(friend).await });
    }

    fn spawn_avatar_send(self: &Arc<Self>, friend: FriendHandle, avatar: Avatar) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = avatar::send_avatar(
                inner.transport.as_ref(),
                &inner.transfers,
                friend,
                &inner.config.avatar_filename,
                &avatar,
            )
            .await
            {
                warn!(friend, error = %e, "Failed to send avatar");
            }
        });
    }

    fn spawn_reconnect(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = inner.supervisor.reconnect(inner.transport.as_ref()).await {
                error!(error = %e, "Giving up on reconnect");
            }
        });
    }

    async fn handle_event(self: &Arc<Self>, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::FriendName { friend, name } => {
                let hex = self.hex(friend).await?;
                self.emit(SessionEvent::FriendName { friend: hex, name });
            }
            TransportEvent::FriendRequest {
                public_key,
                message,
            } => {
                self.accept_friend_request(&public_key, message).await?;
            }
            TransportEvent::FriendConnectionStatus { friend, connected } => {
                let came_online = self.presence.set_online(friend, connected).await;
                info!(friend, connected, "Friend connection changed");
                if came_online {
                    self.spawn_drain(friend);
                    if let Some(avatar) = self.avatar.current().await {
                        self.spawn_avatar_send(friend, avatar);
                    }
                }
            }
            TransportEvent::FriendMessage { friend, kind, body } => {
                let hex = self.hex(friend).await?;
                self.emit(SessionEvent::Message {
                    friend: hex,
                    body,
                    is_action: kind.is_action(),
                });
            }
            TransportEvent::FriendStatus { friend, status } => {
                let status = self.presence.set_status(friend, status).await;
                let hex = self.hex(friend).await?;
                self.emit(SessionEvent::FriendStatus {
                    friend: hex,
                    status,
                });
            }
            TransportEvent::FriendStatusMessage { friend, message } => {
                self.presence.set_status_message(friend, &message).await;
                let hex = self.hex(friend).await?;
                self.emit(SessionEvent::FriendStatusMessage {
                    friend: hex,
                    message,
                });
            }
            TransportEvent::FriendTyping { friend, typing } => {
                self.presence.set_typing(friend, typing).await;
                let hex = self.hex(friend).await?;
                self.emit(SessionEvent::FriendTyping {
                    friend: hex,
                    typing,
                });
            }
            TransportEvent::SelfConnectionStatus { connected } => {
                self.on_self_connection(connected).await?;
            }
            TransportEvent::FileRecvControl {
                friend,
                transfer,
                control,
            } => {
                self.transfers.on_control(friend, transfer, control).await?;
            }
            TransportEvent::FileChunkRequest {
                friend,
                transfer,
                position,
                length,
            } => {
                self.transfers
                    .on_chunk_request(self.transport.as_ref(), friend, transfer, position, length)
                    .await?;
            }
            TransportEvent::FileRecv {
                friend,
                transfer,
                kind,
                size,
                filename,
            } => {
                self.transfers
                    .on_offer(self.transport.as_ref(), friend, transfer, kind, size, &filename)
                    .await?;
            }
            TransportEvent::FileRecvChunk {
                friend,
                transfer,
                position,
                data,
                is_final,
            } => {
                let completed = self
                    .transfers
                    .on_chunk(friend, transfer, position, &data, is_final)
                    .await?;
                if let Some(record) = completed {
                    let hex = self.hex(friend).await?;
                    let kind = record.kind;
                    self.emit(match kind {
                        FileKind::Data => SessionEvent::File { friend: hex, record },
                        FileKind::Avatar => SessionEvent::FriendAvatar { friend: hex, record },
                    });
                }
            }
        }
        Ok(())
    }

    async fn on_self_connection(self: &Arc<Self>, connected: bool) -> Result<()> {
        if connected {
            // Resolved before the state moves so a failed lookup is retried
            // by the next online notice.
            let address = self.own_address().await?.to_hex();
            if !self.supervisor.on_self_connection(true).await {
                return Ok(());
            }
            if let Err(e) = self.identities.refresh(self.transport.as_ref()).await {
                warn!(error = %e, "Friend list refresh failed");
            }
            info!(address = %ShortKey(&address), "Connected to the network");
            self.emit(SessionEvent::Connected { address });
            return Ok(());
        }

        if !self.supervisor.on_self_connection(false).await {
            return Ok(());
        }

        warn!("Lost connection to the network");
        self.emit(SessionEvent::Disconnected);
        self.transfers.clear().await;
        self.presence.clear().await;
        self.spawn_reconnect();
        Ok(())
    }

    async fn accept_friend_request(&self, public_key: &PublicKey, message: String) -> Result<()> {
        let hex = public_key_hex(public_key);
        let friend = self.transport.add_friend_norequest(public_key).await?;
        self.identities.insert(friend, &hex).await;
        info!(friend, key = %ShortKey(&hex), "Friend request accepted");

        match &self.config.save_path {
            Some(path) => {
                if let Err(e) = self.transport.save(path).await {
                    warn!(error = %e, "Failed to persist after accepting friend");
                }
            }
            None => debug!("No save path configured, not persisting"),
        }

        self.emit(SessionEvent::FriendRequestAccepted {
            friend: hex,
            message,
        });
        Ok(())
    }
}
