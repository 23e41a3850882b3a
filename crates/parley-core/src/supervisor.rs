//! Connection supervision: bootstrap, self connectivity and reconnect.
//!
//! ```text
//!  Disconnected ──connect()──▶ Connecting ──self online──▶ Connected
//!        ▲                        ▲                            │
//!        │ reconnect failed       └──────self offline──────────┘
//!        └────────────────────────────────┘
//! ```

use crate::error::{Error, Result};
use crate::nodes::NodeSource;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Our own connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Idle: never connected, disconnected by the application, or gave up.
    Disconnected,
    /// Bootstrapped and waiting for the network.
    Connecting,
    /// Online.
    Connected,
}

/// Drives the transport through its connection lifecycle.
pub struct Supervisor {
    state: RwLock<ConnectionState>,
    nodes: Arc<dyn NodeSource>,
    reconnect_attempts: u32,
    reconnect_backoff: Duration,
}

impl Supervisor {
    /// Create a supervisor in `Disconnected`.
    ///
    /// After a drop, bootstrap + restart is tried `reconnect_attempts` times
    /// with `reconnect_backoff` between attempts.
    pub fn new(nodes: Arc<dyn NodeSource>, reconnect_attempts: u32, reconnect_backoff: Duration) -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            nodes,
            reconnect_attempts,
            reconnect_backoff,
        }
    }

    /// Current state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Bootstrap against every listed node. Returns how many were accepted.
    ///
    /// Neither an unreadable list nor a rejected node is fatal.
    pub async fn bootstrap(&self, transport: &dyn Transport) -> usize {
        let nodes = match self.nodes.load().await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %e, "Bootstrap node list unavailable");
                return 0;
            }
        };

        let mut accepted = 0;
        for node in &nodes {
            let key = match node.key() {
                Ok(key) => key,
                Err(e) => {
                    warn!(address = %node.address, error = %e, "Skipping node with bad key");
                    continue;
                }
            };
            match transport.bootstrap(&node.address, node.port, &key).await {
                Ok(()) => accepted += 1,
                Err(e) => warn!(address = %node.address, port = node.port, error = %e, "Bootstrap node rejected"),
            }
        }

        info!(accepted, total = nodes.len(), "Bootstrap complete");
        accepted
    }

    /// Enter `Connecting`: bootstrap, then start the transport.
    pub async fn connect(&self, transport: &dyn Transport) -> Result<()> {
        *self.state.write().await = ConnectionState::Connecting;
        self.bootstrap(transport).await;

        if let Err(e) = transport.start().await {
            *self.state.write().await = ConnectionState::Disconnected;
            return Err(e.into());
        }
        info!("Transport started, waiting for network");
        Ok(())
    }

    /// Stop the transport and go idle.
    pub async fn disconnect(&self, transport: &dyn Transport) -> Result<()> {
        *self.state.write().await = ConnectionState::Disconnected;
        transport.stop().await?;
        info!("Transport stopped");
        Ok(())
    }

    /// Record a self connectivity change. Returns whether the state moved.
    ///
    /// Coming online always lands in `Connected`. Going offline only counts
    /// when we were `Connected`; the caller then owes a reconnect.
    pub async fn on_self_connection(&self, connected: bool) -> bool {
        let mut state = self.state.write().await;
        let previous = *state;

        if connected {
            *state = ConnectionState::Connected;
            return previous != ConnectionState::Connected;
        }

        if previous == ConnectionState::Connected {
            *state = ConnectionState::Connecting;
            return true;
        }
        debug!(?previous, "Offline notification outside of Connected, ignoring");
        false
    }

    /// Try to rejoin the network after a drop.
    ///
    /// Gives up early if the state left `Connecting` (the network came back or
    /// the application disconnected). On exhausting every attempt the
    /// supervisor idles in `Disconnected`.
    pub async fn reconnect(&self, transport: &dyn Transport) -> Result<()> {
        let mut last_error = String::from("no attempts configured");

        for attempt in 1..=self.reconnect_attempts {
            if attempt > 1 && !self.reconnect_backoff.is_zero() {
                tokio::time::sleep(self.reconnect_backoff).await;
            }
            if self.state().await != ConnectionState::Connecting {
                debug!(attempt, "Reconnect no longer needed");
                return Ok(());
            }

            info!(attempt, "Reconnecting");
            if let Err(e) = transport.stop().await {
                debug!(error = %e, "Stop before restart failed");
            }
            self.bootstrap(transport).await;
            match transport.start().await {
                Ok(()) => {
                    info!(attempt, "Transport restarted");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Restart failed");
                    last_error = e.to_string();
                }
            }
        }

        let mut state = self.state.write().await;
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Disconnected;
        }
        error!(attempts = self.reconnect_attempts, "Reconnect failed, staying disconnected");
        Err(Error::Reconnect(last_error))
    }
}
