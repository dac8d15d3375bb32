//! Connection status and observation.
//!
//! The status is published through a `watch` channel so it can be read
//! synchronously (`status()`) and awaited (`changed()`) by UI bindings.

use std::time::Duration;

use tokio::sync::watch;

/// Status of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Not connected and no connection attempt in flight
    #[default]
    Disconnected,
    /// Establishing the connection, or re-establishing it after a drop
    Connecting,
    /// Connection is up
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable connection status for UI binding.
///
/// Observers never own the connection; any number of them can be handed out.
#[derive(Clone)]
pub struct ConnectionStatusObserver {
    rx: watch::Receiver<ConnectionStatus>,
}

impl ConnectionStatusObserver {
    pub fn new(rx: watch::Receiver<ConnectionStatus>) -> Self {
        Self { rx }
    }

    /// Get the current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.rx.borrow()
    }

    /// The `isConnected` flag exposed to views.
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Wait for the next status change and return the new status.
    ///
    /// Returns `None` once the connection manager has been dropped.
    pub async fn changed(&mut self) -> Option<ConnectionStatus> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Wait until the status equals `target`, giving up after `timeout`.
    pub async fn wait_for(&mut self, target: ConnectionStatus, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.rx.wait_for(|s| *s == target))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }
}
