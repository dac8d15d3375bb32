//! Transport seam between the connection manager and the physical socket.
//!
//! A [`Connector`] opens one physical session. The session is two channels: the
//! manager writes [`ClientMessage`]s into `outbound` and reads [`ServerMessage`]s
//! from `inbound`. When `inbound` yields `None` the physical connection is gone.

use async_trait::async_trait;
use tokio::sync::mpsc;

use storefront_protocol::{ClientMessage, ServerMessage};

/// Channel capacity used by connectors for both directions.
pub const SESSION_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {message}")]
    ConnectFailed { url: String, message: String },
}

impl TransportError {
    pub fn connect_failed(url: &str, message: impl ToString) -> Self {
        Self::ConnectFailed {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

/// One physical connection.
pub struct TransportSession {
    pub outbound: mpsc::Sender<ClientMessage>,
    pub inbound: mpsc::Receiver<ServerMessage>,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<TransportSession, TransportError>;
}
