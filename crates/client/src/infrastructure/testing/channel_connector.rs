//! Channel-backed [`Connector`] that hands the server side of each session to the test.
//!
//! Every successful `connect()` produces a [`RemoteEnd`] on the [`RemoteAcceptor`].
//! Dropping a `RemoteEnd` looks like a network drop to the connection manager.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use storefront_protocol::{ClientMessage, ServerMessage};

use crate::infrastructure::transport::{
    Connector, TransportError, TransportSession, SESSION_CHANNEL_CAPACITY,
};

#[derive(Debug, Default)]
struct ConnectorState {
    fail_next: u32,
    attempts: u32,
}

#[derive(Clone)]
pub struct ChannelConnector {
    state: Arc<Mutex<ConnectorState>>,
    accepted: mpsc::UnboundedSender<RemoteEnd>,
}

/// Receives the server side of each session the connector opens.
pub struct RemoteAcceptor {
    rx: mpsc::UnboundedReceiver<RemoteEnd>,
}

/// Server side of one in-memory session.
pub struct RemoteEnd {
    from_client: mpsc::Receiver<ClientMessage>,
    to_client: mpsc::Sender<ServerMessage>,
}

impl ChannelConnector {
    pub fn new() -> (Self, RemoteAcceptor) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(Mutex::new(ConnectorState::default())),
            accepted,
        };
        (connector, RemoteAcceptor { rx })
    }

    fn lock(&self) -> MutexGuard<'_, ConnectorState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Refuse the next `count` connection attempts.
    pub fn fail_next(&self, count: u32) {
        self.lock().fail_next = count;
    }

    /// Connection attempts seen so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, url: &str) -> Result<TransportSession, TransportError> {
        {
            let mut state = self.lock();
            state.attempts += 1;
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(TransportError::connect_failed(url, "connection refused"));
            }
        }

        let (outbound, from_client) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (to_client, inbound) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        self.accepted
            .send(RemoteEnd {
                from_client,
                to_client,
            })
            .map_err(|_| TransportError::connect_failed(url, "acceptor dropped"))?;

        Ok(TransportSession { outbound, inbound })
    }
}

impl RemoteAcceptor {
    /// Next session opened by the client, or `None` after `timeout`.
    pub async fn accept(&mut self, timeout: Duration) -> Option<RemoteEnd> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }
}

impl RemoteEnd {
    /// Next non-heartbeat message from the client.
    pub async fn recv(&mut self, timeout: Duration) -> Option<ClientMessage> {
        let next = async {
            loop {
                match self.from_client.recv().await? {
                    ClientMessage::Heartbeat => continue,
                    msg => return Some(msg),
                }
            }
        };
        tokio::time::timeout(timeout, next).await.ok().flatten()
    }

    /// Next message from the client, heartbeats included.
    ///
    /// `None` on timeout or once the client has closed the session.
    pub async fn recv_raw(&mut self, timeout: Duration) -> Option<ClientMessage> {
        tokio::time::timeout(timeout, self.from_client.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn send(&self, msg: ServerMessage) -> bool {
        self.to_client.send(msg).await.is_ok()
    }

    pub async fn send_event(&self, event: &str, payload: Value) -> bool {
        self.send(ServerMessage::event(event, payload)).await
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
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
