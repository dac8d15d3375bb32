//! Connection manager for the notification service.
//!
//! One `ConnectionManager` is created at application start and handed to whoever
//! needs it; clones share the same connection. A background driver task owns the
//! physical socket: it connects, replays room membership, pumps outbound messages,
//! dispatches inbound events to the listener registry and reconnects with backoff
//! after a drop.
//!
//! Room membership and listener registrations live on the manager, not on the
//! socket, so a reconnect is invisible to subscribers.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{Instant, MissedTickBehavior};

use storefront_domain::UserId;
use storefront_protocol::{ClientMessage, ServerMessage};

use crate::infrastructure::messaging::connection::{ConnectionStatus, ConnectionStatusObserver};
use crate::infrastructure::messaging::listeners::{ListenerHandle, ListenerRegistry};
use crate::infrastructure::transport::{Connector, TransportSession};
use crate::infrastructure::websocket::{BackoffState, ReconnectPolicy, WebSocketConnector};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub url: String,
    pub reconnect: ReconnectPolicy,
    pub heartbeat_interval: Duration,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

#[derive(Debug, Default)]
struct RoomMembership {
    /// Room this client should be in
    current: Option<UserId>,
    /// Room held before the last join; restored if that join is rejected
    before_join: Option<UserId>,
    /// Room with a leave in flight; restored if the leave is rejected
    leaving: Option<UserId>,
}

#[derive(Default)]
struct SharedState {
    rooms: RoomMembership,
    /// Outbound queue of the live session. `Some` exactly while connected.
    link: Option<mpsc::UnboundedSender<ClientMessage>>,
    driver_active: bool,
    stop_requested: bool,
    /// A stop request has been taken by the driver, which is on its way out
    stopping: bool,
    /// `connect()` arrived while the driver was idle or winding down
    restart_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Dropped,
    Stopped,
}

struct Inner {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    listeners: ListenerRegistry,
    status: watch::Sender<ConnectionStatus>,
    shared: Mutex<SharedState>,
    /// Cuts a pending backoff wait short when `restart_requested` is set
    wake: Notify,
    stop: Notify,
}

/// Handle to the process-wide realtime connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                listeners: ListenerRegistry::new(),
                status,
                shared: Mutex::new(SharedState::default()),
                wake: Notify::new(),
                stop: Notify::new(),
            }),
        }
    }

    /// Manager backed by the tokio-tungstenite transport.
    pub fn websocket(config: ConnectionConfig) -> Self {
        Self::new(config, Arc::new(WebSocketConnector::new()))
    }

    pub fn url(&self) -> &str {
        &self.inner.config.url
    }

    /// Start connecting. Must be called from within a tokio runtime.
    ///
    /// No-op while connecting or connected. If a previous attempt failed and the
    /// driver is waiting out its backoff delay, the next attempt starts right away.
    /// Called after `disconnect()`, it opens a fresh connection even if the old
    /// one has not finished closing yet.
    pub fn connect(&self) {
        let mut shared = self.inner.lock_shared();
        if shared.driver_active {
            let winding_down = shared.stop_requested || shared.stopping;
            if winding_down || self.status() == ConnectionStatus::Disconnected {
                tracing::debug!(winding_down, "connect() while driver idle, retrying now");
                shared.restart_requested = true;
                drop(shared);
                self.inner.wake.notify_one();
            }
            return;
        }
        shared.driver_active = true;
        shared.stop_requested = false;
        shared.stopping = false;
        shared.restart_requested = false;
        drop(shared);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_driver().await;
        });
    }

    /// Close the physical connection and stop reconnecting.
    ///
    /// Listeners and room membership are kept; a later `connect()` restores both.
    pub fn disconnect(&self) {
        let mut shared = self.inner.lock_shared();
        if !shared.driver_active {
            return;
        }
        shared.restart_requested = false;
        shared.stop_requested = true;
        drop(shared);
        self.inner.stop.notify_one();
    }

    /// Join the notification room of `room`, leaving any other room first.
    ///
    /// While not connected the join is recorded and sent once the connection is up.
    pub fn join_room(&self, room: impl Into<UserId>) {
        let room = room.into();
        let mut shared = self.inner.lock_shared();
        let state = &mut *shared;

        if state.rooms.current.as_ref() == Some(&room) {
            tracing::debug!(room = %room, "Already in room");
            return;
        }

        let previous = state.rooms.current.replace(room.clone());
        state.rooms.before_join = previous.clone();
        state.rooms.leaving = None;

        match state.link.as_ref() {
            Some(link) => {
                if let Some(previous) = previous {
                    tracing::info!(room = %previous, "Leaving room");
                    let _ = link.send(ClientMessage::leave(previous));
                }
                tracing::info!(room = %room, "Joining room");
                let _ = link.send(ClientMessage::join(room));
            }
            None => {
                tracing::debug!(room = %room, "Not connected, join queued until connected");
            }
        }
    }

    /// Leave the current room. No-op when not in a room.
    pub fn leave_room(&self) {
        let mut shared = self.inner.lock_shared();
        let state = &mut *shared;

        let Some(room) = state.rooms.current.take() else {
            return;
        };
        state.rooms.before_join = None;

        if let Some(link) = state.link.as_ref() {
            tracing::info!(room = %room, "Leaving room");
            state.rooms.leaving = Some(room.clone());
            let _ = link.send(ClientMessage::leave(room));
        }
    }

    pub fn current_room(&self) -> Option<UserId> {
        self.inner.lock_shared().rooms.current.clone()
    }

    pub fn register_listener(
        &self,
        event: &str,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.inner.listeners.register(event, callback)
    }

    /// Remove a registration. Unknown handles are ignored.
    pub fn unregister_listener(&self, handle: &ListenerHandle) -> bool {
        self.inner.listeners.unregister(handle)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.listeners.listener_count(event)
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn observe_status(&self) -> ConnectionStatusObserver {
        ConnectionStatusObserver::new(self.inner.status.subscribe())
    }
}

impl Inner {
    fn lock_shared(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::debug!(from = %previous, to = %status, "Connection status changed");
        }
    }

    /// Resolves only for a genuine `disconnect()` request.
    async fn stopped(&self) {
        loop {
            self.stop.notified().await;
            let mut shared = self.lock_shared();
            if std::mem::take(&mut shared.stop_requested) {
                shared.stopping = true;
                return;
            }
        }
    }

    /// Resolves once `connect()` has asked for an early attempt.
    async fn restart_wanted(&self) {
        loop {
            self.wake.notified().await;
            if self.lock_shared().restart_requested {
                return;
            }
        }
    }

    async fn run_driver(self: Arc<Self>) {
        let mut backoff = BackoffState::new(self.config.reconnect);

        loop {
            self.drive(&mut backoff).await;
            if !self.finish_or_restart() {
                break;
            }
            backoff.reset();
        }
    }

    /// Connect and reconnect until stopped or out of attempts.
    async fn drive(&self, backoff: &mut BackoffState) {
        loop {
            {
                let mut shared = self.lock_shared();
                // A connect() issued after disconnect() wins over the pending stop
                if std::mem::take(&mut shared.restart_requested) {
                    shared.stop_requested = false;
                }
            }
            self.set_status(ConnectionStatus::Connecting);

            let attempt = tokio::select! {
                result = self.connector.connect(&self.config.url) => Some(result),
                _ = self.stopped() => None,
            };

            match attempt {
                None => return,
                Some(Ok(session)) => {
                    backoff.reset();
                    if self.run_session(session).await == SessionEnd::Stopped {
                        return;
                    }
                    tracing::warn!("Connection to notification service lost, reconnecting");
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        error = %e,
                        attempt = backoff.attempts() + 1,
                        "ConnectionFailed: notification service unreachable"
                    );
                    self.set_status(ConnectionStatus::Disconnected);
                }
            }

            let Some(delay) = backoff.next_delay_and_advance() else {
                tracing::error!(
                    attempts = backoff.attempts(),
                    "Max reconnection attempts reached, giving up"
                );
                return;
            };
            tracing::info!(
                attempt = backoff.attempts(),
                max_attempts = ?backoff.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnection attempt"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.restart_wanted() => {
                    tracing::debug!("Reconnection attempt requested early");
                }
                _ = self.stopped() => return,
            }
        }
    }

    /// Returns `true` when a `connect()` raced the driver's exit and it must go again.
    fn finish_or_restart(&self) -> bool {
        let mut shared = self.lock_shared();
        shared.link = None;
        shared.stop_requested = false;
        shared.stopping = false;
        if std::mem::take(&mut shared.restart_requested) {
            tracing::info!("Connection requested while stopping, starting over");
            return true;
        }
        shared.driver_active = false;
        self.set_status(ConnectionStatus::Disconnected);
        tracing::info!("Connection driver stopped");
        false
    }

    async fn run_session(&self, session: TransportSession) -> SessionEnd {
        let TransportSession {
            outbound,
            mut inbound,
        } = session;
        let (link_tx, mut link_rx) = mpsc::unbounded_channel();

        {
            let mut shared = self.lock_shared();
            let state = &mut *shared;
            // Remote membership does not survive a physical reconnect
            if let Some(room) = state.rooms.current.clone() {
                tracing::info!(room = %room, "Joining room after connect");
                let _ = link_tx.send(ClientMessage::join(room));
            }
            state.rooms.leaving = None;
            state.link = Some(link_tx);
            self.set_status(ConnectionStatus::Connected);
        }

        let period = self.config.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL);
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                msg = inbound.recv() => match msg {
                    Some(msg) => self.handle_server_message(msg),
                    None => break SessionEnd::Dropped,
                },
                Some(msg) = link_rx.recv() => {
                    if outbound.send(msg).await.is_err() {
                        break SessionEnd::Dropped;
                    }
                }
                _ = heartbeat.tick() => {
                    if outbound.send(ClientMessage::Heartbeat).await.is_err() {
                        break SessionEnd::Dropped;
                    }
                }
                _ = self.stopped() => break SessionEnd::Stopped,
            }
        };

        let mut shared = self.lock_shared();
        shared.link = None;
        if end == SessionEnd::Dropped {
            self.set_status(ConnectionStatus::Connecting);
        }
        end
    }

    fn handle_server_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Event { event, payload } => {
                if self.listeners.dispatch(&event, &payload) == 0 {
                    tracing::debug!(event = %event, "No listener registered for event");
                }
            }
            ServerMessage::RoomJoined { room } => {
                let mut shared = self.lock_shared();
                if shared.rooms.current.as_ref() == Some(&room) {
                    shared.rooms.before_join = None;
                }
                tracing::debug!(room = %room, "Room join acknowledged");
            }
            ServerMessage::RoomLeft { room } => {
                let mut shared = self.lock_shared();
                if shared.rooms.leaving.as_ref() == Some(&room) {
                    shared.rooms.leaving = None;
                }
                tracing::debug!(room = %room, "Room leave acknowledged");
            }
            ServerMessage::JoinRejected { room, reason } => {
                tracing::warn!(room = %room, reason = %reason, "JoinFailed: room join rejected");
                let mut shared = self.lock_shared();
                let state = &mut *shared;
                if state.rooms.current.as_ref() != Some(&room) {
                    return;
                }
                state.rooms.current = state.rooms.before_join.take();
                if let (Some(prior), Some(link)) = (state.rooms.current.clone(), state.link.as_ref())
                {
                    tracing::info!(room = %prior, "Restoring previous room");
                    let _ = link.send(ClientMessage::join(prior));
                }
            }
            ServerMessage::LeaveRejected { room, reason } => {
                tracing::warn!(room = %room, reason = %reason, "LeaveFailed: room leave rejected");
                let mut shared = self.lock_shared();
                let state = &mut *shared;
                if state.rooms.leaving.as_ref() == Some(&room) && state.rooms.current.is_none() {
                    state.rooms.leaving = None;
                    state.rooms.current = Some(room);
                }
            }
            ServerMessage::Pong => {
                tracing::trace!("Heartbeat acknowledged");
            }
            ServerMessage::Error { message } => {
                tracing::warn!(message = %message, "Notification service reported an error");
            }
            ServerMessage::Unknown => {
                tracing::debug!("Ignoring unknown server message");
            }
        }
    }
}
