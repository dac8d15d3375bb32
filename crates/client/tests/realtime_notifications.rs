//! End-to-end tests against a local axum WebSocket server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use storefront_client::application::NotificationProvider;
use storefront_client::infrastructure::messaging::{
    ConnectionConfig, ConnectionManager, ConnectionStatus,
};
use storefront_client::infrastructure::websocket::ReconnectPolicy;
use storefront_client::state::SharedNotificationStore;
use storefront_client::testing::eventually;
use storefront_domain::{
    AuthSession, AuthUser, Notification, NotificationKind, NotificationPayload, UserId,
};
use storefront_protocol::{encode_notification, ClientMessage, ServerMessage, NEW_NOTIFICATION};

const WAIT: Duration = Duration::from_secs(5);

enum Outgoing {
    Send(ServerMessage),
    Close,
}

/// What the fake notification service saw, tagged with the connection index.
type Seen = mpsc::UnboundedReceiver<(usize, ClientMessage)>;

struct ServerState {
    seen: mpsc::UnboundedSender<(usize, ClientMessage)>,
    connections: Mutex<Vec<mpsc::UnboundedSender<Outgoing>>>,
}

impl ServerState {
    fn push(&self, connection: usize, outgoing: Outgoing) {
        let connections = self.connections.lock().unwrap();
        let _ = connections[connection].send(outgoing);
    }

    fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

async fn spawn_ws_server() -> (SocketAddr, Arc<ServerState>, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let state = Arc::new(ServerState {
        seen: seen_tx,
        connections: Mutex::new(Vec::new()),
    });

    let router = axum::Router::new()
        .route("/ws", get(ws_handler))
        .with_state(Arc::clone(&state));

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, state, seen_rx)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let index = {
        let mut connections = state.connections.lock().unwrap();
        connections.push(tx);
        connections.len() - 1
    };
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let Some(Ok(Message::Text(text))) = incoming else {
                    break;
                };
                let Ok(msg) = serde_json::from_str::<ClientMessage>(text.as_str()) else {
                    continue;
                };
                let reply = match &msg {
                    ClientMessage::JoinRoom { room } => {
                        Some(ServerMessage::RoomJoined { room: room.clone() })
                    }
                    ClientMessage::LeaveRoom { room } => {
                        Some(ServerMessage::RoomLeft { room: room.clone() })
                    }
                    ClientMessage::Heartbeat => Some(ServerMessage::Pong),
                };
                let _ = state.seen.send((index, msg));
                if let Some(reply) = reply {
                    let json = serde_json::to_string(&reply).unwrap();
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            outgoing = rx.recv() => match outgoing {
                Some(Outgoing::Send(msg)) => {
                    let json = serde_json::to_string(&msg).unwrap();
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
}

/// Next non-heartbeat message the server received.
async fn expect_seen(seen: &mut Seen) -> (usize, ClientMessage) {
    tokio::time::timeout(WAIT, async {
        loop {
            match seen.recv().await.unwrap() {
                (_, ClientMessage::Heartbeat) => continue,
                other => return other,
            }
        }
    })
    .await
    .unwrap()
}

fn config(addr: SocketAddr) -> ConnectionConfig {
    ConnectionConfig {
        url: format!("ws://{addr}/ws"),
        reconnect: ReconnectPolicy {
            initial_delay_ms: 20,
            max_delay_ms: 100,
            jitter_factor: 0.0,
            ..ReconnectPolicy::default()
        },
        heartbeat_interval: Duration::from_secs(60),
    }
}

fn notification(id: &str) -> Notification {
    Notification::new(
        id,
        Utc::now(),
        NotificationPayload::message(NotificationKind::Order, "Your order has shipped")
            .with_entity("order", "1042"),
    )
}

#[tokio::test]
async fn delivers_notifications_to_the_store() {
    let (addr, server, mut seen) = spawn_ws_server().await;
    let connection = ConnectionManager::websocket(config(addr));
    let store = SharedNotificationStore::new();
    let mut provider = NotificationProvider::new(connection.clone(), store.clone());

    provider.apply(&AuthSession::signed_in(AuthUser::new("u1")));

    assert_eq!(
        expect_seen(&mut seen).await,
        (0, ClientMessage::join(UserId::new("u1")))
    );
    assert!(
        connection
            .observe_status()
            .wait_for(ConnectionStatus::Connected, WAIT)
            .await
    );

    let id = uuid::Uuid::new_v4().to_string();
    let payload = encode_notification(&notification(&id)).unwrap();
    server.push(0, Outgoing::Send(ServerMessage::event(NEW_NOTIFICATION, payload.clone())));
    // Redelivery of the same notification is absorbed
    server.push(0, Outgoing::Send(ServerMessage::event(NEW_NOTIFICATION, payload)));

    assert!(eventually(WAIT, || store.duplicates_absorbed() == 1).await);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.notifications.len(), 1);
    assert_eq!(snapshot.notifications[0].id.as_str(), id);
    assert_eq!(snapshot.unread_count, 1);
}

#[tokio::test]
async fn rejoins_room_after_server_drops_connection() {
    let (addr, server, mut seen) = spawn_ws_server().await;
    let connection = ConnectionManager::websocket(config(addr));
    let store = SharedNotificationStore::new();
    let mut provider = NotificationProvider::new(connection.clone(), store.clone());

    provider.apply(&AuthSession::signed_in(AuthUser::new("u1")));
    assert_eq!(
        expect_seen(&mut seen).await,
        (0, ClientMessage::join(UserId::new("u1")))
    );

    server.push(0, Outgoing::Close);

    assert_eq!(
        expect_seen(&mut seen).await,
        (1, ClientMessage::join(UserId::new("u1")))
    );
    assert_eq!(connection.current_room(), Some(UserId::new("u1")));
    assert_eq!(server.connection_count(), 2);

    // The listener registered before the drop still feeds the store
    let payload = encode_notification(&notification("after-reconnect")).unwrap();
    server.push(1, Outgoing::Send(ServerMessage::event(NEW_NOTIFICATION, payload)));
    assert!(eventually(WAIT, || store.len() == 1).await);
    assert_eq!(connection.listener_count(NEW_NOTIFICATION), 1);
}

#[tokio::test]
async fn logout_leaves_room_and_keeps_socket_open() {
    let (addr, server, mut seen) = spawn_ws_server().await;
    let connection = ConnectionManager::websocket(config(addr));
    let mut provider = NotificationProvider::new(connection.clone(), SharedNotificationStore::new());

    provider.apply(&AuthSession::signed_in(AuthUser::new("u1")));
    assert_eq!(
        expect_seen(&mut seen).await,
        (0, ClientMessage::join(UserId::new("u1")))
    );

    provider.apply(&AuthSession::signed_out());

    assert_eq!(
        expect_seen(&mut seen).await,
        (0, ClientMessage::leave(UserId::new("u1")))
    );
    assert_eq!(connection.current_room(), None);
    assert_eq!(connection.status(), ConnectionStatus::Connected);
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn unreachable_service_never_reports_connected() {
    // Bind then drop to get a port nobody listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let mut config = config(addr);
    config.reconnect.max_attempts = Some(2);
    let connection = ConnectionManager::websocket(config);

    connection.connect();
    connection.join_room("u1");

    let mut observer = connection.observe_status();
    assert!(!observer.wait_for(ConnectionStatus::Connected, Duration::from_millis(300)).await);
    assert_eq!(connection.status(), ConnectionStatus::Disconnected);
    // The join stays queued for a later connection
    assert_eq!(connection.current_room(), Some(UserId::new("u1")));
}
