//! WebSocket message types for client/notification-service communication
//!
//! Every frame is a JSON text frame tagged by `type`.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Renaming variants is a breaking change
//! - Unknown server variants deserialize to `Unknown` so older clients keep working

use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_domain::UserId;

// =============================================================================
// Client Messages (client → service)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Subscribe this connection to the user's notification room
    JoinRoom { room: UserId },
    /// Unsubscribe from a room
    LeaveRoom { room: UserId },
    /// Heartbeat ping
    Heartbeat,
}

impl ClientMessage {
    pub fn join(room: UserId) -> Self {
        Self::JoinRoom { room }
    }

    pub fn leave(room: UserId) -> Self {
        Self::LeaveRoom { room }
    }
}

// =============================================================================
// Server Messages (service → client)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Join acknowledged
    RoomJoined { room: UserId },
    /// Leave acknowledged
    RoomLeft { room: UserId },
    /// The service refused the join (e.g. the session is not allowed into that room)
    JoinRejected { room: UserId, reason: String },
    /// The service refused the leave
    LeaveRejected { room: UserId, reason: String },
    /// A named, room-scoped event with a raw payload
    Event { event: String, payload: Value },
    /// Heartbeat response
    Pong,
    /// Protocol-level error not tied to a request
    Error { message: String },
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn event(event: impl Into<String>, payload: Value) -> Self {
        Self::Event {
            event: event.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_type_tagged() {
        let json = serde_json::to_string(&ClientMessage::join(UserId::new("u1"))).unwrap();
        assert_eq!(json, r#"{"type":"JoinRoom","room":"u1"}"#);

        let json = serde_json::to_string(&ClientMessage::Heartbeat).unwrap();
        assert_eq!(json, r#"{"type":"Heartbeat"}"#);
    }

    #[test]
    fn parses_event_frame() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"Event","event":"new_notification","payload":{"id":"n1"}}"#,
        )
        .unwrap();

        match msg {
            ServerMessage::Event { event, payload } => {
                assert_eq!(event, "new_notification");
                assert_eq!(payload["id"], "n1");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unknown_server_variant_is_tolerated() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"PresenceChanged","online":3}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }
}
