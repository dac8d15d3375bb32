//! Names of the room-scoped events the notification service emits.
//!
//! Event payloads travel as raw JSON inside [`crate::ServerMessage::Event`]; the
//! receiver decides how to decode them based on the event name.

use serde::Deserialize;
use serde_json::Value;
use storefront_domain::Notification;

/// A new notification for the room's user. Payload: [`Notification`].
pub const NEW_NOTIFICATION: &str = "new_notification";

/// Decode the payload of a [`NEW_NOTIFICATION`] event.
pub fn decode_notification(payload: &Value) -> Result<Notification, serde_json::Error> {
    Notification::deserialize(payload)
}

/// Encode a notification as a [`NEW_NOTIFICATION`] payload.
pub fn encode_notification(notification: &Notification) -> Result<Value, serde_json::Error> {
    serde_json::to_value(notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use storefront_domain::{NotificationKind, NotificationPayload};

    #[test]
    fn notification_payload_survives_the_wire() {
        let created = chrono::Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap();
        let n = Notification::new(
            "n-7",
            created,
            NotificationPayload::message(NotificationKind::Review, "New 5-star review")
                .with_entity("review", "r-9"),
        );

        let value = encode_notification(&n).unwrap();
        assert_eq!(value["type"], "review");
        assert_eq!(value["createdAt"], "2024-05-02T08:30:00Z");

        assert_eq!(decode_notification(&value).unwrap(), n);
    }

    #[test]
    fn garbage_payload_is_an_error() {
        let value = serde_json::json!({ "message": "no id" });
        assert!(decode_notification(&value).is_err());
    }
}
