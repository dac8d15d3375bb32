//! Notification record delivered over the realtime channel and the REST history API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::NotificationId;

/// What a notification is about.
///
/// Unknown kinds sent by a newer backend deserialize to `Other` instead of failing
/// the whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Order,
    Review,
    Coupon,
    Transaction,
    Account,
    #[default]
    #[serde(other)]
    Other,
}

/// Reference to the entity a notification points at (an order, a review, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: String,
}

/// Kind-specific content of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(default, rename = "type")]
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// A single notification.
///
/// `is_read` is only ever flipped by the notification store; everything else is
/// assigned by the originating service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: NotificationId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: NotificationPayload,
    #[serde(default, alias = "read")]
    pub is_read: bool,
}

impl Notification {
    pub fn new(
        id: impl Into<NotificationId>,
        created_at: DateTime<Utc>,
        payload: NotificationPayload,
    ) -> Self {
        Self {
            id: id.into(),
            created_at,
            payload,
            is_read: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.payload.message
    }
}

impl NotificationPayload {
    pub fn message(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity = Some(EntityRef {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        });
        self
    }
}
