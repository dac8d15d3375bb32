//! Wire protocol between the storefront client and the notification service.

pub mod events;
pub mod messages;

pub use events::{decode_notification, encode_notification, NEW_NOTIFICATION};
pub use messages::{ClientMessage, ServerMessage};
