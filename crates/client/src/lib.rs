//! Storefront realtime client.
//!
//! - [`infrastructure::messaging::ConnectionManager`]: the single long-lived
//!   connection to the notification service
//! - [`state::SharedNotificationStore`]: ordered notifications and unread count
//! - [`application::NotificationProvider`]: binds authentication to both

pub mod application;
pub mod config;
pub mod infrastructure;
pub mod ports;
pub mod state;

pub use infrastructure::testing;
