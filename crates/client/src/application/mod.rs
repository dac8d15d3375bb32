//! Application layer: binds authentication to the realtime connection and the store.

pub mod auth;
pub mod provider;

pub use auth::AuthHandle;
pub use provider::{NotificationActions, NotificationProvider};
