//! Realtime messaging infrastructure.
//!
//! - `ConnectionManager`: the single long-lived connection to the notification service
//! - `ListenerRegistry`: per-event callbacks fed by the manager
//! - `ConnectionStatusObserver`: read-only view of the connection status for views

pub mod connection;
pub mod listeners;
pub mod manager;

pub use connection::{ConnectionStatus, ConnectionStatusObserver};
pub use listeners::{EventCallback, ListenerHandle, ListenerRegistry};
pub use manager::{ConnectionConfig, ConnectionManager};
