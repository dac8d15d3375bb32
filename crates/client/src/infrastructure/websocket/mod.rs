//! WebSocket transport for the notification service
//!
//! - `client`: tokio-tungstenite based [`Connector`](crate::infrastructure::transport::Connector)
//! - `core`: reconnection backoff shared by the connection manager

mod client;
mod core;

pub use client::{parse_server_message, WebSocketConnector};
pub use core::{BackoffState, ReconnectPolicy};
