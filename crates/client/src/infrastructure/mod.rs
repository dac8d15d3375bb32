pub mod http_client;
pub mod messaging;
pub mod transport;
pub mod websocket;

pub mod testing;

// Re-export messaging types
pub use messaging::{ConnectionManager, ConnectionStatus, ListenerHandle};
