//! In-memory test doubles for the realtime transport.

mod channel_connector;

pub use channel_connector::{eventually, ChannelConnector, RemoteAcceptor, RemoteEnd};
