//! WebSocket connector using tokio-tungstenite

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use storefront_protocol::{ClientMessage, ServerMessage};

use crate::infrastructure::transport::{
    Connector, TransportError, TransportSession, SESSION_CHANNEL_CAPACITY,
};

/// Opens physical WebSocket sessions to the notification service.
///
/// Each session runs a read task and a write task. When the socket closes or
/// errors, the read task drops its inbound sender, which the connection manager
/// observes as a drop.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

pub fn parse_server_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<TransportSession, TransportError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::connect_failed(url, e))?;
        tracing::info!(url = %url, "Connected to notification service");

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientMessage>(SESSION_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<ServerMessage>(SESSION_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match parse_server_message(&text) {
                        Ok(server_msg) => {
                            if inbound_tx.send(server_msg).await.is_err() {
                                // Session abandoned by the manager
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse server message: {}", e);
                        }
                    },
                    Ok(Message::Close(_)) => {
                        tracing::info!("Server closed connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Read task completed");
        });

        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!("Failed to serialize WebSocket message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    tracing::error!("Failed to send message: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            tracing::debug!("Write task completed");
        });

        Ok(TransportSession {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
