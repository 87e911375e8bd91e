//! WebSocket transport over tokio-tungstenite

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use super::{Connection, Connector, TransportEvent, TransportFailure};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` and `wss://` connections.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Connection>, TransportFailure> {
        // The query carries the signature; only log where we are going.
        info!(
            "Connecting to {}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.path()
        );

        let (stream, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportFailure(format!("WebSocket connect failed: {e}")))?;

        debug!("WebSocket handshake completed ({})", response.status());
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WsStream,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportFailure> {
        self.stream
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| TransportFailure(format!("WebSocket send failed: {e}")))
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            let message = match self.stream.next().await {
                None => return TransportEvent::Closed,
                Some(Ok(message)) => message,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    return TransportEvent::Closed;
                }
                Some(Err(e)) => return TransportEvent::Error(e.to_string()),
            };

            match message {
                WsMessage::Text(text) => return TransportEvent::Message(text.to_string()),
                WsMessage::Binary(bytes) => {
                    return match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::Message(text),
                        Err(_) => TransportEvent::Error("binary frame is not UTF-8".to_string()),
                    };
                }
                WsMessage::Close(frame) => {
                    if let Some(frame) = frame {
                        debug!("Peer closed: {} {}", frame.code, frame.reason);
                    }
                    return TransportEvent::Closed;
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close: {}", e);
        }
    }
}
