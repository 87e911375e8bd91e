//! Duplex transport seam
//!
//! A [`Connector`] opens one [`Connection`] per session. Connections are
//! exclusively owned by their session and never pooled.

mod mock;
mod websocket;

pub use mock::{ScriptStep, ScriptedConnector};
pub use websocket::WebSocketConnector;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::error::SparkError;

/// Transport-level failure, surfaced to callers as [`SparkError::Transport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportFailure(pub String);

impl From<TransportFailure> for SparkError {
    fn from(err: TransportFailure) -> Self {
        SparkError::Transport(err.0)
    }
}

/// What a connection can report while receiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete inbound text message.
    Message(String),
    /// The peer closed the connection.
    Closed,
    /// The connection dropped abnormally.
    Error(String),
}

#[async_trait]
pub trait Connection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportFailure>;

    /// Wait for the next inbound event. Control frames are handled internally.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close the connection. Errors while closing are not reported.
    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Connection>, TransportFailure>;
}
