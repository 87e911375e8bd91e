//! HealthFlow Spark - signed streaming chat client
//!
//! This crate provides:
//! - Credential and generation-parameter configuration (TOML + environment)
//! - HMAC-SHA256 signed connection URLs
//! - Request envelope construction
//! - A streaming session state machine with deadline and cancellation
//! - Folding of streamed deltas into one reply

pub mod aggregator;
pub mod auth;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod observer;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use aggregator::{NO_CONTENT_FALLBACK, ResponseAggregator, fold};
pub use auth::{SignedConnectionUrl, build_connection_url};
pub use client::{ChatClient, SendOptions, SparkClient};
pub use config::{Credentials, GenerationParameters, SessionOptions, SparkConfig, SparkSettings};
pub use envelope::{ChatMessage, ChatRequest, RequestEnvelope, Role, build_envelope};
pub use error::{Result, SparkError};
pub use frame::{FINAL_STATUS, StreamFrame, TokenUsage};
pub use observer::FrameObserver;
pub use session::{SessionOutcome, SessionReport, SessionState};
pub use transport::{
    Connection, Connector, ScriptStep, ScriptedConnector, TransportEvent, TransportFailure,
    WebSocketConnector,
};
