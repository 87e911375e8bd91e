//! Spark chat client
//!
//! Every call builds a fresh envelope and a freshly signed URL, then runs one
//! isolated [`StreamingSession`]. Only the configuration is shared between
//! concurrent calls, and it is read-only.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::build_connection_url;
use crate::config::SparkConfig;
use crate::envelope::{ChatRequest, build_envelope};
use crate::error::Result;
use crate::observer::FrameObserver;
use crate::session::{SessionMachine, SessionOutcome, StreamingSession};
use crate::transport::{Connector, WebSocketConnector};

/// Chat client abstraction consumed by the application layer.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Get model (domain) name
    fn model(&self) -> &str;

    /// Send one message and wait for the aggregated reply.
    async fn chat(&self, request: ChatRequest) -> Result<String>;

    /// Send with per-call options. Clients without streaming support ignore
    /// them.
    async fn chat_with(&self, request: ChatRequest, options: SendOptions) -> Result<String> {
        let _ = options;
        self.chat(request).await
    }
}

/// Per-call extras.
#[derive(Clone, Default)]
pub struct SendOptions {
    pub observer: Option<Arc<dyn FrameObserver>>,
    pub cancel: Option<CancellationToken>,
}

impl SendOptions {
    pub fn with_observer(mut self, observer: Arc<dyn FrameObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Client for the Spark streaming chat endpoint.
#[derive(Clone)]
pub struct SparkClient {
    config: Arc<SparkConfig>,
    connector: Arc<dyn Connector>,
}

impl SparkClient {
    /// Create a client that talks WebSocket to the configured endpoint.
    pub fn new(config: SparkConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(WebSocketConnector::new()))
    }

    /// Create a client over a custom transport.
    pub fn with_connector(config: SparkConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            connector,
        })
    }

    pub fn config(&self) -> &SparkConfig {
        &self.config
    }

    /// Send `message` and wait for the complete reply.
    pub async fn send(
        &self,
        message: &str,
        user_tag: Option<&str>,
        context: Option<&str>,
    ) -> Result<String> {
        let request = ChatRequest {
            message: message.to_string(),
            user_tag: user_tag.map(str::to_string),
            context: context.map(str::to_string),
        };
        self.chat(request).await
    }

    /// Run one session with an optional observer and cancellation token.
    ///
    /// The outer error covers input rejected before any network activity;
    /// the session's own result is in [`SessionOutcome::result`].
    pub async fn send_with(
        &self,
        request: ChatRequest,
        options: SendOptions,
    ) -> Result<SessionOutcome> {
        let config = &self.config;
        let envelope = build_envelope(
            config.credentials.app_id(),
            &config.generation,
            &config.session,
            &request,
        )?;
        let envelope_json = envelope.to_json()?;
        debug!("Prepared envelope for uid {}", envelope.header.uid);

        let timeout = config.session.timeout();
        let mut machine = SessionMachine::new(envelope_json, timeout);
        if let Some(observer) = options.observer {
            machine = machine.with_observer(observer);
        }

        let mut session = StreamingSession::new(machine, self.connector.clone(), timeout);
        if let Some(cancel) = options.cancel {
            session = session.with_cancellation(cancel);
        }

        // Signed last: the signature embeds the handshake timestamp.
        let url = build_connection_url(&config.credentials, Utc::now()).to_url();
        Ok(session.run(url).await)
    }
}

#[async_trait]
impl ChatClient for SparkClient {
    fn model(&self) -> &str {
        &self.config.generation.domain
    }

    async fn chat(&self, request: ChatRequest) -> Result<String> {
        self.chat_with(request, SendOptions::default()).await
    }

    async fn chat_with(&self, request: ChatRequest, options: SendOptions) -> Result<String> {
        self.send_with(request, options).await?.result
    }
}
