//! Deterministic scripted transport for tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use url::Url;

use super::{Connection, Connector, TransportEvent, TransportFailure};

/// One scripted step replayed by the connection, in order.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Deliver an event.
    Event(TransportEvent),
    /// Wait before the next step.
    Delay(Duration),
}

impl ScriptStep {
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Event(TransportEvent::Message(text.into()))
    }

    pub fn frame(value: Value) -> Self {
        Self::raw(value.to_string())
    }

    /// A successful content frame.
    pub fn content(status: i64, content: &str) -> Self {
        Self::frame(json!({
            "header": { "code": 0, "message": "Success", "status": status },
            "payload": { "choices": { "status": status, "text": [ { "content": content, "role": "assistant" } ] } }
        }))
    }

    pub fn closed() -> Self {
        Self::Event(TransportEvent::Closed)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Event(TransportEvent::Error(message.into()))
    }

    pub fn delay(millis: u64) -> Self {
        Self::Delay(Duration::from_millis(millis))
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    connect_error: Option<String>,
    send_error: Option<String>,
    steps: Mutex<VecDeque<ScriptStep>>,
    sent: Mutex<Vec<String>>,
    urls: Mutex<Vec<Url>>,
    connects: AtomicUsize,
    closed: AtomicBool,
}

/// Connector whose connection replays a fixed script.
///
/// Once the script is exhausted the connection stays silent forever, which
/// models a peer that never answers.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<ScriptState>,
}

impl ScriptedConnector {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            state: Arc::new(ScriptState {
                steps: Mutex::new(VecDeque::from(steps)),
                ..ScriptState::default()
            }),
        }
    }

    /// Connects, then never emits anything.
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    /// Fails every connection attempt.
    pub fn refusing(message: impl Into<String>) -> Self {
        Self {
            state: Arc::new(ScriptState {
                connect_error: Some(message.into()),
                ..ScriptState::default()
            }),
        }
    }

    /// Connects, but every send fails.
    pub fn failing_send(message: impl Into<String>) -> Self {
        Self {
            state: Arc::new(ScriptState {
                send_error: Some(message.into()),
                ..ScriptState::default()
            }),
        }
    }

    /// Text messages written by the session.
    pub fn sent(&self) -> Vec<String> {
        self.state.sent.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<Url> {
        self.state.urls.lock().last().cloned()
    }

    /// Whether the session closed the connection.
    pub fn was_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Connection>, TransportFailure> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.urls.lock().push(url.clone());

        if let Some(message) = &self.state.connect_error {
            return Err(TransportFailure(message.clone()));
        }

        Ok(Box::new(ScriptedConnection {
            state: self.state.clone(),
        }))
    }
}

struct ScriptedConnection {
    state: Arc<ScriptState>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportFailure> {
        if let Some(message) = &self.state.send_error {
            return Err(TransportFailure(message.clone()));
        }
        self.state.sent.lock().push(text);
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            if self.state.closed.load(Ordering::SeqCst) {
                return TransportEvent::Closed;
            }

            let step = self.state.steps.lock().pop_front();
            match step {
                Some(ScriptStep::Event(event)) => return event,
                Some(ScriptStep::Delay(duration)) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        }
    }

    async fn close(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}
