//! Streaming session state machine
//!
//! One session owns one connection for one exchange:
//!
//! ```text
//! Idle -> Connecting -> Streaming -> { Completed | Failed | TimedOut }
//! ```
//!
//! [`SessionMachine`] is the pure transition function; [`StreamingSession`]
//! drives it from transport events, the deadline and the cancellation token.
//! Terminal states are final, so every session yields exactly one outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::aggregator::ResponseAggregator;
use crate::error::{Result, SparkError};
use crate::frame::{StreamFrame, TokenUsage};
use crate::observer::FrameObserver;
use crate::transport::{Connection, Connector, TransportEvent};

/// Upper bound on waiting for a close handshake after a terminal transition.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
    TimedOut,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::TimedOut
        )
    }
}

/// Inputs the machine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Opened,
    Frame(String),
    TransportError(String),
    Closed,
    DeadlineElapsed,
    Cancelled,
}

impl From<TransportEvent> for SessionInput {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Message(raw) => SessionInput::Frame(raw),
            TransportEvent::Closed => SessionInput::Closed,
            TransportEvent::Error(message) => SessionInput::TransportError(message),
        }
    }
}

/// Why a connection attempt produced no connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    Transport(String),
    DeadlineElapsed,
    Cancelled,
}

/// Terminal transition produced by the machine.
#[derive(Debug)]
pub struct Finished {
    pub state: SessionState,
    pub outcome: Result<String>,
    pub close_transport: bool,
}

/// What the driver must do after feeding an input.
#[derive(Debug)]
pub enum Step {
    /// Keep receiving.
    Continue,
    /// Write the serialized envelope.
    Transmit(String),
    /// The session reached a terminal state.
    Finish(Finished),
    /// Input arrived in a state that does not accept it.
    Ignored,
}

pub struct SessionMachine {
    state: SessionState,
    envelope: Option<String>,
    aggregator: ResponseAggregator,
    frames: usize,
    usage: Option<TokenUsage>,
    timeout: Duration,
    observer: Option<Arc<dyn FrameObserver>>,
}

impl SessionMachine {
    pub fn new(envelope_json: String, timeout: Duration) -> Self {
        Self {
            state: SessionState::Idle,
            envelope: Some(envelope_json),
            aggregator: ResponseAggregator::new(),
            frames: 0,
            usage: None,
            timeout,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn FrameObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frames_received(&self) -> usize {
        self.frames
    }

    pub fn usage(&self) -> Option<&TokenUsage> {
        self.usage.as_ref()
    }

    /// Idle -> Connecting. Returns false if already started.
    pub fn start(&mut self) -> bool {
        if self.state != SessionState::Idle {
            return false;
        }
        self.state = SessionState::Connecting;
        true
    }

    /// Connecting -> terminal when no connection was established. Nothing
    /// is left to close.
    pub fn fail_connect(&mut self, failure: ConnectFailure) -> Finished {
        let (state, error) = match failure {
            ConnectFailure::Transport(message) => {
                (SessionState::Failed, SparkError::Transport(message))
            }
            ConnectFailure::DeadlineElapsed => (
                SessionState::TimedOut,
                SparkError::DeadlineExceeded(self.timeout.as_secs()),
            ),
            ConnectFailure::Cancelled => (SessionState::Failed, SparkError::Cancelled),
        };
        self.settle(state, Err(error), false)
    }

    pub fn handle(&mut self, input: SessionInput) -> Step {
        if self.state.is_terminal() || self.state == SessionState::Idle {
            return Step::Ignored;
        }

        match input {
            SessionInput::Opened => self.on_open(),
            SessionInput::Frame(raw) => self.on_frame(&raw),
            SessionInput::TransportError(message) => {
                self.finish(SessionState::Failed, Err(SparkError::Transport(message)), true)
            }
            SessionInput::Closed => {
                self.finish(SessionState::Failed, Err(SparkError::IncompleteStream), false)
            }
            SessionInput::DeadlineElapsed => self.finish(
                SessionState::TimedOut,
                Err(SparkError::DeadlineExceeded(self.timeout.as_secs())),
                true,
            ),
            SessionInput::Cancelled => {
                self.finish(SessionState::Failed, Err(SparkError::Cancelled), true)
            }
        }
    }

    fn on_open(&mut self) -> Step {
        if self.state != SessionState::Connecting {
            return Step::Ignored;
        }
        match self.envelope.take() {
            Some(envelope) => {
                self.state = SessionState::Streaming;
                Step::Transmit(envelope)
            }
            None => Step::Ignored,
        }
    }

    fn on_frame(&mut self, raw: &str) -> Step {
        if self.state != SessionState::Streaming {
            return Step::Ignored;
        }
        self.frames += 1;

        let frame = match StreamFrame::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Undecodable frame #{}: {}", self.frames, e);
                return self.finish(SessionState::Failed, Err(e), true);
            }
        };
        debug!(
            "Frame #{}: status={} code={}",
            self.frames, frame.status, frame.code
        );

        if frame.is_error() {
            let message = frame
                .message
                .unwrap_or_else(|| "unknown error".to_string());
            warn!("Remote service error {}: {}", frame.code, message);
            return self.finish(
                SessionState::Failed,
                Err(SparkError::RemoteProtocol {
                    code: frame.code,
                    message,
                }),
                true,
            );
        }

        if let Some(delta) = self.aggregator.push(&frame)
            && !delta.is_empty()
            && let Some(observer) = &self.observer
        {
            observer.on_delta(delta);
        }
        if frame.usage.is_some() {
            self.usage = frame.usage.clone();
        }

        if frame.is_final() {
            let reply = std::mem::take(&mut self.aggregator).into_reply();
            return self.finish(SessionState::Completed, Ok(reply), true);
        }
        Step::Continue
    }

    fn finish(&mut self, state: SessionState, outcome: Result<String>, close: bool) -> Step {
        Step::Finish(self.settle(state, outcome, close))
    }

    fn settle(&mut self, state: SessionState, outcome: Result<String>, close: bool) -> Finished {
        self.state = state;
        Finished {
            state,
            outcome,
            close_transport: close,
        }
    }
}

/// Observable summary of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub state: SessionState,
    pub frames: usize,
    pub usage: Option<TokenUsage>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct SessionOutcome {
    pub result: Result<String>,
    pub report: SessionReport,
}

/// Drives one [`SessionMachine`] over one connection.
pub struct StreamingSession {
    machine: SessionMachine,
    connector: Arc<dyn Connector>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl StreamingSession {
    pub fn new(machine: SessionMachine, connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        Self {
            machine,
            connector,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the exchange against `url` to its single terminal outcome.
    pub async fn run(mut self, url: Url) -> SessionOutcome {
        let started = Instant::now();
        // Armed before the connection attempt; dropped with the session.
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        let cancel = self.cancel.clone();

        self.machine.start();

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConnectFailure::Cancelled),
            _ = &mut deadline => Err(ConnectFailure::DeadlineElapsed),
            result = self.connector.connect(&url) => {
                result.map_err(|e| ConnectFailure::Transport(e.0))
            }
        };

        let mut connection: Box<dyn Connection> = match connected {
            Ok(connection) => connection,
            Err(failure) => {
                let finished = self.machine.fail_connect(failure);
                return self.conclude(finished, started);
            }
        };

        let mut step = self.machine.handle(SessionInput::Opened);
        let finished = loop {
            let input = match step {
                Step::Finish(finished) => break finished,
                Step::Transmit(envelope) => {
                    debug!("Sending request envelope ({} bytes)", envelope.len());
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Some(SessionInput::Cancelled),
                        _ = &mut deadline => Some(SessionInput::DeadlineElapsed),
                        sent = connection.send_text(envelope) => {
                            sent.err().map(|e| SessionInput::TransportError(e.0))
                        }
                    }
                }
                Step::Continue | Step::Ignored => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Some(SessionInput::Cancelled),
                        _ = &mut deadline => Some(SessionInput::DeadlineElapsed),
                        event = connection.next_event() => Some(SessionInput::from(event)),
                    }
                }
            };

            step = match input {
                Some(input) => self.machine.handle(input),
                None => Step::Continue,
            };
        };

        if finished.close_transport
            && tokio::time::timeout(CLOSE_GRACE, connection.close())
                .await
                .is_err()
        {
            debug!("Close handshake did not finish within {:?}", CLOSE_GRACE);
        }

        self.conclude(finished, started)
    }

    fn conclude(self, finished: Finished, started: Instant) -> SessionOutcome {
        let report = SessionReport {
            state: finished.state,
            frames: self.machine.frames_received(),
            usage: self.machine.usage().cloned(),
            elapsed: started.elapsed(),
        };

        match &finished.outcome {
            Ok(text) => info!(
                "Session completed: {} frames, {} chars in {:?}",
                report.frames,
                text.chars().count(),
                report.elapsed
            ),
            Err(e) => warn!("Session ended in {:?}: {}", finished.state, e),
        }

        SessionOutcome {
            result: finished.outcome,
            report,
        }
    }
}
