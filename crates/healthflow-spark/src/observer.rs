//! Optional per-delta observers
//!
//! Observers see content as it streams in. They never influence the outcome
//! of a session; the aggregated reply is still the single result.

use tokio::sync::mpsc;

pub trait FrameObserver: Send + Sync {
    fn on_delta(&self, delta: &str);
}

impl<F> FrameObserver for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_delta(&self, delta: &str) {
        self(delta)
    }
}

/// Forwards deltas into a channel; a dropped receiver is ignored.
impl FrameObserver for mpsc::UnboundedSender<String> {
    fn on_delta(&self, delta: &str) {
        let _ = self.send(delta.to_string());
    }
}
