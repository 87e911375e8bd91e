//! Folding streamed deltas into the final reply

use crate::frame::StreamFrame;

/// Returned when an exchange completes without producing any text.
pub const NO_CONTENT_FALLBACK: &str = "抱歉，AI未能生成有效回复";

/// Concatenate every frame's delta in sequence order.
pub fn fold<'a>(frames: impl IntoIterator<Item = &'a StreamFrame>) -> String {
    let mut aggregator = ResponseAggregator::new();
    for frame in frames {
        aggregator.push(frame);
    }
    aggregator.into_text()
}

/// Accumulates partial text for a single session.
#[derive(Debug, Default)]
pub struct ResponseAggregator {
    text: String,
    deltas: usize,
}

impl ResponseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the frame's delta, if any. Returns the appended slice.
    pub fn push<'f>(&mut self, frame: &'f StreamFrame) -> Option<&'f str> {
        let delta = frame.delta.as_deref()?;
        self.text.push_str(delta);
        self.deltas += 1;
        Some(delta)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Final reply, substituting the fallback for an empty aggregation.
    pub fn into_reply(self) -> String {
        if self.text.is_empty() {
            NO_CONTENT_FALLBACK.to_string()
        } else {
            self.text
        }
    }
}
