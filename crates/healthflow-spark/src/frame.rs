//! Inbound stream frames

use serde::Deserialize;

use crate::error::{Result, SparkError};

/// `header.status` value marking the last frame of an exchange.
pub const FINAL_STATUS: i64 = 2;

/// Token usage reported on the final frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// One decoded inbound message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamFrame {
    pub status: i64,
    pub code: i64,
    pub message: Option<String>,
    pub delta: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl StreamFrame {
    /// A content frame with the given status.
    pub fn content(status: i64, delta: impl Into<String>) -> Self {
        Self {
            status,
            delta: Some(delta.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.code != 0
    }

    pub fn is_final(&self) -> bool {
        self.status == FINAL_STATUS
    }

    /// Decode a raw text message.
    pub fn decode(raw: &str) -> Result<Self> {
        let wire: WireFrame =
            serde_json::from_str(raw).map_err(|e| SparkError::MalformedFrame(e.to_string()))?;

        let payload = wire.payload.unwrap_or_default();
        let delta = payload.choices.and_then(|choices| {
            if choices.text.is_empty() {
                None
            } else {
                Some(choices.text.into_iter().map(|t| t.content).collect())
            }
        });

        Ok(Self {
            status: wire.header.status,
            code: wire.header.code,
            message: wire.header.message.filter(|m| !m.is_empty()),
            delta,
            usage: payload.usage.map(|u| u.text),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    header: WireHeader,
    #[serde(default)]
    payload: Option<WirePayload>,
}

#[derive(Debug, Deserialize)]
struct WireHeader {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: i64,
}

#[derive(Debug, Default, Deserialize)]
struct WirePayload {
    #[serde(default)]
    choices: Option<WireChoices>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoices {
    #[serde(default)]
    text: Vec<WireText>,
}

#[derive(Debug, Deserialize)]
struct WireText {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    text: TokenUsage,
}
