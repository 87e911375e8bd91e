//! Outbound request envelope

use serde::{Deserialize, Serialize};

use crate::config::{GenerationParameters, SessionOptions};
use crate::error::{Result, SparkError};

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One call's worth of caller input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub user_tag: Option<String>,
    pub context: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user_tag: None,
            context: None,
        }
    }

    pub fn with_user_tag(mut self, user_tag: impl Into<String>) -> Self {
        self.user_tag = Some(user_tag.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestHeader {
    pub app_id: String,
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestParameter {
    pub chat: GenerationParameters,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestPayload {
    pub message: MessageText,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MessageText {
    pub text: Vec<ChatMessage>,
}

/// The single structured document sent at the start of every session.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestEnvelope {
    pub header: RequestHeader,
    pub parameter: RequestParameter,
    pub payload: RequestPayload,
}

impl RequestEnvelope {
    /// Ordered messages: one system entry, then one user entry.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.payload.message.text
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Assemble the request envelope for one call.
///
/// Fails with [`SparkError::InvalidInput`] before any network activity when
/// the user message is blank.
pub fn build_envelope(
    app_id: &str,
    params: &GenerationParameters,
    options: &SessionOptions,
    request: &ChatRequest,
) -> Result<RequestEnvelope> {
    if request.message.trim().is_empty() {
        return Err(SparkError::InvalidInput(
            "message must not be empty".to_string(),
        ));
    }

    let uid = request
        .user_tag
        .as_deref()
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .unwrap_or(options.default_user_tag.as_str())
        .to_string();

    let system = system_content(
        &options.system_prompt,
        &options.context_delimiter,
        request.context.as_deref(),
    );

    Ok(RequestEnvelope {
        header: RequestHeader {
            app_id: app_id.to_string(),
            uid,
        },
        parameter: RequestParameter {
            chat: params.clone(),
        },
        payload: RequestPayload {
            message: MessageText {
                text: vec![
                    ChatMessage::system(system),
                    ChatMessage::user(request.message.clone()),
                ],
            },
        },
    })
}

fn system_content(prompt: &str, delimiter: &str, context: Option<&str>) -> String {
    match context {
        Some(context) if !context.is_empty() => format!("{prompt}{delimiter}{context}"),
        _ => prompt.to_string(),
    }
}
