//! Error types for the Spark chat client

use thiserror::Error;

/// Spark client error types
#[derive(Error, Debug)]
pub enum SparkError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote service error {code}: {message}")]
    RemoteProtocol { code: i64, message: String },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Connection closed before the final frame was received")]
    IncompleteStream,

    #[error("Deadline of {0}s exceeded")]
    DeadlineExceeded(u64),

    #[error("Session cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SparkError {
    /// HTTP status a web collaborator should answer with for this failure.
    pub fn http_status(&self) -> u16 {
        match self {
            SparkError::InvalidInput(_) => 400,
            SparkError::DeadlineExceeded(_) => 504,
            SparkError::Cancelled => 499,
            SparkError::Transport(_)
            | SparkError::RemoteProtocol { .. }
            | SparkError::MalformedFrame(_)
            | SparkError::IncompleteStream => 502,
            SparkError::Config(_) | SparkError::Json(_) => 500,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SparkError::DeadlineExceeded(_))
    }
}

/// Result type alias for Spark operations
pub type Result<T> = std::result::Result<T, SparkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(SparkError::InvalidInput("empty".into()).http_status(), 400);
        assert_eq!(SparkError::DeadlineExceeded(30).http_status(), 504);
        assert_eq!(SparkError::IncompleteStream.http_status(), 502);
        assert_eq!(
            SparkError::RemoteProtocol {
                code: 11200,
                message: "quota exceeded".into()
            }
            .http_status(),
            502
        );
        assert_eq!(SparkError::Config("missing".into()).http_status(), 500);
    }

    #[test]
    fn test_remote_error_display() {
        let err = SparkError::RemoteProtocol {
            code: 1,
            message: "quota exceeded".into(),
        };
        assert_eq!(err.to_string(), "Remote service error 1: quota exceeded");
        assert!(SparkError::DeadlineExceeded(30).is_timeout());
        assert!(!err.is_timeout());
    }
}
