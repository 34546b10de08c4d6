//! Error types for the assistant core
//!
//! Every failure a turn can meet is one `AgentError` variant. Failures raised
//! inside a tool are rendered into text at the tool boundary and fed back to the
//! model; failures of the model call itself, or of service setup, are returned
//! to the caller. The display text of each variant opens with a phrase naming
//! its kind so a rendered tool result still tells the kinds apart.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
    #[error("Unknown tool: '{0}'")]
    UnknownTool(String),
    #[error("Malformed tool call: {0}")]
    MalformedToolCall(String),
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("Language model call failed: {0}")]
    UpstreamModel(String),
    #[error("Scrape failed: {0}")]
    ScrapeFailure(String),
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },
    #[error("Query rejected: {0}")]
    QueryRejected(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("RAG operation failed: {0}")]
    RagError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Maximum tool rounds reached without a final answer")]
    MaxStepsReached,
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AgentError {
    /// Errors the caller caused, as opposed to the service or its backends.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AgentError::InvalidExpression(_) | AgentError::Arithmetic(_)
        )
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::UpstreamModel(err.to_string())
    }
}

impl From<sqlx::Error> for AgentError {
    fn from(err: sqlx::Error) -> Self {
        AgentError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::ParsingError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_kind() {
        let invalid = AgentError::InvalidExpression("unexpected token".into());
        let arithmetic = AgentError::Arithmetic("division by zero".into());
        assert!(invalid.to_string().starts_with("Invalid expression"));
        assert!(arithmetic.to_string().starts_with("Arithmetic error"));
        assert_ne!(invalid.to_string(), arithmetic.to_string());
    }

    #[test]
    fn test_client_errors() {
        assert!(AgentError::Arithmetic("x".into()).is_client_error());
        assert!(!AgentError::UpstreamModel("x".into()).is_client_error());
        assert!(!AgentError::Timeout {
            operation: "model call".into(),
            seconds: 5
        }
        .is_client_error());
    }
}
