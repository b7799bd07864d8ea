//! Shared error type used across all conductor crates.

/// The runtime's error taxonomy (see spec §7).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("reasoner unavailable: {0}")]
    ReasonerUnavailable(String),

    #[error("reasoner assertion failed: {0}")]
    ReasonerAssertionFailed(String),

    #[error("tool {tool_name}: {reason}")]
    ToolError { tool_name: String, reason: String },

    #[error("agent {agent_name} failed: {message}")]
    AgentFailure { agent_name: String, message: String },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("unknown request: {0}")]
    UnknownRequest(String),

    #[error("internal error (correlation_id={correlation_id}): {message}")]
    Internal {
        correlation_id: String,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable error code surfaced to clients in `ERROR.code` (§6.2, §7).
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) | Error::Json(_) | Error::Other(_) => "internal",
            Error::InvalidInput(_) => "invalid_input",
            Error::ReasonerUnavailable(_) => "reasoner_unavailable",
            Error::ReasonerAssertionFailed(_) => "reasoner_assertion_failed",
            Error::ToolError { .. } => "tool_error",
            Error::AgentFailure { .. } => "agent_failure",
            Error::Timeout(_) => "timeout",
            Error::Cancelled => "cancelled",
            Error::UnknownRequest(_) => "unknown_request",
            Error::Internal { .. } => "internal",
        }
    }

    /// Message safe for client display: no stack traces, no secrets (§7).
    pub fn display_message(&self) -> String {
        self.to_string()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
