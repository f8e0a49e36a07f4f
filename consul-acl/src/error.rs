//! Error types for token reconciliation
//!
//! Every failure a pass can hit is an [`AclError`]. Transport and status
//! failures are retried inside the HTTP client and only surface here once the
//! retry budget is spent.

use thiserror::Error;

/// Reconciliation error types.
#[derive(Debug, Error)]
pub enum AclError {
    /// The agent did not answer with a 2xx response within the retry budget
    #[error("Remote unavailable after {attempts} attempt(s){}: {message}", fmt_status(.status))]
    RemoteUnavailable {
        /// Number of attempts made.
        attempts: u32,
        /// Last HTTP status, if a response was received at all.
        status: Option<u16>,
        /// Last response body or transport error message.
        message: String,
    },

    /// A response body did not have the expected shape
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// More than one remote token carries the same description
    #[error("Ambiguous match for '{key}': {candidates} remote tokens share this description")]
    AmbiguousMatch {
        /// Correlation key (token description).
        key: String,
        /// Number of matching remote tokens.
        candidates: usize,
    },

    /// A desired token or the agent configuration is invalid
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// `flush` was called without a successful `prepare`
    #[error("Reconciliation context has no prepared plan to flush")]
    NotPrepared,
}

/// Result type for reconciliation operations.
pub type AclResult<T> = Result<T, AclError>;

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (last status {})", code),
        None => String::new(),
    }
}

impl AclError {
    /// Check if this error came from the network side rather than from
    /// the declared configuration.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AclError::RemoteUnavailable { .. } | AclError::ProtocolError(_)
        )
    }

    /// Get error code for reports and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            AclError::RemoteUnavailable { .. } => "REMOTE_UNAVAILABLE",
            AclError::ProtocolError(_) => "PROTOCOL_ERROR",
            AclError::AmbiguousMatch { .. } => "AMBIGUOUS_MATCH",
            AclError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            AclError::NotPrepared => "NOT_PREPARED",
        }
    }
}
