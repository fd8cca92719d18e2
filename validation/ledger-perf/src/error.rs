//! Error types for the ledger load generator.

use thiserror::Error;

/// Result type alias using PerfError.
pub type PerfResult<T> = Result<T, PerfError>;

/// Primary error type for configuration, dispatch and worker failures.
#[derive(Debug, Error)]
pub enum PerfError {
    // === Startup Errors ===
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown test case: {0}")]
    UnknownTestCase(String),

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    // === Dispatch Errors ===
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Error submitting {test} request [{status}]: {message} ({body})")]
    Remote {
        test: String,
        status: u16,
        message: String,
        body: String,
    },

    // === Encoding Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PerfError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error happened before any worker could run.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnknownTestCase(_) | Self::InvalidUrl { .. } | Self::Yaml(_)
        )
    }

    /// HTTP status carried by the error, if the node answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display_carries_status_and_body() {
        let err = PerfError::Remote {
            test: "token_mint".to_string(),
            status: 500,
            message: "pool not found".to_string(),
            body: r#"{"error":"pool not found"}"#.to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("[500]"));
        assert!(text.contains("pool not found"));
        assert!(text.contains("token_mint"));
        assert_eq!(err.http_status(), Some(500));
        assert!(!err.is_startup());
    }

    #[test]
    fn test_startup_errors() {
        assert!(PerfError::config("missing recipient").is_startup());
        assert!(PerfError::UnknownTestCase("nope".into()).is_startup());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(!PerfError::Io(io).is_startup());
    }
}
