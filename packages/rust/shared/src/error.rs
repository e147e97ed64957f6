//! Error types for InsightLens.
//!
//! Library crates use [`InsightError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Message shown for any failure that has no more specific wording.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to process selection. Try again.";

/// Message shown when the backend cannot be reached at all.
pub const BACKEND_OFFLINE_MESSAGE: &str = "Backend offline. Check that the server is running.";

/// Message shown when the backend is reachable but too slow to answer.
pub const BACKEND_TIMEOUT_MESSAGE: &str = "The backend took too long to respond. Try again.";

/// Top-level error type for all InsightLens operations.
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    /// The backend host could not be reached (connect/timeout/send failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request was sent but no complete answer arrived in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Http { status: u16, detail: Option<String> },

    /// The response body could not be parsed into the expected shape.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Screenshot capture failed.
    #[error("capture error: {0}")]
    Capture(String),

    /// The rendering surface rejected or failed a capability call.
    #[error("surface error: {0}")]
    Surface(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (bad file name, empty upload, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InsightError>;

impl InsightError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the backend was unreachable (as opposed to answering badly).
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// The single string shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => BACKEND_OFFLINE_MESSAGE.to_string(),
            Self::Timeout(_) => BACKEND_TIMEOUT_MESSAGE.to_string(),
            Self::Http {
                detail: Some(detail),
                ..
            } if !detail.trim().is_empty() => detail.clone(),
            Self::Http { status, .. } => status_message(*status),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

fn status_message(status: u16) -> String {
    match status {
        400 => "The request was rejected by the backend (400).".to_string(),
        404 => "Nothing relevant was found (404).".to_string(),
        413 => "The upload is too large (413).".to_string(),
        500..=599 => format!("The backend failed to process the request ({status})."),
        _ => format!("Request failed with status {status}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = InsightError::config("bad base_url");
        assert_eq!(err.to_string(), "config error: bad base_url");

        let err = InsightError::Http {
            status: 404,
            detail: Some("File not found in database.".into()),
        };
        assert_eq!(err.to_string(), "HTTP 404: File not found in database.");

        let err = InsightError::Http {
            status: 502,
            detail: None,
        };
        assert_eq!(err.to_string(), "HTTP 502");
    }

    #[test]
    fn transport_errors_read_as_offline() {
        let err = InsightError::Transport("connection refused".into());
        assert!(err.is_offline());
        assert_eq!(err.user_message(), BACKEND_OFFLINE_MESSAGE);
    }

    #[test]
    fn timeouts_are_not_offline() {
        let err = InsightError::Timeout("operation timed out".into());
        assert!(!err.is_offline());
        assert_eq!(err.user_message(), BACKEND_TIMEOUT_MESSAGE);
    }

    #[test]
    fn http_detail_preferred_over_status() {
        let err = InsightError::Http {
            status: 404,
            detail: Some("No relevant documents found.".into()),
        };
        assert_eq!(err.user_message(), "No relevant documents found.");

        let err = InsightError::Http {
            status: 503,
            detail: Some("   ".into()),
        };
        assert!(err.user_message().contains("503"));
    }

    #[test]
    fn decode_errors_are_generic() {
        let err = InsightError::decode("expected object");
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }
}
