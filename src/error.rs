//! Error handling for the station monitor
//!
//! This module defines custom error types and a Result alias for use
//! throughout the application.

use thiserror::Error;

/// Main error type for station monitor operations
#[derive(Error, Debug)]
pub enum DashError {
    /// Transport-level HTTP failures (connection refused, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// A row returned by the backend did not match the expected record shape
    #[error("Malformed row in '{table}': {reason}")]
    MalformedRow { table: String, reason: String },

    /// A form draft is missing a required field
    #[error("Missing required field: {0}")]
    Validation(&'static str),

    /// Identity service errors (sign in, admin user creation)
    #[error("Auth error: {0}")]
    Auth(String),

    /// Change feed errors
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DashError>,
    },
}

impl DashError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DashError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a malformed-row error from a serde failure
    pub fn malformed(table: &str, err: serde_json::Error) -> Self {
        DashError::MalformedRow {
            table: table.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DashError {
    fn from(err: serde_json::Error) -> Self {
        DashError::Serialization(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DashError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        DashError::Realtime(err.to_string())
    }
}

/// Result type alias for station monitor operations
pub type Result<T> = std::result::Result<T, DashError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DashError::Validation("name");
        assert_eq!(err.to_string(), "Missing required field: name");
    }

    #[test]
    fn test_error_with_context() {
        let err = DashError::Auth("invalid grant".to_string());
        let with_ctx = err.with_context("Failed to sign in");
        assert!(with_ctx.to_string().contains("Failed to sign in"));
        assert!(with_ctx.to_string().contains("invalid grant"));
    }

    #[test]
    fn test_backend_error() {
        let err = DashError::Backend {
            status: 409,
            message: "duplicate key value".to_string(),
        };
        assert!(err.to_string().contains("409"));
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn test_result_ext_context() {
        let res: Result<()> = Err(DashError::Channel("closed".to_string()));
        let err = res.context("Sending command").unwrap_err();
        assert_eq!(err.to_string(), "Sending command: Channel error: closed");
    }
}
