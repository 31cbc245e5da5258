//! Shared error types for the crate

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sigwrap operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed merge input, invalid signature, or reserved registration.
    /// Always raised eagerly at decoration/registration time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Insufficient, surplus, or misrouted arguments at call time
    #[error("Arity error calling `{function}`: {message}")]
    Arity { function: String, message: String },

    /// A registered ignore rule no longer matches its source line
    #[error("Stale rule for {module}:{line}: expected `{expected}`, found `{found}` in {file}")]
    StaleRule {
        module: String,
        file: PathBuf,
        line: u32,
        expected: String,
        found: String,
    },

    /// A stack walk ran past the root frame looking for a non-ignored ancestor
    #[error("Stack exhausted: {0}")]
    StackExhausted(String),

    /// Value validation failures, one message per failed checker
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Generic errors with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },

    /// Wrapped external errors
    #[error(transparent)]
    External(#[from] anyhow::Error),

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an arity error naming the function being called
    pub fn arity(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Arity {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            message: self.to_string(),
        }
    }

    /// Whether this error came out of call-time argument binding
    pub fn is_arity(&self) -> bool {
        matches!(self, Self::Arity { .. })
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}
