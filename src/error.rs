//! Error handling for the post-install runner
//!
//! Provides the crate-wide error type using thiserror. Operator input errors
//! and configuration errors surface through these types; process execution
//! failures never do (they become the `-1` sentinel in `runner`).

use thiserror::Error;

/// Main error type for the post-install runner
#[derive(Error, Debug)]
pub enum SetupError {
    /// IO errors (operator streams, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (missing resources, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON deserialization errors from `settings.json`
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The exclusion expression did not match the selection grammar
    #[error("Invalid selection: {input:?}")]
    InvalidSelection { input: String },

    /// The operator input stream ended while an answer was required
    #[error("Input closed before an answer was read")]
    InputClosed,
}

/// Result type alias for setup operations
pub type Result<T> = std::result::Result<T, SetupError>;

impl SetupError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid selection error naming the rejected input
    pub fn invalid_selection(input: impl Into<String>) -> Self {
        Self::InvalidSelection {
            input: input.into(),
        }
    }
}
