//! Error types for session lifecycle operations.

use std::time::Duration;

/// Error type for session lifecycle operations.
///
/// Unknown session IDs are deliberately absent: disconnects and touches for
/// IDs the manager no longer holds race with eviction and are ignored.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session ID was empty or blank.
    #[error("Invalid session ID: {0:?}")]
    InvalidSessionId(String),

    /// The manager configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A settings document could not be parsed.
    #[error("Config parse error: {0}")]
    Config(String),

    /// The manager was constructed outside a Tokio runtime.
    #[error("No Tokio runtime available to run the cleanup scheduler")]
    NoRuntime,

    /// The cleanup scheduler did not stop before the deadline.
    #[error("Cleanup scheduler did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Result type for session lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;
