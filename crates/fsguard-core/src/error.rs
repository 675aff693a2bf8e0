//! Error types for fsguard-core
//!
//! Filesystem operations run through the engine never produce these: their
//! own error type is handed back unchanged. This enum covers configuration
//! loading and the admission machinery itself.

use thiserror::Error;

/// Result type alias using fsguard-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for fsguard
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A managed task was dropped before it could report a result
    ///
    /// Happens when the task panics, when the runtime shuts down underneath
    /// it, or when it was submitted outside of a Tokio runtime.
    #[error("managed task aborted before settling")]
    TaskAborted,
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(io) => io,
            other => std::io::Error::other(other),
        }
    }
}
