//! Error types for txretry
//!
//! Errors produced by the retry layer itself (configuration and setup).
//! Errors raised by wrapped operations are never converted into these; they
//! pass through the coordinator untouched.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for txretry setup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the retry layer
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading or writing a config file
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Config file could not be parsed
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    /// Config parsed but holds an invalid value
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Process-wide defaults were already installed
    #[error("Retry defaults are already installed")]
    DefaultsAlreadyInstalled,
}

impl Error {
    /// Build an [`Error::Io`] for `path`
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an [`Error::InvalidConfig`]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig(message.into())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ConfigParse(e.to_string())
    }
}
