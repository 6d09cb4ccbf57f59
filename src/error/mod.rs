//! Error types for aiquery.

use thiserror::Error;

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Timeout,
    Server,
    RateLimit,
    Authentication,
    Api,
    Configuration,
    Serialization,
    Plugin,
    Unknown,
}

/// Primary error type for all query operations.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Plugin error: {name}: {message}")]
    Plugin { name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl QueryError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a plugin failure for the named function.
    pub fn plugin(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) | Self::Stream(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Configuration(_) | Self::ConfigParse(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Plugin { .. } => ErrorCategory::Plugin,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                408 => ErrorCategory::Timeout,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, QueryError>;
