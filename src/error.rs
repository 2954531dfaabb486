// src/error.rs

//! Unified error handling for the quake relay.

use std::fmt;

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration value out of range
    #[error("Validation error: {0}")]
    Validation(String),

    /// Feed answered with a non-success status
    #[error("Feed returned HTTP {status} for {url}")]
    FeedStatus { status: u16, url: String },

    /// Feed payload could not be used
    #[error("Feed error: {0}")]
    Feed(String),

    /// Datagram could not be sent
    #[error("Broadcast error for {destination}: {message}")]
    Broadcast {
        destination: String,
        message: String,
    },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a feed error.
    pub fn feed(message: impl Into<String>) -> Self {
        Self::Feed(message.into())
    }

    /// Create a broadcast error with its destination.
    pub fn broadcast(destination: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Broadcast {
            destination: destination.into(),
            message: message.to_string(),
        }
    }

    /// True for errors raised while loading or validating configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Validation(_) | Self::Toml(_) | Self::Url(_)
        )
    }
}
