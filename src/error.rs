// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// AWS S3 error
    #[error("S3 error: {0}")]
    S3(String),

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

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rendering or sending a notification failed
    #[error("Notify error: {0}")]
    Notify(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a notification error.
    pub fn notify(message: impl fmt::Display) -> Self {
        Self::Notify(message.to_string())
    }
}

/// Failure of a single poll cycle.
///
/// Every variant aborts the cycle and surfaces as a 500 from `/poll`.
/// Notification failures never appear here.
#[derive(Error, Debug)]
pub enum PollError {
    /// Network failure or non-success status while fetching the listing
    #[error("fetch failed: {0}")]
    Fetch(#[source] AppError),

    /// The listing could not be scanned
    #[error("parse failed: {0}")]
    Parse(#[source] AppError),

    /// A claim transaction failed
    #[error("storage failed: {0}")]
    Storage(#[source] AppError),
}

impl PollError {
    /// Short description returned as the HTTP error body.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "Error fetching page",
            Self::Parse(_) => "Error parsing page",
            Self::Storage(_) => "Error storing link",
        }
    }
}
