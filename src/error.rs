// src/error.rs

//! Unified error handling for the sync engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for engine operations.
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

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A persistence collaborator rejected a read or write
    #[error("Storage error on {entity}: {message}")]
    Storage { entity: String, message: String },

    /// The portal refused the user's credentials
    #[error("Authentication failed for {registration}: {message}")]
    Auth {
        registration: String,
        message: String,
    },

    /// Scraping a portal page failed
    #[error("Scrape error for {context}: {message}")]
    Scrape { context: String, message: String },

    /// A single delivery attempt to the messaging provider failed
    #[error("Delivery to {recipient} failed: {message}")]
    Delivery { recipient: String, message: String },

    /// A snapshot collection was never loaded; the cycle cannot run
    #[error("Snapshot inconsistent: {} not loaded", missing.join(", "))]
    SnapshotInconsistent { missing: Vec<&'static str> },
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

    /// Create a storage error for the named entity collection.
    pub fn storage(entity: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Storage {
            entity: entity.into(),
            message: message.to_string(),
        }
    }

    /// Create an authentication error.
    pub fn auth(registration: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Auth {
            registration: registration.into(),
            message: message.to_string(),
        }
    }

    /// Create a scrape error with context.
    pub fn scrape(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Scrape {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a delivery error.
    pub fn delivery(recipient: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Delivery {
            recipient: recipient.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error must escape the cycle entry point.
    pub fn is_snapshot_inconsistent(&self) -> bool {
        matches!(self, Self::SnapshotInconsistent { .. })
    }
}
