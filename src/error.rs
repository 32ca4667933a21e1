//! Error types for the LXD storage reconciler
//!
//! Provides structured error types for validation, the LXD API, the
//! transport underneath it, and configuration loading.

use thiserror::Error;

/// Unified error type for the reconciler
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("driver is required when creating a storage pool (pool: {pool})")]
    DriverRequired { pool: String },

    #[error(
        "storage volume {volume} is located on {current} but target is {requested}; \
         set allow_migrate=true to migrate it"
    )]
    MigrationNotAllowed {
        volume: String,
        current: String,
        requested: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    // =========================================================================
    // LXD API Errors
    // =========================================================================
    #[error("{message}")]
    Api { status_code: u16, message: String },

    #[error("{0}")]
    OperationFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unix socket request failed: {0}")]
    Hyper(#[from] hyper::Error),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Manifest parse error: {0}")]
    ManifestParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Broad category of an error, used when deciding how to report it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any mutating call
    Validation,
    /// The LXD server answered with an error
    Api,
    /// The request never produced an LXD response
    Transport,
    /// Local configuration or manifest problem
    Configuration,
}

impl Error {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::DriverRequired { .. }
            | Error::MigrationNotAllowed { .. }
            | Error::Validation(_) => ErrorCategory::Validation,

            Error::Api { .. } | Error::OperationFailed(_) => ErrorCategory::Api,

            Error::Transport(_) | Error::Http(_) | Error::Hyper(_) => ErrorCategory::Transport,

            Error::Configuration(_)
            | Error::ManifestParse(_)
            | Error::JsonParse(_) => ErrorCategory::Configuration,
        }
    }

    /// Check if this error was raised by local validation
    pub fn is_validation(&self) -> bool {
        matches!(self.category(), ErrorCategory::Validation)
    }

    /// Status code reported by the server, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// Result type alias for the reconciler
pub type Result<T> = std::result::Result<T, Error>;
