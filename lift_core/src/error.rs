//! Error types for the lift_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lift_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Seed or stored data is inconsistent (missing definition, progression
    /// state or set scheme). Never defaulted away.
    #[error("Data integrity error: {0}")]
    Integrity(String),

    /// The requested operation is not allowed in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// User input rejected before any mutation
    #[error("Invalid input: {0}")]
    Validation(String),
}

impl Error {
    /// Whether a front end should surface this as a message rather than abort
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Error::InvalidOperation(_) | Error::NotFound(_) | Error::Validation(_)
        )
    }
}
