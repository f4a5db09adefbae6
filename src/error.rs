use thiserror::Error;

/// Main error type for the training pipeline
#[derive(Error, Debug)]
pub enum RecoError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Batch/field errors
    #[error("Unknown batch field: {0}")]
    MissingField(String),

    // Training state errors
    #[error("No best parameters captured: no validation metric was ever observed")]
    NoBestParameters,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RecoError
pub type Result<T> = std::result::Result<T, RecoError>;
