//! Error types for the copychain generation engine.

use thiserror::Error;

/// Project document storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Project document not found: {0}")]
    DocumentNotFound(std::path::PathBuf),

    #[error("Invalid project document: {0}")]
    InvalidDocument(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced by the gateway, the stream parser, and the orchestrator
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid session credential; the network call is never attempted.
    #[error("Login required")]
    Unauthenticated,

    #[error("Request rejected ({status}): {message}")]
    RequestRejected { status: u16, message: String },

    #[error("Response stream unavailable")]
    StreamUnavailable,

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Malformed stream record: {0}")]
    MalformedRecord(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Step index out of range: {0}")]
    StepIndexOutOfRange(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl ApiError {
    /// User aborts are never reported as failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Text shown inline in place of the streaming buffer.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthenticated => "Login required".to_string(),
            ApiError::RequestRejected { message, .. } => format!("Error: {}", message),
            other => format!("Error: {}", other),
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::InvalidDocument(err.to_string())
    }
}
