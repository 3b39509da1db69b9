//! Error types for checkin-tracker

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid username or password")]
    InvalidCredential,

    #[error("Admin credential required")]
    Unauthorized,

    #[error("Already checked in: {0}")]
    Conflict(String),

    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Store unavailable: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    /// Stable machine-readable code, carried in HTTP error bodies so the
    /// remote store can rebuild the variant on the client side.
    pub fn code(&self) -> &'static str {
        match self {
            TrackerError::InvalidCredential => "invalid_credential",
            TrackerError::Unauthorized => "unauthorized",
            TrackerError::Conflict(_) => "conflict",
            TrackerError::AlreadyExists(_) => "already_exists",
            TrackerError::NotFound(_) => "not_found",
            TrackerError::InvalidInput(_) => "invalid_input",
            TrackerError::Transaction(_) => "transaction_failed",
            TrackerError::Transient(_) => "unavailable",
            TrackerError::Database(_) => "database",
            TrackerError::Io(_) => "io",
            TrackerError::Json(_) => "json",
            TrackerError::Config(_) => "config",
            TrackerError::Internal(_) => "internal",
        }
    }

    /// Rebuild an error from a code and message received over the wire.
    pub fn from_code(code: &str, message: String) -> Self {
        match code {
            "invalid_credential" => TrackerError::InvalidCredential,
            "unauthorized" => TrackerError::Unauthorized,
            "conflict" => TrackerError::Conflict(message),
            "already_exists" => TrackerError::AlreadyExists(message),
            "not_found" => TrackerError::NotFound(message),
            "invalid_input" => TrackerError::InvalidInput(message),
            "transaction_failed" => TrackerError::Transaction(message),
            "unavailable" => TrackerError::Transient(message),
            "database" => TrackerError::Database(message),
            "config" => TrackerError::Config(message),
            _ => TrackerError::Internal(message),
        }
    }

    /// Message safe to show an end user. Storage internals stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            TrackerError::Transaction(_) => {
                "The operation failed and no changes were made".to_string()
            }
            TrackerError::Transient(_) => {
                "The data store is temporarily unavailable, please retry".to_string()
            }
            TrackerError::Database(_)
            | TrackerError::Io(_)
            | TrackerError::Json(_)
            | TrackerError::Config(_)
            | TrackerError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether reissuing the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrackerError::Transient(_))
    }
}
