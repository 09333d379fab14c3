pub mod analytics;
pub mod car;
pub mod client;
pub mod conversation;
pub mod format;
pub mod interaction;
pub mod inventory;
pub mod repository;
pub mod search;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Error type returned by every repository and session backend.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;
