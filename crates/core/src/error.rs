// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// Job failures never show up here: they are absorbed by the queue and end in
/// the dead-letter sink. These variants cover misuse of the queue API itself.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Retry(#[from] crate::application::RetryError),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
