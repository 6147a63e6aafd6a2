// Central Error Type for the Application

use crate::domain::Backend;
use thiserror::Error;

/// Application-level error type
///
/// Every variant except `Domain` is fatal to a join/configure run; the
/// verification engine never produces one of these.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{backend} installation failed: {reason}")]
    Install { backend: Backend, reason: String },

    #[error("{backend} domain join failed: {reason}")]
    Join { backend: Backend, reason: String },

    #[error("Post-join configuration failed: {0}")]
    Configure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Execution error: {0}")]
    Execution(#[from] crate::port::ExecutionError),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Whether the error happened before any host state was touched
    pub fn is_precondition(&self) -> bool {
        matches!(self, AppError::Precondition(_) | AppError::Config(_))
    }
}
