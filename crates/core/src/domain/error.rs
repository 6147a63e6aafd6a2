// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid join state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
