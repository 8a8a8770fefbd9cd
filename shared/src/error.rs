use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Failure taxonomy shared by the store, the mutation path and the HTTP layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
}

impl PollError {
    pub fn poll_not_found(id: &str) -> Self {
        PollError::NotFound(format!("poll {}", id))
    }

    pub fn option_not_found(id: &str) -> Self {
        PollError::NotFound(format!("option {}", id))
    }
}

pub type Result<T> = std::result::Result<T, PollError>;
