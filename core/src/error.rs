//! Core error types

use thiserror::Error;

/// Failures raised by an Identity Store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Domain failures surfaced by poll creation, reads and vote casting.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Poll not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage failure: {0}")]
    Storage(#[source] StoreError),

    #[error("Aggregation failure: {0}")]
    Aggregation(#[source] StoreError),
}

impl PollError {
    /// Short machine-checkable reason string.
    pub fn reason(&self) -> &'static str {
        match self {
            PollError::InvalidArgument(_) => "invalid_argument",
            PollError::NotFound(_) => "not_found",
            PollError::Forbidden(_) => "already_voted",
            PollError::Storage(_) => "storage_failure",
            PollError::Aggregation(_) => "aggregation_failure",
        }
    }
}

impl From<StoreError> for PollError {
    fn from(e: StoreError) -> Self {
        PollError::Storage(e)
    }
}

pub type PollResult<T> = std::result::Result<T, PollError>;
