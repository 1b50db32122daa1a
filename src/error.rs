//! Error Types
//!
//! Config validation and model snapshot failures surfaced to the host.

use thiserror::Error;

/// Failures at the host boundary. Scheduling math itself never errors.
#[derive(Debug, Error)]
pub enum SrsError {
    #[error("dimension mismatch for {field}: expected {expected}, got {actual}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("non-finite value in {field}")]
    NonFiniteState { field: &'static str },
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type SrsResult<T> = Result<T, SrsError>;
