//! Error types for the separation layer.

use thiserror::Error;

/// Errors that can occur while staging, pooling or scoring cuts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SepaError {
    /// Operation called in a solving stage that does not support it.
    #[error("Invalid call: {0}")]
    InvalidCall(String),

    /// Row data is malformed (empty, both sides infinite, NaN, ...).
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// The row is not stored in the pool it should be removed from.
    #[error("Row {0} is not in the cut pool")]
    RowNotInPool(u64),

    /// A dive was requested while another one is still open.
    #[error("Relaxation is already in dive mode")]
    DiveActive,

    /// The relaxation backend reported a failure.
    #[error("Relaxation error: {0}")]
    Relaxation(String),

    /// The conflict analyzer reported a failure.
    #[error("Conflict analysis failed: {0}")]
    Conflict(String),
}

/// Result type for separation operations.
pub type SepaResult<T> = Result<T, SepaError>;
