//! Store error types.

use thiserror::Error;

/// Driver location store errors.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Could not build or reach the store client.
    #[error("store connection error: {0}")]
    Connection(String),

    /// A read (query) failed.
    #[error("store query failed: {0}")]
    Query(String),

    /// A write (put / batch submit) failed; retried by the batch writer.
    #[error("store write failed: {0}")]
    Write(String),

    /// A stored item that cannot be decoded back into a row.
    #[error("invalid stored row: {0}")]
    InvalidRow(String),

    /// Table bootstrap failure (create / wait-for-active).
    #[error("table bootstrap failed: {0}")]
    Bootstrap(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
