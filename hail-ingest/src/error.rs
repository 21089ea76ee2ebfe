//! Ingestion error types.

use thiserror::Error;

/// Ingestion pipeline errors.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Kafka client construction, subscription, or publish failure.
    #[error("kafka error: {0}")]
    Kafka(String),

    /// Payload that is not valid JSON for the expected record.
    #[error("malformed message: {0}")]
    Decode(String),

    /// Payload that decoded but failed validation.
    #[error(transparent)]
    Validation(#[from] hail_core::ValidationError),

    /// Cell derivation failure (invalid coordinates reached keying).
    #[error(transparent)]
    Spatial(#[from] hail_spatial::SpatialError),

    /// The store-side enqueue failed; the offset must not be committed.
    #[error(transparent)]
    Store(#[from] hail_store::StoreError),
}

impl IngestError {
    /// Whether the message itself is at fault.
    ///
    /// Rejections are counted and their offset committed so one bad message
    /// cannot wedge a partition; transport/store errors instead leave the
    /// offset alone for redelivery.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            IngestError::Decode(_) | IngestError::Validation(_) | IngestError::Spatial(_)
        )
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
