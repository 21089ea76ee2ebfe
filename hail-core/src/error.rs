//! Boundary validation errors.

use thiserror::Error;

/// Rejection reasons for ingress messages.
///
/// These surface at the ingestion boundary: the message is counted, logged,
/// and its offset committed, but it never reaches keying or matching.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required string field was empty or missing.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Latitude outside [-90, 90].
    #[error("latitude must be between -90 and 90")]
    LatitudeOutOfRange,

    /// Longitude outside [-180, 180].
    #[error("longitude must be between -180 and 180")]
    LongitudeOutOfRange,
}
