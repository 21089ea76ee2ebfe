//! Error types for cell derivation.

use thiserror::Error;

/// Spatial primitive errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpatialError {
    /// Latitude/longitude outside the valid WGS84 ranges.
    #[error("invalid coordinates: lat={lat}, lng={lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },

    /// A cell string that does not parse as an H3 index.
    #[error("invalid cell index: {0}")]
    InvalidCell(String),
}

/// Result type for spatial operations.
pub type Result<T> = std::result::Result<T, SpatialError>;
