//! Matching engine errors.

use thiserror::Error;

/// Matching failures.
///
/// `QueryFailed` is distinct from an empty candidate set: it means the store
/// answered nothing at all, so "no drivers available" would be a lie.
#[derive(Error, Debug)]
pub enum MatchError {
    /// The request's coordinates or cells could not be processed.
    #[error(transparent)]
    Spatial(#[from] hail_spatial::SpatialError),

    /// Every cell query of every executed step failed.
    #[error("all {failed_cells} cell queries failed")]
    QueryFailed { failed_cells: usize },
}

/// Result type for matching operations.
pub type Result<T> = std::result::Result<T, MatchError>;
