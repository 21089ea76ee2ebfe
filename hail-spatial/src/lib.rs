//! Hexagonal cell primitives.
//!
//! Every driver position and ride request maps to a triple of H3 cells at
//! three nested resolutions (fine 9, medium 8, coarse 7). The cell strings
//! are the authoritative spatial keys; the 5-character prefix derived from
//! them is a sharding device only and never feeds geometric decisions.
//!
//! # Cell hierarchy
//!
//! | Resolution | Approx. area | Role |
//! |------------|--------------|------|
//! | 9          | 0.1 km²      | exact-cell match |
//! | 8          | 0.7 km²      | first widening tier |
//! | 7          | 5 km²        | final widening tier |
//!
//! A resolution-9 cell is strictly contained in its resolution-8 parent,
//! which is strictly contained in its resolution-7 parent, so climbing the
//! triple widens the search area monotonically.

pub mod cell;
pub mod error;

pub use cell::{neighbors, shard_prefix, CellTriple, RESOLUTIONS};
pub use error::{Result, SpatialError};
