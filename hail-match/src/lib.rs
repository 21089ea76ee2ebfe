//! Widening-search driver matching engine.
//!
//! Given an enriched ride request, the engine escalates through six search
//! steps (exact resolution-9 cell, its ring, then the same pair at
//! resolutions 8 and 7), stopping as soon as enough candidates accumulate.
//! Candidates are deduplicated by driver id, scored, ranked ascending, and
//! truncated to the configured minimum-drivers target.

pub mod engine;
pub mod error;
pub mod score;

pub use engine::{MatchConfig, MatchEngine, MatchOutcome};
pub use error::{MatchError, Result};
