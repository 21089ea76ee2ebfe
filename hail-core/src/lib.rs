//! Core domain model for the hail dispatch platform.
//!
//! Everything that crosses a component boundary lives here: driver location
//! updates and ride requests as they arrive on the wire, match results and
//! ride offers as they leave, plus the shared pipeline counters.
//!
//! Ingress types carry their own validation; a message that fails
//! [`DriverUpdate::validate`] or [`RideRequest::validate`] is rejected at the
//! boundary and never reaches keying or matching.

pub mod error;
pub mod metrics;
pub mod model;
pub mod time;

pub use error::ValidationError;
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use model::{
    ConnectionStatus, DriverOffer, DriverStatus, DriverUpdate, MatchResult, MatchStatus,
    MatchedDriver, OfferDecision, OfferResponse, RideRequest,
};
pub use time::unix_now;
