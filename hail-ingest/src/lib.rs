//! Per-city Kafka ingestion.
//!
//! One consumer task per city reads that city's log. Location updates are
//! validated, enriched with their cell triple, and enqueued into the store's
//! batched writer; ride requests are staleness-checked and handed to the
//! matching pipeline through a bounded worker pool.
//!
//! Delivery is at-least-once: offsets are committed only after a message has
//! been handed off (or definitively rejected), and replayed driver updates
//! land as idempotent overwrites. A stall in one city's consumer never
//! affects the others.

pub mod error;
pub mod kafka;
pub mod location;
pub mod requests;

pub use error::{IngestError, Result};
pub use kafka::{ClusterConfig, LocationProducer};
pub use location::{decode_update, LocationConsumer};
pub use requests::{decode_request, RequestConsumer, RequestDispatcher, RequestHandler};
