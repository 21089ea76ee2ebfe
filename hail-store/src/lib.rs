//! Sharded, spatially indexed driver location store.
//!
//! A wide-row keyed store with one composite primary key and three
//! status-scoped secondary indexes; the key layout (see [`schema`]) is what
//! the matching engine's widening search queries, so ingestion keying and
//! query-side key construction live together here.
//!
//! Two backends implement the same traits: [`DynamoStore`] against DynamoDB
//! and [`MemoryStore`] for tests and local development. Writes normally go
//! through the [`BatchWriter`], which coalesces upserts and absorbs
//! transient store failures without blocking ingestion.

pub mod batch;
pub mod dynamo;
pub mod error;
pub mod memory;
pub mod row;
pub mod schema;
pub mod store;

pub use batch::{BatchConfig, BatchWriter};
pub use dynamo::{DynamoConfig, DynamoStore};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use row::{driver_suffix, parse_sort_key, status_cell_key, DriverRow};
pub use store::{BatchBackend, CellScan, LocationStore};
