//! Store traits shared by the DynamoDB and in-memory backends.

use crate::error::{Result, StoreError};
use crate::row::DriverRow;
use async_trait::async_trait;
use hail_core::DriverStatus;

/// Result of a fan-out query over several cell prefixes.
///
/// Partial failures ride alongside partial results; callers decide whether
/// the rows they did get are enough to proceed.
#[derive(Debug, Default)]
pub struct CellScan {
    pub rows: Vec<DriverRow>,
    /// (prefix, error) per failed cell query.
    pub failures: Vec<(String, StoreError)>,
}

impl CellScan {
    /// True when every per-prefix query failed.
    pub fn all_failed(&self) -> bool {
        self.rows.is_empty() && !self.failures.is_empty()
    }
}

/// Read/write access to the driver location table.
///
/// `upsert` is idempotent for identical payloads and overwrites the previous
/// row for the same driver id and status. Because status is embedded in every
/// key form, a status transition leaves the old-status row addressable until
/// its TTL elapses; `query_cell` therefore filters by status, not by driver.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Write one driver row.
    async fn upsert(&self, row: &DriverRow) -> Result<()>;

    /// All currently visible rows for (resolution, prefix, status).
    ///
    /// Unordered; may contain rows older than the freshness window.
    async fn query_cell(&self, res: u8, prefix: &str, status: DriverStatus)
        -> Result<Vec<DriverRow>>;

    /// Concurrent per-prefix fan-out of [`LocationStore::query_cell`].
    async fn query_cells(&self, res: u8, prefixes: &[String], status: DriverStatus) -> CellScan {
        let mut scan = CellScan::default();
        let queries = prefixes.iter().map(|p| async move {
            (p.clone(), self.query_cell(res, p, status).await)
        });
        for (prefix, result) in futures::future::join_all(queries).await {
            match result {
                Ok(rows) => scan.rows.extend(rows),
                Err(err) => scan.failures.push((prefix, err)),
            }
        }
        scan
    }
}

/// Batch submission backend used by the batched writer.
///
/// Returns the rows the backend reported as unprocessed; the writer
/// resubmits only that residual.
#[async_trait]
pub trait BatchBackend: Send + Sync {
    async fn write_batch(&self, rows: Vec<DriverRow>) -> Result<Vec<DriverRow>>;
}
