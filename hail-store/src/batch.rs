//! Batched writer with bounded retry.
//!
//! Upserts are buffered into groups of up to 25 (the store's batch-write
//! limit). A group is flushed when it fills, or when `batch_interval` has
//! elapsed since its first enqueue. Flushes run concurrently with enqueues:
//! the mutex is held only to swap the buffer out, never across the wire.
//!
//! A flush submits the chunk, resubmits only the unprocessed residual, and
//! retries up to `max_retries` times with `backoff_base * 2^attempt` delays.
//! When the budget is exhausted the residual is counted as failed and
//! dropped; loss is observable through the counters but never blocks the
//! ingestion pipeline.

use crate::error::{Result, StoreError};
use crate::row::DriverRow;
use crate::store::BatchBackend;
use hail_core::PipelineMetrics;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Batched writer tuning knobs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Rows per submitted chunk; also the flush-on-full threshold.
    pub batch_size: usize,
    /// Timer-based flush delay measured from the first enqueue of a batch.
    pub batch_interval: Duration,
    /// Submission attempts per chunk before dropping the residual.
    pub max_retries: u32,
    /// Exponential backoff base between attempts.
    pub backoff_base: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            batch_size: 25,
            batch_interval: Duration::from_secs(1),
            max_retries: 10,
            backoff_base: Duration::from_millis(200),
        }
    }
}

#[derive(Default)]
struct Buffer {
    rows: Vec<DriverRow>,
    /// Bumped on every first-enqueue and detach; pending timers whose epoch
    /// no longer matches find nothing to do.
    epoch: u64,
    closed: bool,
}

struct Inner {
    backend: Arc<dyn BatchBackend>,
    config: BatchConfig,
    metrics: Arc<PipelineMetrics>,
    buffer: Mutex<Buffer>,
}

/// Buffering writer in front of a [`BatchBackend`].
#[derive(Clone)]
pub struct BatchWriter {
    inner: Arc<Inner>,
}

impl BatchWriter {
    pub fn new(
        backend: Arc<dyn BatchBackend>,
        config: BatchConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        BatchWriter {
            inner: Arc::new(Inner {
                backend,
                config,
                metrics,
                buffer: Mutex::new(Buffer::default()),
            }),
        }
    }

    /// Add one row to the current batch.
    ///
    /// Never blocks on the wire. Fails only after [`BatchWriter::shutdown`];
    /// callers treat that as "do not commit the offset".
    pub fn enqueue(&self, row: DriverRow) -> Result<()> {
        let full_chunk = {
            let mut buf = self.inner.buffer.lock().unwrap();
            if buf.closed {
                return Err(StoreError::Write("batch writer is shut down".to_string()));
            }
            buf.rows.push(row);
            if buf.rows.len() == 1 {
                buf.epoch += 1;
                self.spawn_flush_timer(buf.epoch);
            }
            if buf.rows.len() >= self.inner.config.batch_size {
                buf.epoch += 1;
                Some(std::mem::take(&mut buf.rows))
            } else {
                None
            }
        };

        if let Some(rows) = full_chunk {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                Inner::submit(inner, rows).await;
            });
        }
        Ok(())
    }

    /// Drain whatever is buffered and refuse further enqueues.
    pub async fn shutdown(&self) {
        let rows = {
            let mut buf = self.inner.buffer.lock().unwrap();
            buf.closed = true;
            buf.epoch += 1;
            std::mem::take(&mut buf.rows)
        };
        if !rows.is_empty() {
            Inner::submit(Arc::clone(&self.inner), rows).await;
        }
    }

    fn spawn_flush_timer(&self, epoch: u64) {
        let inner = Arc::clone(&self.inner);
        let interval = self.inner.config.batch_interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let rows = {
                let mut buf = inner.buffer.lock().unwrap();
                if buf.epoch != epoch || buf.rows.is_empty() {
                    Vec::new()
                } else {
                    buf.epoch += 1;
                    std::mem::take(&mut buf.rows)
                }
            };
            if !rows.is_empty() {
                Inner::submit(inner, rows).await;
            }
        });
    }
}

impl Inner {
    async fn submit(inner: Arc<Inner>, rows: Vec<DriverRow>) {
        debug!(rows = rows.len(), "flushing batch");
        for chunk in rows.chunks(inner.config.batch_size) {
            inner.submit_chunk(chunk.to_vec()).await;
        }
    }

    async fn submit_chunk(&self, mut remaining: Vec<DriverRow>) {
        for attempt in 1..=self.config.max_retries {
            PipelineMetrics::incr(&self.metrics.store_write_attempts);

            match self.backend.write_batch(remaining.clone()).await {
                Ok(unprocessed) => {
                    let written = remaining.len() - unprocessed.len();
                    PipelineMetrics::add(&self.metrics.store_write_successes, written as u64);
                    if unprocessed.is_empty() {
                        return;
                    }
                    warn!(
                        unprocessed = unprocessed.len(),
                        attempt, "batch left unprocessed items, retrying residual"
                    );
                    remaining = unprocessed;
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        attempt,
                        max = self.config.max_retries,
                        "batch write error"
                    );
                }
            }

            if attempt == self.config.max_retries {
                break;
            }
            tokio::time::sleep(self.config.backoff_base * 2u32.pow(attempt)).await;
        }

        PipelineMetrics::add(&self.metrics.store_write_failures, remaining.len() as u64);
        warn!(
            dropped = remaining.len(),
            "dropping rows after exhausting retry budget"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use hail_core::{unix_now, DriverStatus, DriverUpdate};
    use hail_spatial::CellTriple;

    fn row(i: usize) -> DriverRow {
        let update = DriverUpdate {
            driver_id: format!("driver-{i:03}"),
            city: "mumbai".to_string(),
            latitude: 19.076,
            longitude: 72.877,
            timestamp: unix_now(),
            vehicle_type: "STANDARD".to_string(),
            status: DriverStatus::Active,
        };
        let cells = CellTriple::for_coords(update.latitude, update.longitude).unwrap();
        DriverRow::new(&update, &cells)
    }

    fn writer(store: &Arc<MemoryStore>, config: BatchConfig) -> (BatchWriter, Arc<PipelineMetrics>) {
        let metrics = Arc::new(PipelineMetrics::new());
        (
            BatchWriter::new(store.clone(), config, metrics.clone()),
            metrics,
        )
    }

    #[tokio::test]
    async fn under_full_batch_does_not_flush_early() {
        let store = Arc::new(MemoryStore::new());
        let (writer, _) = writer(&store, BatchConfig {
            batch_interval: Duration::from_millis(200),
            ..BatchConfig::default()
        });

        for i in 0..24 {
            writer.enqueue(row(i)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.batches_written(), 0);
    }

    #[tokio::test]
    async fn full_batch_flushes_immediately() {
        let store = Arc::new(MemoryStore::new());
        let (writer, metrics) = writer(&store, BatchConfig {
            batch_interval: Duration::from_secs(60),
            ..BatchConfig::default()
        });

        for i in 0..25 {
            writer.enqueue(row(i)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.batches_written(), 1);
        assert_eq!(store.row_count(), 25);
        assert_eq!(metrics.snapshot().store_write_successes, 25);
    }

    #[tokio::test]
    async fn timer_flushes_partial_batch() {
        let store = Arc::new(MemoryStore::new());
        let (writer, _) = writer(&store, BatchConfig {
            batch_interval: Duration::from_millis(100),
            ..BatchConfig::default()
        });

        writer.enqueue(row(0)).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.batches_written(), 1);
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn unprocessed_residual_is_resubmitted() {
        let store = Arc::new(MemoryStore::new());
        store.plan_unprocessed(&[3]);
        let (writer, metrics) = writer(&store, BatchConfig {
            batch_interval: Duration::from_secs(60),
            backoff_base: Duration::from_millis(1),
            ..BatchConfig::default()
        });

        for i in 0..25 {
            writer.enqueue(row(i)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.batches_written(), 2);
        assert_eq!(store.row_count(), 25);
        let snap = metrics.snapshot();
        assert_eq!(snap.store_write_successes, 25);
        assert_eq!(snap.store_write_failures, 0);
        assert_eq!(snap.store_write_attempts, 2);
    }

    #[tokio::test]
    async fn persistent_failure_counts_and_drops() {
        let store = Arc::new(MemoryStore::new());
        store.set_reject_batches(true);
        let (writer, metrics) = writer(&store, BatchConfig {
            batch_interval: Duration::from_millis(10),
            max_retries: 3,
            backoff_base: Duration::from_millis(1),
            ..BatchConfig::default()
        });

        writer.enqueue(row(0)).unwrap();
        writer.enqueue(row(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let snap = metrics.snapshot();
        assert_eq!(snap.store_write_attempts, 3);
        assert_eq!(snap.store_write_failures, 2);
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_drains_buffer() {
        let store = Arc::new(MemoryStore::new());
        let (writer, _) = writer(&store, BatchConfig {
            batch_interval: Duration::from_secs(60),
            ..BatchConfig::default()
        });

        for i in 0..7 {
            writer.enqueue(row(i)).unwrap();
        }
        writer.shutdown().await;
        assert_eq!(store.row_count(), 7);
        assert!(writer.enqueue(row(99)).is_err());
    }
}
