//! Driver location consumer.

use crate::error::{IngestError, Result};
use crate::kafka::{consumer, ClusterConfig};
use hail_core::{unix_now, DriverUpdate, PipelineMetrics};
use hail_spatial::CellTriple;
use hail_store::{BatchWriter, DriverRow};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Poll deadline; also the shutdown reaction latency.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Decode and validate one location payload into its keyed store row.
pub fn decode_update(payload: &[u8], now: i64) -> Result<(DriverUpdate, DriverRow)> {
    let mut update: DriverUpdate =
        serde_json::from_slice(payload).map_err(|e| IngestError::Decode(e.to_string()))?;
    update.validate(now)?;
    let cells = CellTriple::for_coords(update.latitude, update.longitude)?;
    let row = DriverRow::new(&update, &cells);
    Ok((update, row))
}

/// One city's driver-location consumer.
///
/// Reads the city's `-locations` topic, enriches each update with its cell
/// triple, and enqueues the row into the batched writer. Offsets commit
/// after a successful enqueue, or immediately for rejected messages.
pub struct LocationConsumer {
    cluster: ClusterConfig,
    consumer: StreamConsumer,
    writer: BatchWriter,
    metrics: Arc<PipelineMetrics>,
    shutdown: watch::Receiver<bool>,
}

impl LocationConsumer {
    pub fn new(
        cluster: ClusterConfig,
        group_id: &str,
        writer: BatchWriter,
        metrics: Arc<PipelineMetrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let consumer = consumer(&cluster, group_id)?;
        Ok(LocationConsumer {
            cluster,
            consumer,
            writer,
            metrics,
            shutdown,
        })
    }

    /// Consume until the shutdown signal flips.
    pub async fn run(self) {
        info!(city = %self.cluster.name, "location consumer started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            let message = match tokio::time::timeout(POLL_TIMEOUT, self.consumer.recv()).await {
                Ok(Ok(message)) => message,
                Ok(Err(err)) => {
                    warn!(city = %self.cluster.name, error = %err, "consumer error");
                    continue;
                }
                // Poll deadline: loop around and re-check shutdown.
                Err(_) => continue,
            };

            PipelineMetrics::incr(&self.metrics.messages_received);
            let Some(payload) = message.payload() else {
                PipelineMetrics::incr(&self.metrics.messages_failed);
                self.commit(&message);
                continue;
            };

            match decode_update(payload, unix_now()) {
                Ok((update, row)) => match self.writer.enqueue(row) {
                    Ok(()) => {
                        PipelineMetrics::incr(&self.metrics.messages_processed);
                        tracing::debug!(
                            city = %self.cluster.name,
                            driver_id = %update.driver_id,
                            offset = message.offset(),
                            "update enqueued"
                        );
                        self.commit(&message);
                    }
                    Err(err) => {
                        // Leave the offset alone; the message is redelivered.
                        warn!(city = %self.cluster.name, error = %err, "enqueue failed");
                    }
                },
                Err(err) if err.is_rejection() => {
                    PipelineMetrics::incr(&self.metrics.messages_failed);
                    warn!(city = %self.cluster.name, error = %err, "rejecting message");
                    self.commit(&message);
                }
                Err(err) => {
                    warn!(city = %self.cluster.name, error = %err, "message handling failed");
                }
            }
        }
        info!(city = %self.cluster.name, "location consumer stopped");
    }

    fn commit(&self, message: &rdkafka::message::BorrowedMessage<'_>) {
        if let Err(err) = self.consumer.commit_message(message, CommitMode::Async) {
            warn!(city = %self.cluster.name, error = %err, "offset commit failed");
        }
    }
}
