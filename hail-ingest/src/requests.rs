//! Ride request consumer and bounded match worker pool.

use crate::error::{IngestError, Result};
use crate::kafka::{consumer, ClusterConfig};
use async_trait::async_trait;
use hail_core::{unix_now, PipelineMetrics, RideRequest};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};

/// Poll deadline; also the shutdown reaction latency.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Requests older than this are dropped without a match attempt.
pub const MAX_REQUEST_AGE_SECS: i64 = 300;

/// Decode and validate one ride request payload.
pub fn decode_request(payload: &[u8], now: i64) -> Result<RideRequest> {
    let mut request: RideRequest =
        serde_json::from_slice(payload).map_err(|e| IngestError::Decode(e.to_string()))?;
    request.validate(now)?;
    Ok(request)
}

/// Downstream match pipeline invoked for each fresh request.
///
/// Implementations are best-effort: they log their own failures and always
/// produce *something* for the user, so the consumer can commit after
/// handoff.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: RideRequest);
}

/// Bounded hand-off into the match pipeline.
///
/// At most `permits` matches run concurrently; when the pool is exhausted
/// the dispatch call waits, which in turn holds back the consumer loop and
/// its offset commits. One slow match cannot starve the partition beyond
/// the pool bound.
#[derive(Clone)]
pub struct RequestDispatcher {
    handler: Arc<dyn RequestHandler>,
    pool: Arc<Semaphore>,
}

impl RequestDispatcher {
    pub fn new(handler: Arc<dyn RequestHandler>, permits: usize) -> Self {
        RequestDispatcher {
            handler,
            pool: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Wait for a pool slot, then run the handler in its own task.
    ///
    /// Returns once the request is handed off (not when it completes).
    pub async fn dispatch(&self, request: RideRequest) {
        let permit = self
            .pool
            .clone()
            .acquire_owned()
            .await
            .expect("match pool semaphore closed");
        let handler = self.handler.clone();
        tokio::spawn(async move {
            handler.handle(request).await;
            drop(permit);
        });
    }
}

/// One city's ride-request consumer.
pub struct RequestConsumer {
    cluster: ClusterConfig,
    consumer: StreamConsumer,
    dispatcher: RequestDispatcher,
    metrics: Arc<PipelineMetrics>,
    shutdown: watch::Receiver<bool>,
}

impl RequestConsumer {
    pub fn new(
        cluster: ClusterConfig,
        group_id: &str,
        dispatcher: RequestDispatcher,
        metrics: Arc<PipelineMetrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let consumer = consumer(&cluster, group_id)?;
        Ok(RequestConsumer {
            cluster,
            consumer,
            dispatcher,
            metrics,
            shutdown,
        })
    }

    /// Consume until the shutdown signal flips.
    pub async fn run(self) {
        info!(city = %self.cluster.name, "request consumer started");
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
                Err(_) => continue,
            };

            PipelineMetrics::incr(&self.metrics.requests_received);
            let Some(payload) = message.payload() else {
                self.commit(&message);
                continue;
            };

            let now = unix_now();
            match decode_request(payload, now) {
                Ok(request) if request.is_stale(now, MAX_REQUEST_AGE_SECS) => {
                    PipelineMetrics::incr(&self.metrics.requests_stale);
                    info!(
                        city = %self.cluster.name,
                        user_id = %request.user_id,
                        age_secs = now - request.timestamp,
                        "dropping stale request"
                    );
                    self.commit(&message);
                }
                Ok(request) => {
                    self.dispatcher.dispatch(request).await;
                    self.commit(&message);
                }
                Err(err) => {
                    warn!(city = %self.cluster.name, error = %err, "rejecting request");
                    self.commit(&message);
                }
            }
        }
        info!(city = %self.cluster.name, "request consumer stopped");
    }

    fn commit(&self, message: &rdkafka::message::BorrowedMessage<'_>) {
        if let Err(err) = self.consumer.commit_message(message, CommitMode::Async) {
            warn!(city = %self.cluster.name, error = %err, "offset commit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn request_decodes_and_autofills_timestamp() {
        let payload = br#"{"user_id":"u1","city":"mumbai","latitude":19.08,"longitude":72.88,"timestamp":0,"request_type":"STANDARD"}"#;
        let request = decode_request(payload, 1_700_000_000).unwrap();
        assert_eq!(request.user_id, "u1");
        assert_eq!(request.timestamp, 1_700_000_000);
    }

    #[test]
    fn stale_request_detected_at_boundary() {
        let payload = br#"{"user_id":"u1","city":"mumbai","latitude":19.08,"longitude":72.88,"timestamp":1000}"#;
        let request = decode_request(payload, 1000).unwrap();
        assert!(!request.is_stale(1000 + MAX_REQUEST_AGE_SECS, MAX_REQUEST_AGE_SECS));
        assert!(request.is_stale(1001 + MAX_REQUEST_AGE_SECS, MAX_REQUEST_AGE_SECS));
    }

    #[test]
    fn missing_user_id_rejected() {
        let payload = br#"{"user_id":"","city":"mumbai","latitude":19.08,"longitude":72.88,"timestamp":1}"#;
        assert!(decode_request(payload, 0).is_err());
    }

    struct SlowHandler {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl RequestHandler for SlowHandler {
        async fn handle(&self, _request: RideRequest) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dispatcher_bounds_concurrency() {
        let handler = Arc::new(SlowHandler {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let dispatcher = RequestDispatcher::new(handler.clone(), 2);

        let request = RideRequest {
            user_id: "u1".to_string(),
            city: "mumbai".to_string(),
            latitude: 19.08,
            longitude: 72.88,
            timestamp: 1,
            request_type: String::new(),
        };
        for _ in 0..6 {
            dispatcher.dispatch(request.clone()).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(handler.running.load(Ordering::SeqCst), 0);
    }
}
