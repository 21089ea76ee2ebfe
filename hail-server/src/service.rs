//! Match pipeline wiring: engine → user pub/sub → driver offers.

use async_trait::async_trait;
use hail_core::{MatchResult, PipelineMetrics, RideRequest};
use hail_ingest::RequestHandler;
use hail_match::{MatchEngine, MatchError};
use hail_realtime::{MatchPublisher, OfferDispatcher, RealtimeError};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs one ride request end to end.
///
/// Best-effort by design: a status is always published to the user, store
/// and gateway failures are logged and counted but never crash the
/// consumer, and offers for an unreachable gateway are simply dropped.
pub struct MatchService {
    engine: MatchEngine,
    publisher: MatchPublisher,
    dispatcher: OfferDispatcher,
    metrics: Arc<PipelineMetrics>,
}

impl MatchService {
    pub fn new(
        engine: MatchEngine,
        publisher: MatchPublisher,
        dispatcher: OfferDispatcher,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        MatchService {
            engine,
            publisher,
            dispatcher,
            metrics,
        }
    }
}

#[async_trait]
impl RequestHandler for MatchService {
    async fn handle(&self, request: RideRequest) {
        let outcome = match self.engine.process(&request).await {
            Ok(outcome) => outcome,
            Err(MatchError::QueryFailed { failed_cells }) => {
                error!(
                    user_id = %request.user_id,
                    failed_cells,
                    "matching store unavailable"
                );
                let result = MatchResult::query_failed(request.user_id.clone(), request.timestamp);
                self.publish(&result).await;
                return;
            }
            Err(err) => {
                // Requests were validated at ingress; anything left is a bug
                // worth logging, not worth crashing the consumer for.
                error!(user_id = %request.user_id, error = %err, "match processing failed");
                return;
            }
        };

        info!(
            user_id = %request.user_id,
            status = ?outcome.result.status,
            drivers = outcome.result.drivers.len(),
            "match computed"
        );
        self.publish(&outcome.result).await;

        if outcome.offers.is_empty() {
            return;
        }
        match self.dispatcher.send_offers(&outcome.offers).await {
            Ok(()) => {}
            Err(RealtimeError::NotConnected) => {
                warn!(
                    user_id = %request.user_id,
                    offers = outcome.offers.len(),
                    "notification gateway unreachable, offers dropped"
                );
            }
            Err(err) => {
                warn!(user_id = %request.user_id, error = %err, "offer dispatch failed");
            }
        }
    }
}

impl MatchService {
    async fn publish(&self, result: &MatchResult) {
        match self.publisher.publish_match(result).await {
            Ok(()) => PipelineMetrics::incr(&self.metrics.matches_published),
            Err(err) => {
                warn!(user_id = %result.user_id, error = %err, "match publish failed");
            }
        }
    }
}
