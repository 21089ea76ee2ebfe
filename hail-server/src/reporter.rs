//! Periodic metrics reporter.

use hail_core::PipelineMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Log a counter snapshot every `interval` until shutdown.
///
/// The loss warnings are the observable side of the "drop, never block"
/// policy: counted failures should show up here, not in a stalled pipeline.
pub async fn run(
    metrics: Arc<PipelineMetrics>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snap = metrics.snapshot();
                info!(
                    messages_received = snap.messages_received,
                    messages_processed = snap.messages_processed,
                    messages_failed = snap.messages_failed,
                    requests_received = snap.requests_received,
                    requests_stale = snap.requests_stale,
                    matches_published = snap.matches_published,
                    store_attempts = snap.store_write_attempts,
                    store_successes = snap.store_write_successes,
                    store_failures = snap.store_write_failures,
                    offers_forwarded = snap.offers_forwarded,
                    offers_dropped = snap.offers_dropped,
                    "metrics report"
                );
                if snap.store_write_failures > 0 {
                    warn!(
                        dropped_rows = snap.store_write_failures,
                        "store writes have been dropped after retries"
                    );
                }
                if snap.messages_failed > 0 && snap.messages_received > 0 {
                    let rate = snap.messages_failed as f64 / snap.messages_received as f64;
                    if rate > 0.01 {
                        warn!(
                            failed = snap.messages_failed,
                            received = snap.messages_received,
                            "elevated ingestion rejection rate"
                        );
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
