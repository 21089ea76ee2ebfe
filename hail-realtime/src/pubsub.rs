//! Redis pub/sub publisher for match results.

use crate::error::{RealtimeError, Result};
use deadpool_redis::{Config, Pool, Runtime};
use hail_core::{unix_now, MatchResult};
use redis::AsyncCommands;
use serde_json::json;
use tracing::{debug, warn};

/// Channel carrying `{event, user_id, match_count, timestamp}` notifications.
pub const USER_UPDATES_CHANNEL: &str = "user_updates";

/// How long a match result stays cached for reconnecting clients.
const MATCH_CACHE_TTL_SECS: u64 = 300;

/// Redis connection settings.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 16,
        }
    }
}

/// Publishes match results to per-user channels.
#[derive(Clone)]
pub struct MatchPublisher {
    pool: Pool,
}

impl MatchPublisher {
    /// Build the pool and verify the connection with a PING.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| RealtimeError::Redis(e.to_string()))?
            .max_size(config.pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RealtimeError::Redis(e.to_string()))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| RealtimeError::Redis(e.to_string()))?;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| RealtimeError::Redis(e.to_string()))?;

        Ok(MatchPublisher { pool })
    }

    /// Channel name for one user's match results.
    pub fn user_channel(user_id: &str) -> String {
        format!("user:{user_id}")
    }

    /// Publish a match result to the user's channel, cache it briefly for
    /// reconnecting clients, and emit a `user_updates` notification.
    ///
    /// Publishing with no subscriber is not an error: the message is simply
    /// lost and the client retries.
    pub async fn publish_match(&self, result: &MatchResult) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RealtimeError::Redis(e.to_string()))?;

        let body = serde_json::to_string(result)?;
        let channel = Self::user_channel(&result.user_id);

        let receivers: i64 = conn.publish(&channel, &body).await?;
        debug!(channel = %channel, receivers, "match result published");

        // Cache for reconnecting clients; best-effort.
        let cache_key = format!("user:{}:matches", result.user_id);
        if let Err(err) = conn
            .set_ex::<_, _, ()>(&cache_key, &body, MATCH_CACHE_TTL_SECS)
            .await
        {
            warn!(error = %err, "failed to cache match result");
        }

        let notification = json!({
            "event": "driver_matches_updated",
            "user_id": result.user_id,
            "match_count": result.drivers.len(),
            "timestamp": unix_now(),
        });
        if let Err(err) = conn
            .publish::<_, _, i64>(USER_UPDATES_CHANNEL, notification.to_string())
            .await
        {
            warn!(error = %err, "failed to publish user_updates event");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hail_core::{MatchStatus, MatchedDriver};

    #[test]
    fn user_channel_format() {
        assert_eq!(MatchPublisher::user_channel("u-42"), "user:u-42");
    }

    // Integration tests require a running Redis instance.

    #[tokio::test]
    #[ignore = "requires Redis instance at 127.0.0.1:6379"]
    async fn publish_without_subscriber_succeeds() {
        let publisher = MatchPublisher::connect(&RedisConfig::default())
            .await
            .expect("failed to connect to Redis");
        let result = MatchResult {
            user_id: "pubsub-test-user".to_string(),
            request_time: unix_now(),
            status: MatchStatus::Success,
            drivers: vec![MatchedDriver {
                driver_id: "d1".to_string(),
                vehicle_type: "STANDARD".to_string(),
                distance_km: 1.0,
                eta_minutes: 3,
            }],
        };
        publisher.publish_match(&result).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis instance at 127.0.0.1:6379"]
    async fn published_bytes_reach_subscriber_verbatim() {
        use futures::StreamExt;

        let config = RedisConfig::default();
        let client = redis::Client::open(config.url.clone()).unwrap();
        let mut pubsub = client.get_async_pubsub().await.unwrap();
        pubsub.subscribe("user:verbatim-user").await.unwrap();

        let publisher = MatchPublisher::connect(&config).await.unwrap();
        let result = MatchResult {
            user_id: "verbatim-user".to_string(),
            request_time: 1_700_000_000,
            status: MatchStatus::NoDriversAvailable,
            drivers: Vec::new(),
        };
        let expected = serde_json::to_string(&result).unwrap();
        publisher.publish_match(&result).await.unwrap();

        let msg = pubsub.on_message().next().await.unwrap();
        let payload: String = msg.get_payload().unwrap();
        assert_eq!(payload, expected);
    }
}
