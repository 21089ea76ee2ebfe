//! Server configuration.
//!
//! A JSON config file with section defaults, an env override for broker
//! endpoints, and startup validation. Missing required configuration is
//! fatal: the process exits nonzero rather than limping along.

use crate::error::{Result, ServerError};
use hail_ingest::ClusterConfig;
use hail_store::schema::DEFAULT_TABLE_NAME;
use hail_store::DynamoConfig;
use serde::Deserialize;
use std::path::Path;

/// Storage backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// DynamoDB-backed store (production).
    #[default]
    Dynamodb,
    /// In-memory store (local development, tests).
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaSection {
    pub brokers: Vec<String>,
    /// printf-style template with one `%s` for the city.
    pub topic_format: String,
    pub group_id: String,
    /// Subscribed topics; used to derive per-city clusters when no explicit
    /// `clusters` section is present.
    pub topics: Vec<String>,
}

impl Default for KafkaSection {
    fn default() -> Self {
        KafkaSection {
            brokers: vec!["localhost:9092".to_string()],
            topic_format: "%s-locations".to_string(),
            group_id: "hail-dispatch".to_string(),
            topics: vec![
                "mumbai-locations".to_string(),
                "pune-locations".to_string(),
                "delhi-locations".to_string(),
                "mumbai-users".to_string(),
                "pune-users".to_string(),
                "delhi-users".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection { port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamoSection {
    pub endpoint: String,
    pub region: String,
    pub table_name: String,
    pub access_key: String,
    pub secret_key: String,
}

impl Default for DynamoSection {
    fn default() -> Self {
        DynamoSection {
            endpoint: "http://localhost:8000".to_string(),
            region: "us-west-2".to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            access_key: String::new(),
            secret_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingSection {
    pub min_drivers_to_return: usize,
    pub max_distance_km: f64,
}

impl Default for MatchingSection {
    fn default() -> Self {
        MatchingSection {
            min_drivers_to_return: 5,
            max_distance_km: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSection {
    pub url: String,
}

impl Default for RedisSection {
    fn default() -> Self {
        RedisSection {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NotificationSection {
    /// Inter-service websocket endpoint; defaults to this server's own
    /// `/ws/matching` route.
    pub gateway_url: Option<String>,
}

/// An explicitly configured per-city log endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterSection {
    pub name: String,
    pub brokers: String,
}

/// Full server configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageKind,
    pub kafka: KafkaSection,
    pub server: ServerSection,
    pub dynamodb: DynamoSection,
    pub matching: MatchingSection,
    pub redis: RedisSection,
    pub notification: NotificationSection,
    /// Per-city broker overrides; derived from `kafka.topics` when empty.
    pub clusters: Vec<ClusterSection>,
    /// Bound on concurrently running matches per request consumer.
    pub match_pool_size: usize,
}

impl Config {
    /// Load from a JSON file, apply env overrides, and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let mut config: Config = serde_json::from_str(&raw)
            .map_err(|e| ServerError::Config(format!("cannot parse config: {e}")))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults (used when no config file is given).
    pub fn defaults() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(brokers) = std::env::var("KAFKA_BROKERS") {
            if !brokers.is_empty() {
                self.kafka.brokers = brokers.split(',').map(str::to_string).collect();
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.kafka.brokers.is_empty() {
            return Err(ServerError::Config("kafka.brokers must not be empty".into()));
        }
        if !self.kafka.topic_format.contains("%s") {
            return Err(ServerError::Config(
                "kafka.topic_format must contain one %s".into(),
            ));
        }
        if self.dynamodb.table_name.is_empty() {
            return Err(ServerError::Config(
                "dynamodb.table_name must not be empty".into(),
            ));
        }
        if self.matching.min_drivers_to_return == 0 {
            return Err(ServerError::Config(
                "matching.min_drivers_to_return must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Per-city location-topic consumers.
    pub fn location_clusters(&self) -> Vec<ClusterConfig> {
        self.clusters_for_suffix("-locations")
    }

    /// Per-city request-topic consumers.
    pub fn request_clusters(&self) -> Vec<ClusterConfig> {
        self.clusters_for_suffix("-users")
    }

    fn clusters_for_suffix(&self, suffix: &str) -> Vec<ClusterConfig> {
        if !self.clusters.is_empty() {
            return self
                .clusters
                .iter()
                .map(|c| ClusterConfig {
                    name: c.name.clone(),
                    brokers: c.brokers.clone(),
                    topic: format!("{}{}", c.name, suffix),
                })
                .collect();
        }
        let brokers = self.kafka.brokers.join(",");
        self.kafka
            .topics
            .iter()
            .filter_map(|topic| {
                topic.strip_suffix(suffix).map(|city| ClusterConfig {
                    name: city.to_string(),
                    brokers: brokers.clone(),
                    topic: topic.clone(),
                })
            })
            .collect()
    }

    /// Store connection settings for the DynamoDB backend.
    pub fn dynamo_config(&self) -> DynamoConfig {
        let optional = |s: &str| (!s.is_empty()).then(|| s.to_string());
        DynamoConfig {
            table_name: self.dynamodb.table_name.clone(),
            region: optional(&self.dynamodb.region),
            endpoint: optional(&self.dynamodb.endpoint),
            access_key: optional(&self.dynamodb.access_key),
            secret_key: optional(&self.dynamodb.secret_key),
            timeout_ms: None,
        }
    }

    /// Inter-service websocket endpoint for offer dispatch.
    pub fn notification_url(&self) -> String {
        self.notification
            .gateway_url
            .clone()
            .unwrap_or_else(|| format!("ws://127.0.0.1:{}/ws/matching", self.server.port))
    }

    /// Bound on concurrently running matches; defaults to 8.
    pub fn match_pool(&self) -> usize {
        if self.match_pool_size == 0 {
            8
        } else {
            self.match_pool_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.matching.min_drivers_to_return, 5);
        assert_eq!(config.match_pool(), 8);
    }

    #[test]
    fn clusters_derived_from_topics() {
        let config = Config::default();
        let locations = config.location_clusters();
        assert_eq!(locations.len(), 3);
        assert_eq!(locations[0].name, "mumbai");
        assert_eq!(locations[0].topic, "mumbai-locations");

        let requests = config.request_clusters();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].topic, "delhi-users");
    }

    #[test]
    fn explicit_clusters_win() {
        let mut config = Config::default();
        config.clusters = vec![ClusterSection {
            name: "mumbai".to_string(),
            brokers: "kafka-mumbai:9101".to_string(),
        }];
        let locations = config.location_clusters();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].brokers, "kafka-mumbai:9101");
        assert_eq!(locations[0].topic, "mumbai-locations");
    }

    #[test]
    fn parse_config_json() {
        let raw = r#"{
            "kafka": {
                "brokers": ["k1:9092", "k2:9092"],
                "topic_format": "%s-locations",
                "group_id": "dispatch-test",
                "topics": ["mumbai-locations", "mumbai-users"]
            },
            "server": {"port": 9090},
            "matching": {"min_drivers_to_return": 3, "max_distance_km": 7.5},
            "dynamodb": {"table_name": "TestLocations", "region": "eu-west-1",
                         "endpoint": "", "access_key": "", "secret_key": ""}
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.kafka.group_id, "dispatch-test");
        assert_eq!(config.matching.min_drivers_to_return, 3);
        assert_eq!(config.dynamo_config().table_name, "TestLocations");
        assert_eq!(config.dynamo_config().endpoint, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_topic_format_rejected() {
        let mut config = Config::default();
        config.kafka.topic_format = "locations".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn notification_url_defaults_to_own_port() {
        let config = Config::default();
        assert_eq!(config.notification_url(), "ws://127.0.0.1:8080/ws/matching");
    }
}
