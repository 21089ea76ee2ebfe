//! Kafka client construction and the per-city producer.

use crate::error::{IngestError, Result};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// One city's log endpoint.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// City name, used for logging and topic derivation.
    pub name: String,
    /// host:port list for this city's brokers.
    pub brokers: String,
    /// Topic to subscribe to.
    pub topic: String,
}

/// Build a manually committed consumer subscribed to one topic.
///
/// `enable.auto.commit=false` so offsets move only after handoff;
/// `auto.offset.reset=earliest` so a fresh group replays retained history.
pub fn consumer(cluster: &ClusterConfig, group_id: &str) -> Result<StreamConsumer> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &cluster.brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .create()
        .map_err(|e| IngestError::Kafka(format!("failed to create consumer: {e}")))?;

    consumer
        .subscribe(&[&cluster.topic])
        .map_err(|e| IngestError::Kafka(format!("failed to subscribe: {e}")))?;

    info!(city = %cluster.name, topic = %cluster.topic, "consumer subscribed");
    Ok(consumer)
}

/// JSON producer publishing to per-city topics via a `%s` template.
pub struct LocationProducer {
    producer: FutureProducer,
    topic_format: String,
}

impl LocationProducer {
    pub fn new(brokers: &str, topic_format: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| IngestError::Kafka(format!("failed to create producer: {e}")))?;

        info!(brokers = %brokers, topic_format = %topic_format, "producer connected");
        Ok(LocationProducer {
            producer,
            topic_format: topic_format.to_string(),
        })
    }

    /// Topic for a city, e.g. `"%s-locations"` + `"mumbai"`.
    pub fn topic_for(&self, city: &str) -> String {
        self.topic_format.replacen("%s", city, 1)
    }

    /// Publish one JSON payload to the city's topic.
    pub async fn publish<T: Serialize>(
        &self,
        city: &str,
        key: Option<&str>,
        payload: &T,
    ) -> Result<()> {
        let topic = self.topic_for(city);
        let body = serde_json::to_vec(payload)
            .map_err(|e| IngestError::Decode(format!("failed to encode payload: {e}")))?;

        let mut record = FutureRecord::<str, [u8]>::to(&topic).payload(body.as_slice());
        if let Some(key) = key {
            record = record.key(key);
        }

        self.producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
            .map_err(|(e, _)| IngestError::Kafka(format!("publish to {topic} failed: {e}")))?;
        Ok(())
    }
}
