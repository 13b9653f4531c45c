use crate::error::{Error, Result};
use crate::interfaces::price_store::{PriceRecord, PriceStore};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::config::ClientConfig;
use async_trait::async_trait;
use std::time::Duration;

/// Publishes price records to a Kafka topic. Records are keyed by
/// `source:timestamp_ms`, so on a compacted topic a re-send replaces the
/// earlier message instead of duplicating it.
pub struct KafkaPriceStore {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl KafkaPriceStore {
    pub fn new(brokers: &str, topic: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("compression.type", "lz4")
            .set("enable.idempotence", "true")
            .create()
            .map_err(|e| Error::KafkaError(e.to_string()))?;

        tracing::info!(brokers, topic, "Kafka price store ready");
        Ok(KafkaPriceStore {
            producer,
            topic: topic.to_string(),
            send_timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl PriceStore for KafkaPriceStore {
    async fn upsert(&self, record: &PriceRecord) -> Result<()> {
        let payload = serde_json::to_vec(record)
            .map_err(|e| Error::SerializationError(e.to_string()))?;
        let key = record.key();

        let message = FutureRecord::to(&self.topic)
            .payload(&payload)
            .key(&key);

        self.producer
            .send(message, self.send_timeout)
            .await
            .map_err(|(e, _)| Error::Persist(format!("kafka send failed for {}: {}", key, e)))?;

        Ok(())
    }
}
