//! Kafka producer for onscreen alert events.

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::kafka::events::AlertEvent;

#[async_trait]
pub trait AlertPublisher: Send + Sync {
    /// Serializes the event and hands it to the outbound bus. Any transport
    /// failure is propagated.
    async fn publish(&self, event: &AlertEvent) -> Result<()>;
}

pub struct AlertProducer {
    producer: FutureProducer,
    topic: String,
    delivery_timeout: Duration,
}

impl AlertProducer {
    pub fn new(brokers: &str, topic: String) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| Error::Publish(format!("failed to create Kafka producer: {e}")))?;

        info!(brokers = %brokers, topic = %topic, "alert producer initialized");

        Ok(Self {
            producer,
            topic,
            delivery_timeout: Duration::from_secs(30),
        })
    }
}

#[async_trait]
impl AlertPublisher for AlertProducer {
    async fn publish(&self, event: &AlertEvent) -> Result<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| Error::Publish(format!("failed to serialize alert event: {e}")))?;
        let key = event.payload.image.viewer().twitch_user_id.clone();

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);
        match self.producer.send(record, self.delivery_timeout).await {
            Ok((partition, offset)) => {
                info!(
                    topic = %self.topic,
                    partition = partition,
                    offset = offset,
                    "produced alert event"
                );
                Ok(())
            }
            Err((err, _)) => {
                error!(topic = %self.topic, error = %err, "failed to produce alert event");
                Err(Error::Publish(err.to_string()))
            }
        }
    }
}
