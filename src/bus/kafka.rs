//! Kafka message bus implementation.
//!
//! One `FutureProducer` shared by all publishers in the process, and one
//! `StreamConsumer` per subscription, pumped into an mpsc channel by a
//! spawned task. Every instance subscribes under its own consumer group so
//! the shared topics behave as broadcast channels.

use async_trait::async_trait;
use futures::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use super::{BusError, MessageBus, MessageStream, Result};

/// Buffer between the consumer pump task and the dispatcher loop.
const STREAM_BUFFER: usize = 64;

/// Configuration for Kafka connections.
#[derive(Clone, Debug)]
pub struct KafkaBusConfig {
    /// Kafka bootstrap servers (comma-separated).
    pub bootstrap_servers: String,
    /// Consumer group id. Must be unique per instance: the inbound topic is
    /// a broadcast channel, and instances sharing a group would split it.
    pub group_id: String,
}

impl KafkaBusConfig {
    /// Config for a named service instance, minting a per-process group id.
    pub fn for_service(bootstrap_servers: impl Into<String>, service: &str) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            group_id: format!("{}-{}", service, uuid::Uuid::new_v4().simple()),
        }
    }

    /// Use an explicit consumer group id.
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    fn build_producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.bootstrap_servers);
        config.set("message.timeout.ms", "5000");
        config.set("acks", "all");
        config.set("enable.idempotence", "true");
        config
    }

    fn build_consumer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.bootstrap_servers);
        config.set("group.id", &self.group_id);
        config.set("enable.auto.commit", "true");
        config.set("auto.offset.reset", "latest");
        config
    }
}

/// Kafka message bus.
pub struct KafkaBus {
    producer: FutureProducer,
    config: KafkaBusConfig,
}

impl KafkaBus {
    /// Connect a new Kafka bus.
    pub fn connect(config: KafkaBusConfig) -> Result<Self> {
        let producer: FutureProducer = config
            .build_producer_config()
            .create()
            .map_err(|e| BusError::Connection(format!("Failed to create Kafka producer: {}", e)))?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            group_id = %config.group_id,
            "Connected to Kafka"
        );

        Ok(Self { producer, config })
    }
}

#[async_trait]
impl MessageBus for KafkaBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let record: FutureRecord<'_, (), str> = FutureRecord::to(topic).payload(payload);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| BusError::Publish(format!("Failed to publish: {}", e)))?;

        debug!(topic = %topic, "Published event to Kafka");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<MessageStream> {
        let consumer: StreamConsumer = self
            .config
            .build_consumer_config()
            .create()
            .map_err(|e| BusError::Connection(format!("Failed to create Kafka consumer: {}", e)))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| BusError::Subscribe(format!("Failed to subscribe to {}: {}", topic, e)))?;

        info!(topic = %topic, group_id = %self.config.group_id, "Subscribed to Kafka topic");

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let topic = topic.to_string();

        // Pump task: owns the consumer for the lifetime of the stream.
        tokio::spawn(async move {
            let mut stream = consumer.stream();

            while let Some(result) = stream.next().await {
                let item = match result {
                    Ok(message) => match message.payload_view::<str>() {
                        Some(Ok(text)) => Ok(text.to_string()),
                        Some(Err(_)) => {
                            warn!(topic = %topic, "Dropping non-UTF-8 payload");
                            continue;
                        }
                        None => {
                            warn!(topic = %topic, "Dropping message with no payload");
                            continue;
                        }
                    },
                    Err(e) => {
                        // Consumer errors are unrecoverable for this
                        // subscription; surface and stop.
                        error!(topic = %topic, error = %e, "Kafka consumer error");
                        Err(BusError::Connection(e.to_string()))
                    }
                };

                let fatal = item.is_err();
                if tx.send(item).await.is_err() || fatal {
                    break;
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}
