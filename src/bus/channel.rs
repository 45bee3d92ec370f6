//! In-memory channel message bus for standalone mode.
//!
//! Uses one tokio broadcast channel per topic for pub/sub within a single
//! process. Ideal for local development and testing without a broker.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use super::{MessageBus, MessageStream, Result};

/// Capacity of each per-topic broadcast channel.
const CHANNEL_CAPACITY: usize = 1024;

/// In-memory message bus using tokio broadcast channels.
///
/// Publishing to a topic with no subscribers is not an error; the message
/// is simply dropped, matching broker semantics where nothing is retained
/// for this crate's benefit.
#[derive(Default)]
pub struct ChannelBus {
    topics: RwLock<HashMap<String, broadcast::Sender<String>>>,
}

impl ChannelBus {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender_for(&self, topic: &str) -> broadcast::Sender<String> {
        if let Some(sender) = self.topics.read().await.get(topic) {
            return sender.clone();
        }
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl MessageBus for ChannelBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let sender = self.sender_for(topic).await;
        // send only fails with no receivers; that is fine here.
        let receivers = sender.send(payload.to_string()).unwrap_or(0);
        debug!(topic = %topic, receivers, "Published event to channel bus");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<MessageStream> {
        let receiver = self.sender_for(topic).await.subscribe();
        let topic = topic.to_string();

        let stream = BroadcastStream::new(receiver).filter_map(move |item| {
            let topic = topic.clone();
            async move {
                match item {
                    Ok(payload) => Some(Ok(payload)),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(topic = %topic, skipped, "Channel bus subscriber lagged");
                        None
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::INBOUND_TOPIC;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = ChannelBus::new();
        bus.publish(INBOUND_TOPIC, "orphan").await.unwrap();
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_message() {
        let bus = ChannelBus::new();
        let mut first = bus.subscribe(INBOUND_TOPIC).await.unwrap();
        let mut second = bus.subscribe(INBOUND_TOPIC).await.unwrap();

        bus.publish(INBOUND_TOPIC, "hello").await.unwrap();

        assert_eq!(first.next().await.unwrap().unwrap(), "hello");
        assert_eq!(second.next().await.unwrap().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = ChannelBus::new();
        let mut inbound = bus.subscribe("frommanager").await.unwrap();

        bus.publish("tomanager", "elsewhere").await.unwrap();
        bus.publish("frommanager", "here").await.unwrap();

        assert_eq!(inbound.next().await.unwrap().unwrap(), "here");
    }
}
