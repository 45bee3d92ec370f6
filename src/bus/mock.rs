//! Mock message bus implementation for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BusError, MessageBus, MessageStream, Result};

/// Mock message bus that records publishes.
#[derive(Default)]
pub struct MockBus {
    published: RwLock<Vec<(String, String)>>,
    fail_on_publish: RwLock<bool>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    pub async fn published_count(&self) -> usize {
        self.published.read().await.len()
    }

    /// Drain recorded `(topic, payload)` pairs.
    pub async fn take_published(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.published.write().await)
    }
}

#[async_trait]
impl MessageBus for MockBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        if *self.fail_on_publish.read().await {
            return Err(BusError::Publish("Mock publish failure".to_string()));
        }
        self.published
            .write()
            .await
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    async fn subscribe(&self, _topic: &str) -> Result<MessageStream> {
        Err(BusError::SubscribeNotSupported)
    }
}
