//! Event bus client: publish/subscribe over a shared broker.
//!
//! This module contains:
//! - `MessageBus` trait: the two capabilities the rest of the crate needs
//! - Bus error types and the fixed topic names
//! - Implementations: Kafka, in-memory channel, recording mock

use futures::stream::BoxStream;

// Implementation modules
#[cfg(feature = "channel")]
pub mod channel;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod mock;

// Re-exports
#[cfg(feature = "channel")]
pub use channel::ChannelBus;
#[cfg(feature = "kafka")]
pub use kafka::{KafkaBus, KafkaBusConfig};
pub use mock::MockBus;

/// Outbound topic: every service and the manager publish here.
pub const OUTBOUND_TOPIC: &str = "tomanager";
/// Inbound topic: addressed commands, broadcast to every service instance.
pub const INBOUND_TOPIC: &str = "frommanager";

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
///
/// Connectivity failures are fatal to the execution context that owns the
/// call; retry policy, if any, is layered outside this crate.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Subscribe not supported for this bus type")]
    SubscribeNotSupported,
}

/// Infinite sequence of raw payload texts from one topic.
///
/// An `Err` item or the end of the stream is an unrecoverable condition for
/// the consuming context; recovery means reconnecting via a fresh
/// [`MessageBus::subscribe`] call.
pub type MessageStream = BoxStream<'static, Result<String>>;

/// Interface to the publish/subscribe broker.
///
/// Implementations:
/// - `KafkaBus`: Kafka via rdkafka (feature `kafka`)
/// - `ChannelBus`: in-process broadcast channels (feature `channel`)
/// - `MockBus`: recording mock for tests
#[async_trait::async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload to a topic.
    ///
    /// Returns once the broker has accepted the message, not once anyone
    /// has consumed it. Safe for concurrent callers.
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;

    /// Subscribe to a topic, receiving every message published to it.
    ///
    /// Fan-out is the broker's job: every subscriber sees every message,
    /// and filtering by addressee happens locally in the dispatcher.
    async fn subscribe(&self, topic: &str) -> Result<MessageStream>;
}
