//! Address filtering and command dispatch.
//!
//! Every instance consumes the whole inbound topic; relevance is decided
//! locally by comparing the event's addressee field against this instance's
//! service name. Matching events run the local action for their function
//! and publish an acknowledgement back on the outbound topic. Processing is
//! strictly sequential per instance: one message is fully handled before
//! the next is pulled, and no state is carried between messages.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::bus::{BusError, MessageBus, MessageStream, OUTBOUND_TOPIC};
use crate::codec::{self, Event, Function};
use crate::runtime::ServiceIdentity;

/// How one inbound message was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Addressed to a different service; discarded without action.
    NotAddressed,
    /// Function recognized, action ran, acknowledgement published.
    Acknowledged(Function),
    /// Unrecognized or absent function; observed, nothing emitted.
    UnknownFunction,
}

/// Per-instance command dispatcher.
pub struct Dispatcher {
    identity: ServiceIdentity,
    bus: Arc<dyn MessageBus>,
}

impl Dispatcher {
    pub fn new(identity: ServiceIdentity, bus: Arc<dyn MessageBus>) -> Self {
        Self { identity, bus }
    }

    /// Consume the inbound stream until it fails.
    ///
    /// The subscription is expected to block indefinitely between messages;
    /// an `Err` item or the end of the stream means the bus connection is
    /// gone, which is fatal to this context.
    pub async fn run(&self, mut stream: MessageStream) -> Result<(), BusError> {
        while let Some(item) = stream.next().await {
            let payload = item?;
            self.handle_payload(&payload).await?;
        }
        Err(BusError::Subscribe(
            "inbound subscription ended".to_string(),
        ))
    }

    /// Classify and handle a single inbound payload.
    ///
    /// Decode never fails; a payload missing the addressee field naturally
    /// falls out as [`DispatchOutcome::NotAddressed`]. Only a failed
    /// acknowledgement publish is an error.
    pub async fn handle_payload(&self, payload: &str) -> Result<DispatchOutcome, BusError> {
        let fields = codec::decode(payload);

        match fields.addressee() {
            Some(addressee) if addressee == self.identity.name() => {}
            _ => {
                debug!(
                    service = %self.identity.name(),
                    addressee = fields.addressee().unwrap_or("<absent>"),
                    "Ignoring event addressed elsewhere"
                );
                return Ok(DispatchOutcome::NotAddressed);
            }
        }

        let function = match fields.function() {
            Some(value) => Function::from_wire(value),
            None => {
                warn!(service = %self.identity.name(), "Inbound event has no function field");
                return Ok(DispatchOutcome::UnknownFunction);
            }
        };

        match &function {
            Function::Create => info!(service = %self.identity.name(), "Create function called"),
            Function::Update => info!(service = %self.identity.name(), "Update function called"),
            Function::Delete => info!(service = %self.identity.name(), "Delete function called"),
            Function::Unknown(other) => {
                warn!(
                    service = %self.identity.name(),
                    function = %other,
                    "Unknown function"
                );
                return Ok(DispatchOutcome::UnknownFunction);
            }
        }

        // The acknowledgement must carry the request's correlation id. An
        // inbound event without one gets a fresh id rather than a crash.
        let correlation_id = match fields.correlation_id() {
            Some(id) => id.to_string(),
            None => {
                warn!(service = %self.identity.name(), "Inbound event has no correlation id");
                self.identity.mint_correlation_id()
            }
        };

        let ack = Event::acknowledgement(self.identity.name(), function.clone(), correlation_id);
        self.bus
            .publish(OUTBOUND_TOPIC, &codec::encode(&ack))
            .await?;

        Ok(DispatchOutcome::Acknowledged(function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;
    use crate::codec::{decode, KEY_CORRELATION_ID, KEY_FUNCTION, KEY_SERVICE};

    fn dispatcher(bus: Arc<MockBus>) -> Dispatcher {
        Dispatcher::new(ServiceIdentity::new("billing"), bus)
    }

    fn inbound(service: &str, function: &str, correlation_id: &str) -> String {
        codec::encode(&Event::acknowledgement(
            service,
            Function::from_wire(function),
            correlation_id,
        ))
    }

    #[tokio::test]
    async fn test_event_for_other_service_is_discarded() {
        let bus = Arc::new(MockBus::new());
        let outcome = dispatcher(bus.clone())
            .handle_payload(&inbound("shipping", "create", "1"))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::NotAddressed);
        assert_eq!(bus.published_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_emits_one_ack_with_same_correlation_id() {
        let bus = Arc::new(MockBus::new());
        let outcome = dispatcher(bus.clone())
            .handle_payload(&inbound("billing", "update", "corr-17"))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Acknowledged(Function::Update));

        let published = bus.take_published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, OUTBOUND_TOPIC);

        let fields = decode(&published[0].1);
        assert_eq!(fields.get(KEY_CORRELATION_ID), Some("corr-17"));
        assert_eq!(fields.get(KEY_FUNCTION), Some("update"));
        assert_eq!(fields.get(KEY_SERVICE), Some("billing"));
    }

    #[tokio::test]
    async fn test_unknown_function_emits_nothing() {
        let bus = Arc::new(MockBus::new());
        let outcome = dispatcher(bus.clone())
            .handle_payload(&inbound("billing", "archive", "9"))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::UnknownFunction);
        assert_eq!(bus.published_count().await, 0);
    }

    #[tokio::test]
    async fn test_absent_function_emits_nothing() {
        let bus = Arc::new(MockBus::new());
        let outcome = dispatcher(bus.clone())
            .handle_payload("(uuid:\"3\",service:\"billing\")")
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::UnknownFunction);
        assert_eq!(bus.published_count().await, 0);
    }

    #[tokio::test]
    async fn test_garbled_payload_is_not_addressed() {
        let bus = Arc::new(MockBus::new());
        let outcome = dispatcher(bus.clone())
            .handle_payload("%%% truncated nonsense \"")
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::NotAddressed);
        assert_eq!(bus.published_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_correlation_id_gets_minted_one() {
        let bus = Arc::new(MockBus::new());
        let outcome = dispatcher(bus.clone())
            .handle_payload("(service:\"billing\",function:\"delete\")")
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Acknowledged(Function::Delete));

        let published = bus.take_published().await;
        let fields = decode(&published[0].1);
        assert!(fields.correlation_id().is_some());
    }

    #[tokio::test]
    async fn test_ack_publish_failure_is_fatal() {
        let bus = Arc::new(MockBus::new());
        bus.set_fail_on_publish(true).await;

        let result = dispatcher(bus)
            .handle_payload(&inbound("billing", "create", "1"))
            .await;

        assert!(matches!(result, Err(BusError::Publish(_))));
    }
}
