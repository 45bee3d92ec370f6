//! End-to-end scenario over the in-memory channel bus.
//!
//! Two service instances, `billing` and `shipping`, share the two broadcast
//! topics. The test plays the manager's part by echoing outbound traffic
//! onto the inbound topic, then verifies that only the addressed instance
//! acknowledges.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use tokio::time::timeout;
use tower::ServiceExt;

use courier::bus::{ChannelBus, MessageBus, MessageStream, INBOUND_TOPIC, OUTBOUND_TOPIC};
use courier::codec::{decode, KEY_FUNCTION, KEY_SERVICE};
use courier::dispatch::Dispatcher;
use courier::runtime::ServiceIdentity;
use courier::triggers::{self, TriggerState};

async fn next_payload(stream: &mut MessageStream) -> String {
    timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("timed out waiting for bus message")
        .expect("bus stream ended")
        .expect("bus stream errored")
}

async fn spawn_instance(name: &str, bus: &Arc<ChannelBus>) {
    let bus: Arc<dyn MessageBus> = Arc::clone(bus) as Arc<dyn MessageBus>;
    let stream = bus.subscribe(INBOUND_TOPIC).await.unwrap();
    let dispatcher = Dispatcher::new(ServiceIdentity::new(name), bus);
    tokio::spawn(async move { dispatcher.run(stream).await });
}

#[tokio::test]
async fn test_trigger_round_trip_acknowledges_only_addressed_instance() {
    let bus = Arc::new(ChannelBus::new());

    // Both instances consume the inbound topic before anything fires.
    spawn_instance("billing", &bus).await;
    spawn_instance("shipping", &bus).await;

    let mut outbound = bus.subscribe(OUTBOUND_TOPIC).await.unwrap();

    // billing calls its own create trigger.
    let app = triggers::router(Arc::new(TriggerState::new(
        ServiceIdentity::new("billing"),
        Arc::clone(&bus) as Arc<dyn MessageBus>,
    )));
    let response = app
        .oneshot(Request::builder().uri("/create").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // The trigger event appears on the outbound topic.
    let request_payload = next_payload(&mut outbound).await;
    let request_fields = decode(&request_payload);
    assert_eq!(request_fields.get(KEY_SERVICE), Some("billing"));
    assert_eq!(request_fields.get(KEY_FUNCTION), Some("create"));
    let correlation_id = request_fields
        .correlation_id()
        .expect("trigger event carries a correlation id")
        .to_string();

    // Play the manager: forward the event to the inbound topic, where both
    // instances will see it.
    bus.publish(INBOUND_TOPIC, &request_payload).await.unwrap();

    // billing republishes an acknowledgement with the same correlation id.
    let ack_payload = next_payload(&mut outbound).await;
    let ack_fields = decode(&ack_payload);
    assert_eq!(ack_fields.get(KEY_SERVICE), Some("billing"));
    assert_eq!(ack_fields.get(KEY_FUNCTION), Some("create"));
    assert_eq!(ack_fields.correlation_id(), Some(correlation_id.as_str()));

    // shipping takes no action: nothing else reaches the outbound topic.
    let extra = timeout(Duration::from_millis(200), outbound.next()).await;
    assert!(extra.is_err(), "unexpected extra outbound message: {:?}", extra);
}

#[tokio::test]
async fn test_unknown_function_round_trip_emits_no_ack() {
    let bus = Arc::new(ChannelBus::new());
    spawn_instance("billing", &bus).await;

    let mut outbound = bus.subscribe(OUTBOUND_TOPIC).await.unwrap();

    bus.publish(
        INBOUND_TOPIC,
        "(uuid:\"77\",service:\"billing\",function:\"archive\")",
    )
    .await
    .unwrap();

    let extra = timeout(Duration::from_millis(200), outbound.next()).await;
    assert!(extra.is_err(), "archive must not be acknowledged");
}
