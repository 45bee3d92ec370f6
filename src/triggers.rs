//! Synchronous request trigger surface.
//!
//! Three externally reachable operations - create, update, delete - each of
//! which originates one outbound event addressed to this service's own name
//! and returns immediately. The response means "request accepted for
//! dispatch", never "operation completed"; completion is only observable on
//! the outbound channel. A failed publish returns a server error instead of
//! claiming acceptance.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::bus::{MessageBus, OUTBOUND_TOPIC};
use crate::codec::{self, Event, Function};
use crate::runtime::ServiceIdentity;

/// Shared state for the trigger handlers, read-only after startup.
pub struct TriggerState {
    identity: ServiceIdentity,
    bus: Arc<dyn MessageBus>,
}

impl TriggerState {
    pub fn new(identity: ServiceIdentity, bus: Arc<dyn MessageBus>) -> Self {
        Self { identity, bus }
    }
}

type AppState = Arc<TriggerState>;

/// Start the trigger surface on the given host and port.
///
/// When `port` is 0, the OS assigns an ephemeral port. The actual bound
/// port is always logged so it can be discovered.
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    let actual_port = listener.local_addr()?.port();
    info!(port = actual_port, "trigger surface listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the axum router (separated for testing).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/create", get(create))
        .route("/update", get(update))
        .route("/delete", get(delete))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn create(State(state): State<AppState>) -> Response {
    trigger(&state, Function::Create, StatusCode::CREATED, "created").await
}

async fn update(State(state): State<AppState>) -> Response {
    trigger(&state, Function::Update, StatusCode::OK, "updated").await
}

async fn delete(State(state): State<AppState>) -> Response {
    trigger(&state, Function::Delete, StatusCode::OK, "deleted").await
}

/// Originate one outbound event and acknowledge the caller.
///
/// Fire-and-forget: the freshly minted correlation id travels only on the
/// bus, not back to the caller.
async fn trigger(
    state: &TriggerState,
    function: Function,
    accepted: StatusCode,
    status_label: &'static str,
) -> Response {
    let event = Event::request(state.identity.name(), function);
    info!(
        service = %state.identity.name(),
        function = %event.function,
        correlation_id = %event.correlation_id,
        "Trigger fired"
    );

    match state
        .bus
        .publish(OUTBOUND_TOPIC, &codec::encode(&event))
        .await
    {
        Ok(()) => (accepted, Json(TriggerResponse { status: status_label })).into_response(),
        Err(e) => {
            error!(service = %state.identity.name(), error = %e, "Trigger publish failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[derive(Serialize)]
struct TriggerResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}
