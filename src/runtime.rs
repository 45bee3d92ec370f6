//! Service runtime: process identity and the two execution contexts.
//!
//! A running instance is two concurrent contexts sharing read-only state:
//! the synchronous trigger surface and the asynchronous dispatcher loop.
//! Both are supervised together; either one terminating means the instance
//! is no longer whole, so the runtime reports an unclean shutdown and lets
//! an external supervisor restart the process.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bus::{BusError, MessageBus, INBOUND_TOPIC};
use crate::dispatch::Dispatcher;
use crate::triggers::{self, TriggerState};

/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "COURIER_LOG";

/// Initialize tracing with the COURIER_LOG environment variable.
///
/// Defaults to "info" level if COURIER_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Process-wide service identity, fixed at startup.
#[derive(Debug, Clone)]
pub struct ServiceIdentity {
    name: Arc<str>,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().into(),
        }
    }

    /// The service name used for address filtering.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mint a fresh correlation id.
    pub fn mint_correlation_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Errors terminating a service instance.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Trigger surface terminated: {0}")]
    TriggerSurface(String),

    #[error("Dispatcher terminated: {0}")]
    Dispatcher(String),
}

/// One service instance: identity, bus, and the two execution contexts.
pub struct ServiceRuntime {
    identity: ServiceIdentity,
    bus: Arc<dyn MessageBus>,
    host: String,
    port: u16,
}

impl ServiceRuntime {
    pub fn new(
        identity: ServiceIdentity,
        bus: Arc<dyn MessageBus>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            identity,
            bus,
            host: host.into(),
            port,
        }
    }

    /// Run both execution contexts until one of them fails.
    ///
    /// The inbound subscription is established before the trigger surface
    /// starts listening, so no addressed command published after startup
    /// can be missed. Neither context is expected to return; whichever
    /// finishes first ends the instance, and the other is dropped with it.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let stream = self.bus.subscribe(INBOUND_TOPIC).await?;
        let dispatcher = Dispatcher::new(self.identity.clone(), Arc::clone(&self.bus));
        let state = Arc::new(TriggerState::new(
            self.identity.clone(),
            Arc::clone(&self.bus),
        ));

        info!(service = %self.identity.name(), port = self.port, "Service runtime starting");

        tokio::select! {
            result = triggers::serve(state, &self.host, self.port) => {
                Err(RuntimeError::TriggerSurface(describe_exit(result)))
            }
            result = dispatcher.run(stream) => {
                Err(RuntimeError::Dispatcher(describe_exit(result)))
            }
        }
    }
}

/// A context returning at all is unclean, error or not.
fn describe_exit<E: std::fmt::Display>(result: Result<(), E>) -> String {
    match result {
        Ok(()) => "exited unexpectedly".to_string(),
        Err(e) => e.to_string(),
    }
}
