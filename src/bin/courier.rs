//! courier: addressed-event service instance.
//!
//! Runs one named service: the HTTP trigger surface and the inbound
//! dispatcher loop, over the configured messaging backend.
//!
//! ## Configuration
//! - positional args: service name, listening port (override the config)
//! - `config.yaml` / `COURIER_CONFIG`: full configuration file
//! - `COURIER`-prefixed environment variables
//! - `COURIER_LOG`: tracing filter (default "info")

use std::sync::Arc;

use tracing::info;

use courier::bus::MessageBus;
use courier::config::{Config, MessagingType};
use courier::runtime::{self, ServiceIdentity, ServiceRuntime};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::init_tracing();

    let mut config = Config::load(None)?;

    // Positional overrides, matching the historical invocation
    // `courier <name> <port>`.
    let mut args = std::env::args().skip(1);
    if let Some(name) = args.next() {
        config.service.name = name;
    }
    if let Some(port) = args.next() {
        config.server.port = port.parse()?;
    }

    info!(
        service = %config.service.name,
        port = config.server.port,
        messaging = ?config.messaging.messaging_type,
        "Starting courier service"
    );

    let bus: Arc<dyn MessageBus> = match config.messaging.messaging_type {
        MessagingType::Channel => {
            #[cfg(feature = "channel")]
            {
                tracing::warn!(
                    "Channel messaging is in-process only; commands from other processes will not arrive"
                );
                Arc::new(courier::bus::ChannelBus::new())
            }
            #[cfg(not(feature = "channel"))]
            {
                return Err("channel messaging requested but the 'channel' feature is not enabled".into());
            }
        }
        MessagingType::Kafka => {
            #[cfg(feature = "kafka")]
            {
                let kafka = &config.messaging.kafka;
                let mut bus_config = courier::bus::KafkaBusConfig::for_service(
                    &kafka.bootstrap_servers,
                    &config.service.name,
                );
                if let Some(group_id) = &kafka.group_id {
                    bus_config = bus_config.with_group_id(group_id);
                }
                Arc::new(courier::bus::KafkaBus::connect(bus_config)?)
            }
            #[cfg(not(feature = "kafka"))]
            {
                return Err("kafka messaging requested but the 'kafka' feature is not enabled".into());
            }
        }
    };

    let identity = ServiceIdentity::new(&config.service.name);
    let runtime = ServiceRuntime::new(identity, bus, &config.server.host, config.server.port);

    // run only returns when an execution context has died.
    runtime.run().await?;
    Ok(())
}
