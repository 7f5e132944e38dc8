//! Payment gateway instance.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                  PAYMENT GATEWAY                     │
//!                    │                                                      │
//!   POST /payments   │  ┌──────────┐   ┌───────────┐   ┌────────────────┐   │
//!   ─────────────────┼─▶│   http   │──▶│ dispatch  │──▶│ payments/dedup │   │
//!                    │  │ handlers │   │  (race)   │   └────────────────┘   │
//!                    │  └──────────┘   └─────┬─────┘                        │
//!                    │          ┌────────────┴─────────────┐                │
//!                    │          ▼                          ▼                │
//!                    │  ┌───────────────┐          ┌──────────────┐         │
//!                    │  │  processor    │          │   fallback   │         │
//!                    │  │  strategies   │          │  (delay, tag)│         │
//!                    │  └───────┬───────┘          └──────────────┘         │
//!                    │          │ health cache → circuit breaker → pool      │
//!                    └──────────┼───────────────────────────────────────────┘
//!                               ▼
//!                      Downstream processors
//! ```
//!
//! Configuration is read from the TOML file named by `GATEWAY_CONFIG`, or
//! built-in defaults when unset.

use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use resilient_gateway::config::{load_gateway_config, validation::validate_gateway, ConfigError, GatewayConfig};
use resilient_gateway::lifecycle::{signals::wait_for_signal, Shutdown};
use resilient_gateway::observability::{logging, metrics};
use resilient_gateway::GatewayServer;

fn load_config() -> Result<GatewayConfig, ConfigError> {
    match std::env::var_os("GATEWAY_CONFIG") {
        Some(path) => load_gateway_config(&PathBuf::from(path)),
        None => {
            let config = GatewayConfig::default();
            validate_gateway(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        processors = config.processors.len(),
        fallbacks = config.fallbacks.len(),
        "payment-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config);
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();
    serving.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
