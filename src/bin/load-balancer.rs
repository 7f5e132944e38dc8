//! Failover load balancer in front of the gateway instances.
//!
//! Configuration is read from the TOML file named by `BALANCER_CONFIG`, or
//! built-in defaults when unset.

use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use resilient_gateway::config::{load_balancer_config, validation::validate_balancer, BalancerConfig, ConfigError};
use resilient_gateway::lifecycle::{signals::wait_for_signal, Shutdown};
use resilient_gateway::observability::{logging, metrics};
use resilient_gateway::BalancerServer;

fn load_config() -> Result<BalancerConfig, ConfigError> {
    match std::env::var_os("BALANCER_CONFIG") {
        Some(path) => load_balancer_config(&PathBuf::from(path)),
        None => {
            let config = BalancerConfig::default();
            validate_balancer(&config).map_err(ConfigError::Validation)?;
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
        backends = config.backends.len(),
        attempt_timeout_ms = config.attempt_timeout_ms,
        "load-balancer starting"
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
    let server = BalancerServer::new(config)?;
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();
    serving.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
