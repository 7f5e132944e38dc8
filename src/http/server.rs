//! Gateway HTTP server.
//!
//! # Responsibilities
//! - Build every shared component from configuration and wire them together
//! - Create the Axum router with the payment and admin handlers
//! - Wire up middleware (timeout, request ID, tracing, metrics)
//! - Serve until the shutdown signal fires

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::config::GatewayConfig;
use crate::dispatch::{Dispatcher, FallbackStrategy, ProcessorStrategy, Strategy};
use crate::health::HealthCache;
use crate::http::handlers::{create_payment, health, payments_summary, purge_payments, track_metrics};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::ShutdownSignal;
use crate::payments::{DeduplicationStore, SummaryStore};
use crate::processor::{HttpClientFactory, HttpPool, ProcessorClient};
use crate::resilience::CircuitBreakerRegistry;

/// Payment bodies are tiny; anything larger is rejected with 413.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub summary: Arc<SummaryStore>,
    pub dedup: Arc<DeduplicationStore>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub health: Arc<HealthCache>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Build every component the gateway needs from `config`.
    pub fn build(config: GatewayConfig) -> Self {
        let config = Arc::new(config);

        let pool = Arc::new(HttpPool::new(
            HttpClientFactory::new(config.pool.clone()),
            config.pool.size,
        ));
        let client = Arc::new(ProcessorClient::new(pool, &config.processors, &config.health));
        let health = Arc::new(HealthCache::new(client.clone(), &config.health));
        let breakers = Arc::new(CircuitBreakerRegistry::with_targets(
            config.circuit_breaker.clone(),
            config.processors.iter().map(|p| &p.name),
        ));
        let dedup = Arc::new(DeduplicationStore::new());

        let mut strategies: Vec<Arc<dyn Strategy>> = Vec::new();
        for processor in &config.processors {
            strategies.push(Arc::new(ProcessorStrategy::new(
                processor,
                Arc::clone(&client),
                Arc::clone(&health),
                breakers.get(&processor.name),
            )));
        }
        for fallback in &config.fallbacks {
            strategies.push(Arc::new(FallbackStrategy::from(fallback)));
        }
        let dispatcher = Arc::new(Dispatcher::new(strategies, Arc::clone(&dedup), &config.dispatch));

        Self {
            dispatcher,
            summary: Arc::new(SummaryStore::new()),
            dedup,
            breakers,
            health,
            config,
        }
    }
}

/// HTTP server for one gateway instance.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> Self {
        let state = AppState::build(config);
        let router = Self::build_router(&state);
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let mut router = Router::new()
            .route("/payments", post(create_payment))
            .route("/payments-summary", get(payments_summary))
            .route("/purge-payments", post(purge_payments))
            .route("/health", get(health));
        if state.config.admin.enabled {
            router = router.merge(admin::router(state.clone()));
        }

        router
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state.clone())
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .layer(TimeoutLayer::new(Duration::from_secs(state.config.timeouts.request_secs)))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// Serve until `shutdown` resolves.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            strategies = ?self.state.dispatcher.strategy_names(),
            "Gateway starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}
