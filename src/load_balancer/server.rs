//! HTTP front end of the load balancer.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::BalancerConfig;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::proxy::{FailoverProxy, ProxyError};
use crate::observability::metrics;

/// HTTP server wrapping a [`FailoverProxy`].
pub struct BalancerServer {
    router: Router,
    proxy: Arc<FailoverProxy>,
}

impl BalancerServer {
    pub fn new(config: BalancerConfig) -> Result<Self, ProxyError> {
        let proxy = Arc::new(FailoverProxy::new(&config)?);
        let router = Router::new()
            .fallback(proxy_handler)
            .with_state(Arc::clone(&proxy))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            );
        Ok(Self { router, proxy })
    }

    /// Serve until `shutdown` resolves.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let backends: Vec<&str> = self.proxy.backends().iter().map(|b| b.label()).collect();
        tracing::info!(address = %addr, ?backends, "Load balancer starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!("Load balancer stopped");
        Ok(())
    }
}

async fn proxy_handler(State(proxy): State<Arc<FailoverProxy>>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    tracing::debug!(
        request_id = %request_id(request.headers()),
        method = %method,
        path = %request.uri().path(),
        "Proxying request"
    );

    let response = proxy.forward(request).await;
    metrics::record_request(&method, "proxy", response.status().as_u16(), start);
    response
}
