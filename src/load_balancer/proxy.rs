//! Round-robin forwarding with a single failover retry.

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use thiserror::Error;

use crate::config::BalancerConfig;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::round_robin::RoundRobin;
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::resilience::{call_with_timeout, CallError};

/// Failure to build the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no backends configured")]
    NoBackends,

    #[error("invalid backend '{url}': {reason}")]
    InvalidBackend { url: String, reason: String },
}

/// Transport-level failure of one upstream exchange.
#[derive(Debug, Error)]
enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("response body failed: {0}")]
    Body(#[from] axum::Error),
}

/// Stateless proxy over a fixed backend list.
#[derive(Debug)]
pub struct FailoverProxy {
    backends: Vec<Backend>,
    balancer: Box<dyn LoadBalancer>,
    client: Client<HttpConnector, Body>,
    attempt_timeout: Duration,
    max_body_bytes: usize,
}

impl FailoverProxy {
    pub fn new(config: &BalancerConfig) -> Result<Self, ProxyError> {
        let backends = config
            .backends
            .iter()
            .map(|raw| Backend::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        if backends.is_empty() {
            return Err(ProxyError::NoBackends);
        }

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            backends,
            balancer: Box::new(RoundRobin::new()),
            client,
            attempt_timeout: config.attempt_timeout(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Forward `request` to the next backend, retrying once on the one after
    /// it if the first attempt fails at the transport level.
    ///
    /// The attempt timeout covers the whole exchange, response body included.
    pub async fn forward(&self, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        let body = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to buffer request body");
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
        };

        let len = self.backends.len();
        let Some(first) = self.balancer.next_index(len) else {
            return service_unavailable();
        };

        for (attempt, index) in [first, (first + 1) % len].into_iter().enumerate() {
            let backend = &self.backends[index];
            let upstream = match build_request(backend, &parts, body.clone()) {
                Ok(upstream) => upstream,
                Err(e) => {
                    tracing::error!(backend = backend.label(), error = %e, "Failed to build upstream request");
                    return (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response();
                }
            };

            match call_with_timeout(self.attempt_timeout, self.exchange(upstream)).await {
                Ok(response) => {
                    metrics::record_proxy_attempt(backend.label(), "ok");
                    return response;
                }
                Err(e) => {
                    let outcome = match e {
                        CallError::TimedOut(_) => "timeout",
                        CallError::Failed(_) => "transport",
                    };
                    metrics::record_proxy_attempt(backend.label(), outcome);
                    tracing::warn!(
                        backend = backend.label(),
                        attempt = attempt + 1,
                        method = %parts.method,
                        path = %parts.uri.path(),
                        error = %e,
                        "Upstream attempt failed"
                    );
                }
            }
        }

        tracing::error!(method = %parts.method, path = %parts.uri.path(), "All upstream attempts failed");
        service_unavailable()
    }

    /// One request/response round trip, with the body read to the end.
    async fn exchange(&self, upstream: Request<Body>) -> Result<Response, UpstreamError> {
        let response = self.client.request(upstream).await?;
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), usize::MAX).await?;
        Ok(Response::from_parts(parts, Body::from(body)))
    }
}

fn build_request(backend: &Backend, parts: &Parts, body: Bytes) -> Result<Request<Body>, axum::http::Error> {
    let mut builder = Request::builder()
        .method(parts.method.clone())
        .uri(backend.uri_for(&parts.uri)?);
    if let Some(headers) = builder.headers_mut() {
        headers.extend(parts.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    builder.body(Body::from(body))
}

fn service_unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
}
