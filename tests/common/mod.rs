//! Shared utilities for integration tests.
//!
//! Every server binds `127.0.0.1:0`, so tests never collide on ports.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use resilient_gateway::config::{
    BalancerConfig, FallbackConfig, GatewayConfig, ProcessorConfig, SummaryBucket,
};
use resilient_gateway::http::AppState;
use resilient_gateway::lifecycle::Shutdown;
use resilient_gateway::{BalancerServer, GatewayServer};

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An address nothing is listening on.
pub fn dead_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// A backend that sends response headers, part of the body, then stalls.
/// Returns its address and the number of connections it accepted.
pub async fn start_stalling_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
                    .await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });
    (addr, accepted)
}

/// Knobs and counters of a mock payment processor.
#[derive(Debug)]
pub struct MockProcessor {
    pub addr: SocketAddr,
    payment_status: AtomicU16,
    payment_delay_ms: AtomicU64,
    failing: AtomicBool,
    payments: AtomicUsize,
    health_probes: AtomicUsize,
}

impl MockProcessor {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_payment_status(&self, status: u16) {
        self.payment_status.store(status, Ordering::SeqCst);
    }

    pub fn set_payment_delay(&self, delay: Duration) {
        self.payment_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn payments(&self) -> usize {
        self.payments.load(Ordering::SeqCst)
    }

    pub fn health_probes(&self) -> usize {
        self.health_probes.load(Ordering::SeqCst)
    }
}

async fn mock_payment(State(mock): State<Arc<MockProcessor>>, Json(body): Json<Value>) -> impl IntoResponse {
    mock.payments.fetch_add(1, Ordering::SeqCst);
    let delay = mock.payment_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let status = StatusCode::from_u16(mock.payment_status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "message": "payment processed", "echo": body })))
}

async fn mock_health(State(mock): State<Arc<MockProcessor>>) -> Json<Value> {
    mock.health_probes.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "failing": mock.failing.load(Ordering::SeqCst),
        "minResponseTime": 0,
    }))
}

/// Start a mock processor answering 200 and reporting itself healthy.
pub async fn start_mock_processor() -> Arc<MockProcessor> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mock = Arc::new(MockProcessor {
        addr: listener.local_addr().unwrap(),
        payment_status: AtomicU16::new(200),
        payment_delay_ms: AtomicU64::new(0),
        failing: AtomicBool::new(false),
        payments: AtomicUsize::new(0),
        health_probes: AtomicUsize::new(0),
    });

    let router = Router::new()
        .route("/payments", post(mock_payment))
        .route("/payments/service-health", get(mock_health))
        .with_state(Arc::clone(&mock));
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    mock
}

/// Start a backend whose every response comes from `f`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let router = Router::new().fallback(move || {
        let f = f.clone();
        async move {
            let (status, body) = f().await;
            (StatusCode::from_u16(status).unwrap_or(StatusCode::OK), body)
        }
    });
    serve(router).await
}

/// Start a backend that answers `"<name> <METHOD> <uri>"`.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    let router = Router::new().fallback(move |method: Method, uri: Uri| async move {
        format!("{name} {method} {uri}")
    });
    serve(router).await
}

/// A gateway with one processor at `processor_url` and one local fallback.
pub fn gateway_config(processor_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.processors = vec![ProcessorConfig {
        name: "default".to_string(),
        base_url: processor_url.to_string(),
        bucket: SummaryBucket::Default,
        call_timeout_ms: 500,
    }];
    config.fallbacks = vec![FallbackConfig {
        tag: "Local fallback".to_string(),
        delay_ms: 150,
    }];
    config.dispatch.deadline_ms = 1_000;
    config.dispatch.loser_grace_ms = 1_000;
    config.circuit_breaker.failure_threshold = 5;
    config.circuit_breaker.cooldown_ms = 30_000;
    config
}

/// A running gateway. Dropping it stops the server.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config);
    let state = server.state().clone();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });
    TestGateway {
        addr,
        state,
        _shutdown: shutdown,
    }
}

/// A running load balancer. Dropping it stops the server.
pub struct TestBalancer {
    pub addr: SocketAddr,
    _shutdown: Shutdown,
}

impl TestBalancer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_balancer(backends: &[SocketAddr]) -> TestBalancer {
    let config = BalancerConfig {
        backends: backends.iter().map(|a| format!("http://{a}")).collect(),
        attempt_timeout_ms: 500,
        ..BalancerConfig::default()
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = BalancerServer::new(config).unwrap();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });
    TestBalancer {
        addr,
        _shutdown: shutdown,
    }
}

/// Client that never reuses connections, so each request is independent.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
