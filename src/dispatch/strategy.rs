//! Strategies that compete in a dispatch race.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::{FallbackConfig, ProcessorConfig};
use crate::health::HealthCache;
use crate::observability::metrics;
use crate::payments::{PaymentRequest, StrategyResult, SummaryBucket};
use crate::processor::ProcessorClient;
use crate::resilience::CircuitBreaker;

/// Receiving end of a race's cancel broadcast.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Whether the race already has a winner (or was dropped).
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once the race is over.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// One way of producing a result for a payment.
///
/// `attempt` returns `None` to abstain: unhealthy target, open circuit, failed
/// call or cancellation. Errors never reach the race.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, payment: &PaymentRequest, cancel: CancelSignal) -> Option<StrategyResult>;
}

/// Submits the payment to one downstream processor.
pub struct ProcessorStrategy {
    name: String,
    bucket: SummaryBucket,
    client: Arc<ProcessorClient>,
    health: Arc<HealthCache>,
    breaker: Arc<CircuitBreaker>,
}

impl ProcessorStrategy {
    pub fn new(
        config: &ProcessorConfig,
        client: Arc<ProcessorClient>,
        health: Arc<HealthCache>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            bucket: config.bucket,
            client,
            health,
            breaker,
        }
    }

    fn abstain(&self, payment: &PaymentRequest, reason: &'static str) -> Option<StrategyResult> {
        tracing::debug!(
            strategy = %self.name,
            correlation_id = %payment.correlation_id,
            reason,
            "Strategy abstained"
        );
        metrics::record_strategy_abstention(&self.name, reason);
        None
    }
}

#[async_trait]
impl Strategy for ProcessorStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, payment: &PaymentRequest, cancel: CancelSignal) -> Option<StrategyResult> {
        if cancel.is_cancelled() {
            return self.abstain(payment, "cancelled");
        }
        if !self.health.is_healthy(&self.name).await {
            return self.abstain(payment, "unhealthy");
        }
        if !self.breaker.can_execute() {
            return self.abstain(payment, "circuit_open");
        }
        if cancel.is_cancelled() {
            return self.abstain(payment, "cancelled");
        }

        // Once issued, the call runs to completion so the breaker sees its outcome.
        match self.client.submit(&self.name, payment).await {
            Ok(()) => {
                self.breaker.record_success();
                Some(StrategyResult::processed_by(payment, &self.name, self.bucket))
            }
            Err(e) => {
                self.breaker.record_failure();
                tracing::warn!(
                    strategy = %self.name,
                    correlation_id = %payment.correlation_id,
                    error = %e,
                    "Processor call failed"
                );
                self.abstain(payment, e.kind())
            }
        }
    }
}

/// Answers locally after a fixed delay. Always delivers unless cancelled.
#[derive(Debug, Clone)]
pub struct FallbackStrategy {
    tag: String,
    delay: Duration,
}

impl FallbackStrategy {
    pub fn new(tag: impl Into<String>, delay: Duration) -> Self {
        Self {
            tag: tag.into(),
            delay,
        }
    }
}

impl From<&FallbackConfig> for FallbackStrategy {
    fn from(config: &FallbackConfig) -> Self {
        Self::new(config.tag.clone(), config.delay())
    }
}

#[async_trait]
impl Strategy for FallbackStrategy {
    fn name(&self) -> &str {
        &self.tag
    }

    async fn attempt(&self, payment: &PaymentRequest, mut cancel: CancelSignal) -> Option<StrategyResult> {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => Some(StrategyResult::fallback(payment, &self.tag)),
            _ = cancel.cancelled() => {
                metrics::record_strategy_abstention(&self.tag, "cancelled");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HealthCacheConfig, PoolConfig};
    use crate::health::HealthProbe;
    use crate::processor::{HttpClientFactory, HttpPool};
    use crate::resilience::CircuitState;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn payment() -> PaymentRequest {
        PaymentRequest::new("f-1", dec!(3)).unwrap()
    }

    /// Fixed health answer after an optional delay, counting probes.
    struct FixedProbe {
        healthy: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HealthProbe for FixedProbe {
        async fn probe(&self, _target: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.healthy
        }
    }

    /// Downstream that answers `POST /payments` with `status` after `delay`.
    async fn processor(status: StatusCode, delay: Duration) -> (String, Arc<AtomicUsize>) {
        let payments = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&payments);
        let app = Router::new().route(
            "/payments",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), payments)
    }

    struct Harness {
        strategy: ProcessorStrategy,
        breaker: Arc<CircuitBreaker>,
        probe: Arc<FixedProbe>,
    }

    fn harness(base_url: &str, call_timeout_ms: u64, probe: FixedProbe, breaker: CircuitBreaker) -> Harness {
        let config = ProcessorConfig {
            name: "default".to_string(),
            base_url: base_url.to_string(),
            bucket: SummaryBucket::Default,
            call_timeout_ms,
        };
        let pool = Arc::new(HttpPool::new(HttpClientFactory::new(PoolConfig::default()), 1));
        let client = Arc::new(ProcessorClient::new(
            pool,
            std::slice::from_ref(&config),
            &HealthCacheConfig::default(),
        ));
        let probe = Arc::new(probe);
        let health = Arc::new(HealthCache::new(
            Arc::clone(&probe) as Arc<dyn HealthProbe>,
            &HealthCacheConfig::default(),
        ));
        let breaker = Arc::new(breaker);
        Harness {
            strategy: ProcessorStrategy::new(&config, client, health, Arc::clone(&breaker)),
            breaker,
            probe,
        }
    }

    fn probe(healthy: bool, delay_ms: u64) -> FixedProbe {
        FixedProbe {
            healthy,
            delay: Duration::from_millis(delay_ms),
            calls: AtomicUsize::new(0),
        }
    }

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new("default", threshold, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_processor_success_within_call_timeout() {
        let (url, payments) = processor(StatusCode::OK, Duration::from_millis(800)).await;
        let h = harness(&url, 1_500, probe(true, 0), breaker(5));
        let (_tx, rx) = watch::channel(false);

        let result = h.strategy.attempt(&payment(), CancelSignal::new(rx)).await.unwrap();
        assert_eq!(result.message, "Payment processed by default");
        assert_eq!(result.bucket, SummaryBucket::Default);
        assert_eq!(payments.load(Ordering::SeqCst), 1);
        assert_eq!(h.breaker.consecutive_failures(), 0);
        assert_eq!(h.breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_processor_already_cancelled_does_nothing() {
        let (url, payments) = processor(StatusCode::OK, Duration::ZERO).await;
        let h = harness(&url, 500, probe(true, 0), breaker(5));
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        assert!(h.strategy.attempt(&payment(), CancelSignal::new(rx)).await.is_none());
        assert_eq!(payments.load(Ordering::SeqCst), 0);
        assert_eq!(h.probe.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.breaker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_processor_cancelled_during_health_check_skips_call() {
        let (url, payments) = processor(StatusCode::OK, Duration::ZERO).await;
        let h = harness(&url, 500, probe(true, 100), breaker(5));
        let (tx, rx) = watch::channel(false);

        let cancel = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        };
        let p = payment();
        let (result, ()) = tokio::join!(h.strategy.attempt(&p, CancelSignal::new(rx)), cancel);

        assert!(result.is_none());
        assert_eq!(h.probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(payments.load(Ordering::SeqCst), 0);
        assert_eq!(h.breaker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_processor_unhealthy_abstains_without_touching_breaker() {
        let (url, payments) = processor(StatusCode::OK, Duration::ZERO).await;
        let h = harness(&url, 500, probe(false, 0), breaker(5));
        let (_tx, rx) = watch::channel(false);

        assert!(h.strategy.attempt(&payment(), CancelSignal::new(rx)).await.is_none());
        assert_eq!(payments.load(Ordering::SeqCst), 0);
        assert_eq!(h.breaker.consecutive_failures(), 0);
        assert_eq!(h.breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_processor_open_circuit_makes_no_call() {
        let (url, payments) = processor(StatusCode::OK, Duration::ZERO).await;
        let h = harness(&url, 500, probe(true, 0), breaker(1));
        h.breaker.record_failure();
        let (_tx, rx) = watch::channel(false);

        assert!(h.strategy.attempt(&payment(), CancelSignal::new(rx)).await.is_none());
        assert_eq!(payments.load(Ordering::SeqCst), 0);
        assert_eq!(h.breaker.consecutive_failures(), 1);
        assert_eq!(h.breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_processor_error_records_one_failure() {
        let (url, payments) = processor(StatusCode::INTERNAL_SERVER_ERROR, Duration::ZERO).await;
        let h = harness(&url, 500, probe(true, 0), breaker(5));
        let (_tx, rx) = watch::channel(false);

        assert!(h.strategy.attempt(&payment(), CancelSignal::new(rx)).await.is_none());
        assert_eq!(payments.load(Ordering::SeqCst), 1);
        assert_eq!(h.breaker.consecutive_failures(), 1);
        assert_eq!(h.breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_fallback_delivers_after_delay() {
        let (_tx, rx) = watch::channel(false);
        let strategy = FallbackStrategy::new("Local fallback", Duration::from_millis(20));

        let start = Instant::now();
        let result = strategy.attempt(&payment(), CancelSignal::new(rx)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(result.message, "Local fallback");
        assert_eq!(result.bucket, SummaryBucket::Fallback);
    }

    #[tokio::test]
    async fn test_fallback_stops_on_cancel() {
        let (tx, rx) = watch::channel(false);
        let strategy = FallbackStrategy::new("slow", Duration::from_secs(10));

        let attempt = tokio::spawn(async move { strategy.attempt(&payment(), CancelSignal::new(rx)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), attempt).await.unwrap().unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_dropped_sender_reads_as_cancelled() {
        let (tx, rx) = watch::channel(false);
        let signal = CancelSignal::new(rx);
        assert!(!signal.is_cancelled());
        drop(tx);
        assert!(signal.is_cancelled());
    }
}
