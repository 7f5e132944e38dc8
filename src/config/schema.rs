//! Configuration schema definitions.
//!
//! Two roots live here: [`GatewayConfig`] for a payment gateway instance and
//! [`BalancerConfig`] for the failover proxy fronting several instances.
//! All types derive Serde traits for deserialization from TOML files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for a payment gateway instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Server-side timeouts.
    pub timeouts: TimeoutConfig,

    /// Downstream payment processors, one real-call strategy each.
    pub processors: Vec<ProcessorConfig>,

    /// Deterministic local fallback strategies.
    pub fallbacks: Vec<FallbackConfig>,

    /// Race and deduplication behaviour.
    pub dispatch: DispatchConfig,

    /// Circuit breaker thresholds, shared by every processor target.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Health probe cache settings.
    pub health: HealthCacheConfig,

    /// Connection pool settings for downstream clients.
    pub pool: PoolConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            processors: vec![ProcessorConfig {
                name: "default".to_string(),
                base_url: "http://payment-processor-default:8080".to_string(),
                bucket: SummaryBucket::Default,
                call_timeout_ms: 500,
            }],
            fallbacks: vec![FallbackConfig {
                tag: "Local fallback".to_string(),
                delay_ms: 200,
            }],
            dispatch: DispatchConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            health: HealthCacheConfig::default(),
            pool: PoolConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Root configuration for the failover load balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream gateway instances, as base URLs.
    pub backends: Vec<String>,

    /// Hard timeout applied to every forwarding attempt.
    pub attempt_timeout_ms: u64,

    /// Largest request body buffered for a retry.
    pub max_body_bytes: usize,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            backends: vec![
                "http://api-gateway-1:9999".to_string(),
                "http://api-gateway-2:9999".to_string(),
            ],
            attempt_timeout_ms: 500,
            max_body_bytes: 1024 * 1024,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl BalancerConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9999").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9999".to_string(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 10 }
    }
}

/// Which half of the payments summary a committed result is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SummaryBucket {
    #[default]
    Default,
    Fallback,
}

/// A downstream payment processor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    /// Target name; keys the pool, breaker and health cache.
    pub name: String,

    /// Base URL, e.g. "http://payment-processor-default:8080".
    pub base_url: String,

    /// Summary bucket for payments this processor accepts.
    #[serde(default)]
    pub bucket: SummaryBucket,

    /// Hard per-call timeout in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_call_timeout_ms() -> u64 {
    500
}

impl ProcessorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// A deterministic local fallback strategy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    /// Message reported in the response.
    pub tag: String,

    /// Delay before the fallback delivers, in milliseconds.
    pub delay_ms: u64,
}

impl FallbackConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// How a request with an already-committed correlation id is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Replay the stored result with 200.
    #[default]
    Replay,
    /// Reject with 409 Conflict.
    Conflict,
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on waiting for the first strategy result.
    pub deadline_ms: u64,

    /// How long losing strategies may keep running before they are aborted.
    pub loser_grace_ms: u64,

    /// Answer for duplicate submissions.
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 1000,
            loser_grace_ms: 1500,
            duplicate_policy: DuplicatePolicy::Replay,
        }
    }
}

impl DispatchConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn loser_grace(&self) -> Duration {
        Duration::from_millis(self.loser_grace_ms)
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Time after the last failure before a trial call is allowed.
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Health cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCacheConfig {
    /// Probe downstream health at all; when false every target is healthy.
    pub enabled: bool,

    /// At most one real probe per target within this window.
    pub window_ms: u64,

    /// Hard timeout for a single probe.
    pub probe_timeout_ms: u64,

    /// Path of the downstream health endpoint.
    pub path: String,
}

impl Default for HealthCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 5000,
            probe_timeout_ms: 500,
            path: "/payments/service-health".to_string(),
        }
    }
}

impl HealthCacheConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Downstream connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Client handles created per target.
    pub size: usize,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Idle keep-alive connection lifetime in seconds.
    pub idle_timeout_secs: u64,

    /// Maximum idle connections kept per host by each handle.
    pub max_idle_per_host: usize,

    /// TCP keep-alive interval in seconds.
    pub tcp_keepalive_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 4,
            connect_timeout_ms: 250,
            idle_timeout_secs: 30,
            max_idle_per_host: 100,
            tcp_keepalive_secs: 30,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Full,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Shipped admin key; refused whenever the admin routes are enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes on the gateway listener.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
        }
    }
}
