//! Resilient payment gateway library.
//!
//! A gateway instance answers `POST /payments` by racing downstream
//! processors (guarded by health cache, circuit breaker and connection pool)
//! against a local fallback, committing the first result per correlation id.
//! A separate failover load balancer spreads traffic over gateway instances.

pub mod admin;
pub mod config;
pub mod dispatch;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod payments;
pub mod processor;
pub mod resilience;

pub use config::{BalancerConfig, GatewayConfig};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use load_balancer::BalancerServer;
