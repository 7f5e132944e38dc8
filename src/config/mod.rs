//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig / BalancerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_balancer_config, load_gateway_config, ConfigError};
pub use schema::{
    AdminConfig, BalancerConfig, CircuitBreakerConfig, DispatchConfig, DuplicatePolicy,
    FallbackConfig, GatewayConfig, HealthCacheConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, PoolConfig, ProcessorConfig, SummaryBucket,
};
