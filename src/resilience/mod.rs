//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Real-call strategy:
//!     → circuit_breaker.rs (skip the call while the target's circuit is open)
//!     → timeouts.rs (hard deadline on the downstream call)
//!     → circuit_breaker.rs (record success / failure)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Per-target breakers; one target's failures never gate another
//! - Breaker locks are independent of every other shared structure

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitSnapshot, CircuitState};
pub use timeouts::{call_with_timeout, CallError};
