//! Failover load balancer.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (axum fallback handler, request ID, tracing)
//!     → proxy.rs (buffer body)
//!     → round_robin.rs (shared atomic cursor picks backend i)
//!     → backend.rs (rewrite URI onto backend i)
//!     → forward under the per-attempt timeout
//!         transport error / timeout → retry once on backend (i + 1) mod n
//!         any HTTP response, including 5xx → returned as-is
//!     → both attempts failed → 503
//! ```
//!
//! # Design Decisions
//! - Stateless: no health tracking, no sticky sessions
//! - Backends are a fixed list from configuration

pub mod backend;
pub mod proxy;
pub mod round_robin;
pub mod server;

pub use backend::Backend;
pub use proxy::{FailoverProxy, ProxyError};
pub use round_robin::RoundRobin;
pub use server::BalancerServer;

/// Picks the index of the next backend to try.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// `None` only when `len` is zero.
    fn next_index(&self, len: usize) -> Option<usize>;
}
