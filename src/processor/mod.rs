//! Downstream payment processors.
//!
//! # Data Flow
//! ```text
//! ProcessorStrategy
//!     → ProcessorClient::submit(target, payment)
//!     → ConnectionPool::get_connection(target)   (round-robin over N clients)
//!     → POST {base_url}/payments
//!
//! HealthCache
//!     → ProcessorClient::probe(target)
//!     → GET {base_url}{health.path}
//! ```

pub mod client;
pub mod pool;
pub mod types;

pub use client::ProcessorClient;
pub use pool::{ConnectionPool, HandleFactory, HttpClientFactory, HttpPool, PoolError};
pub use types::{ProcessorError, ProcessorPayment, ServiceHealth};
