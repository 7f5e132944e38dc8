//! Health caching subsystem.
//!
//! # Data Flow
//! ```text
//! ProcessorStrategy
//!     → HealthCache::is_healthy(target)
//!         fresh record (< window)  → cached answer, no I/O
//!         stale or missing record  → HealthProbe::probe(target) → store → answer
//! ```
//!
//! # Design Decisions
//! - Probe traffic is bounded by the window, not by inbound request volume
//! - One in-flight probe per target; concurrent callers wait for its answer
//! - Any probe failure reads as unhealthy

pub mod cache;

pub use cache::{HealthCache, HealthProbe, HealthSnapshot};
