//! Fan-out race over payment strategies.
//!
//! # Data Flow
//! ```text
//! POST /payments
//!     → Dispatcher::dispatch(payment)
//!     → DeduplicationStore::claim(correlation_id)
//!         committed → replay stored result
//!         in flight → wait for the owner's result
//!         owner     → race:
//!             spawn every Strategy (bounded channel, capacity = strategy count)
//!             first delivered result wins
//!             cancel signal → losers stop at their next checkpoint
//!             losers drained in the background, aborted after the grace period
//!         → commit winner → respond
//! ```
//!
//! # Design Decisions
//! - Strategies never report errors into the race; they deliver or abstain
//! - A local fallback strategy bounds latency and guarantees a winner
//! - The whole race is bounded by `dispatch.deadline_ms`

pub mod dispatcher;
pub mod strategy;

pub use dispatcher::{Dispatch, DispatchError, Dispatcher};
pub use strategy::{CancelSignal, FallbackStrategy, ProcessorStrategy, Strategy};
