//! Payment domain: request/result types, idempotency and totals.

pub mod dedup;
pub mod summary;
pub mod types;

pub use dedup::{Claim, DedupEntry, DeduplicationStore};
pub use summary::{PaymentsSummary, ProcessorSummary, SummaryQuery, SummaryStore};
pub use types::{
    CorrelationId, PaymentRequest, PaymentStatus, PaymentValidationError, StrategyResult,
    SummaryBucket,
};
