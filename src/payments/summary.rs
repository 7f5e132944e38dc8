//! Running totals for `GET /payments-summary`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

use crate::payments::types::SummaryBucket;

/// Totals for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorSummary {
    pub total_requests: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

/// Response body of `GET /payments-summary`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentsSummary {
    pub default: ProcessorSummary,
    pub fallback: ProcessorSummary,
}

/// Optional `from`/`to` window. Parsed and validated, not applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Aggregate of every freshly committed payment.
#[derive(Debug, Default)]
pub struct SummaryStore {
    inner: RwLock<PaymentsSummary>,
}

impl SummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, bucket: SummaryBucket, amount: Decimal) {
        let mut summary = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let slot = match bucket {
            SummaryBucket::Default => &mut summary.default,
            SummaryBucket::Fallback => &mut summary.fallback,
        };
        slot.total_requests += 1;
        slot.total_amount += amount;
    }

    pub fn snapshot(&self) -> PaymentsSummary {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = PaymentsSummary::default();
    }
}
