//! Payment domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use crate::config::SummaryBucket;

/// Reasons an inbound payment is rejected before any dispatch work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentValidationError {
    #[error("malformed request body: {0}")]
    MalformedJson(String),

    #[error("correlationId is required")]
    MissingCorrelationId,

    #[error("amount is required")]
    MissingAmount,

    #[error("amount must be greater than zero")]
    NonPositiveAmount,
}

/// Caller-chosen idempotency key. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(raw: impl Into<String>) -> Result<Self, PaymentValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(PaymentValidationError::MissingCorrelationId);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPaymentRequest {
    #[serde(default)]
    correlation_id: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    amount: Option<Decimal>,
}

/// A validated inbound payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub correlation_id: CorrelationId,
    pub amount: Decimal,
}

impl PaymentRequest {
    pub fn new(correlation_id: impl Into<String>, amount: Decimal) -> Result<Self, PaymentValidationError> {
        let correlation_id = CorrelationId::new(correlation_id)?;
        if amount <= Decimal::ZERO {
            return Err(PaymentValidationError::NonPositiveAmount);
        }
        Ok(Self {
            correlation_id,
            amount,
        })
    }

    /// Decode and validate a `{ "correlationId", "amount" }` body.
    pub fn from_json(body: &[u8]) -> Result<Self, PaymentValidationError> {
        let raw: RawPaymentRequest = serde_json::from_slice(body)
            .map_err(|e| PaymentValidationError::MalformedJson(e.to_string()))?;
        let correlation_id = raw
            .correlation_id
            .ok_or(PaymentValidationError::MissingCorrelationId)?;
        let amount = raw.amount.ok_or(PaymentValidationError::MissingAmount)?;
        Self::new(correlation_id, amount)
    }
}

/// Terminal status reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Processed,
    Error,
}

/// The one result committed for a request.
///
/// Serializes to the public `{ "id", "status", "message" }` body; the
/// source tag and summary bucket stay internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyResult {
    pub id: String,
    pub status: PaymentStatus,
    pub message: String,
    #[serde(skip)]
    pub source: String,
    #[serde(skip)]
    pub bucket: SummaryBucket,
}

impl StrategyResult {
    /// A payment accepted by a downstream processor.
    pub fn processed_by(payment: &PaymentRequest, processor: &str, bucket: SummaryBucket) -> Self {
        Self {
            id: payment.correlation_id.to_string(),
            status: PaymentStatus::Processed,
            message: format!("Payment processed by {processor}"),
            source: processor.to_string(),
            bucket,
        }
    }

    /// A payment answered by a local fallback strategy.
    pub fn fallback(payment: &PaymentRequest, tag: &str) -> Self {
        Self {
            id: payment.correlation_id.to_string(),
            status: PaymentStatus::Processed,
            message: tag.to_string(),
            source: tag.to_string(),
            bucket: SummaryBucket::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_json() {
        let payment =
            PaymentRequest::from_json(br#"{"correlationId":"a-b-c","amount":19.90}"#).unwrap();
        assert_eq!(payment.correlation_id.as_str(), "a-b-c");
        assert_eq!(payment.amount, dec!(19.9));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            PaymentRequest::from_json(br#"{"amount":10}"#),
            Err(PaymentValidationError::MissingCorrelationId)
        );
        assert_eq!(
            PaymentRequest::from_json(br#"{"correlationId":"  ","amount":10}"#),
            Err(PaymentValidationError::MissingCorrelationId)
        );
        assert_eq!(
            PaymentRequest::from_json(br#"{"correlationId":"x"}"#),
            Err(PaymentValidationError::MissingAmount)
        );
        assert_eq!(
            PaymentRequest::from_json(br#"{"correlationId":"x","amount":0}"#),
            Err(PaymentValidationError::NonPositiveAmount)
        );
        assert_eq!(
            PaymentRequest::from_json(br#"{"correlationId":"x","amount":-3.5}"#),
            Err(PaymentValidationError::NonPositiveAmount)
        );
        assert!(matches!(
            PaymentRequest::from_json(b"{not json"),
            Err(PaymentValidationError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_result_body_hides_internal_fields() {
        let payment = PaymentRequest::new("id-1", dec!(10)).unwrap();
        let result = StrategyResult::fallback(&payment, "Local fallback");
        let body = serde_json::to_string(&result).unwrap();
        assert_eq!(
            body,
            r#"{"id":"id-1","status":"processed","message":"Local fallback"}"#
        );
        assert_eq!(result.bucket, SummaryBucket::Fallback);
    }
}
