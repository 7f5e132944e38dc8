//! Wire types for the downstream processor contract.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::payments::PaymentRequest;
use crate::processor::pool::PoolError;
use crate::resilience::CallError;

/// Body of `POST {base_url}/payments`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorPayment {
    pub correlation_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// ISO-8601 UTC with millisecond precision.
    pub requested_at: String,
}

impl ProcessorPayment {
    pub fn new(payment: &PaymentRequest, requested_at: DateTime<Utc>) -> Self {
        Self {
            correlation_id: payment.correlation_id.to_string(),
            amount: payment.amount,
            requested_at: requested_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Body of `GET {base_url}/payments/service-health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub failing: bool,
    #[serde(default)]
    pub min_response_time: Option<u64>,
}

/// A failed downstream call.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("unknown processor '{0}'")]
    UnknownTarget(String),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("processor answered {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<CallError<ProcessorError>> for ProcessorError {
    fn from(err: CallError<ProcessorError>) -> Self {
        match err {
            CallError::TimedOut(after) => ProcessorError::Timeout(after),
            CallError::Failed(inner) => inner,
        }
    }
}

impl ProcessorError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessorError::UnknownTarget(_) => "unknown_target",
            ProcessorError::Pool(_) => "pool",
            ProcessorError::Timeout(_) => "timeout",
            ProcessorError::Transport(_) => "transport",
            ProcessorError::Status(_) => "status",
            ProcessorError::Decode(_) => "decode",
        }
    }
}
