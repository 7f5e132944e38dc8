//! Gateway request handlers.

use axum::{
    body::{Body, Bytes},
    extract::{rejection::QueryRejection, MatchedPath, Query, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
    Json,
};
use serde_json::{json, Value};
use std::time::Instant;

use crate::config::DuplicatePolicy;
use crate::http::request::request_id;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::payments::{PaymentRequest, PaymentsSummary, StrategyResult, SummaryQuery};

/// `POST /payments`
pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StrategyResult>, ApiError> {
    let payment = PaymentRequest::from_json(&body)?;
    tracing::debug!(
        request_id = %request_id(&headers),
        correlation_id = %payment.correlation_id,
        amount = %payment.amount,
        "Payment received"
    );

    let dispatch = state.dispatcher.dispatch(&payment).await?;
    if dispatch.replayed {
        if state.config.dispatch.duplicate_policy == DuplicatePolicy::Conflict {
            return Err(ApiError::Conflict(payment.correlation_id.to_string()));
        }
    } else {
        state.summary.record(dispatch.result.bucket, payment.amount);
    }

    Ok(Json(dispatch.result))
}

/// `GET /payments-summary`
///
/// `from`/`to` must be valid timestamps when present; they do not filter.
pub async fn payments_summary(
    State(state): State<AppState>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<PaymentsSummary>, ApiError> {
    let Query(window) = query.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    if window.from.is_some() || window.to.is_some() {
        tracing::debug!(from = ?window.from, to = ?window.to, "Summary window requested");
    }
    Ok(Json(state.summary.snapshot()))
}

/// `POST /purge-payments`
pub async fn purge_payments(State(state): State<AppState>) -> Json<Value> {
    state.summary.reset();
    tracing::info!("Payment summary purged");
    Json(json!({ "message": "Payments purged" }))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Route-level request metrics.
pub async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;
    metrics::record_request(&method, &route, response.status().as_u16(), start);
    response
}
