use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::health::HealthSnapshot;
use crate::http::server::AppState;
use crate::payments::{PaymentStatus, PaymentsSummary};
use crate::resilience::CircuitSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub strategies: Vec<String>,
    pub dedup_entries: usize,
    pub summary: PaymentsSummary,
}

#[derive(Serialize)]
pub struct DedupStats {
    pub entries: usize,
    pub in_flight: usize,
}

/// A committed result with the fields the public body hides.
#[derive(Serialize)]
pub struct DedupEntryView {
    pub id: String,
    pub status: PaymentStatus,
    pub message: String,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        strategies: state
            .dispatcher
            .strategy_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        dedup_entries: state.dedup.len(),
        summary: state.summary.snapshot(),
    })
}

pub async fn get_circuit_breakers(State(state): State<AppState>) -> Json<Vec<CircuitSnapshot>> {
    Json(state.breakers.snapshots())
}

pub async fn get_health_cache(State(state): State<AppState>) -> Json<Vec<HealthSnapshot>> {
    Json(state.health.snapshots().await)
}

pub async fn get_dedup_stats(State(state): State<AppState>) -> Json<DedupStats> {
    Json(DedupStats {
        entries: state.dedup.len(),
        in_flight: state.dedup.in_flight(),
    })
}

pub async fn get_dedup_entry(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> Result<Json<DedupEntryView>, StatusCode> {
    let entry = state.dedup.entry(&correlation_id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(DedupEntryView {
        id: entry.result.id,
        status: entry.result.status,
        message: entry.result.message,
        source: entry.result.source,
        recorded_at: entry.recorded_at,
    }))
}
