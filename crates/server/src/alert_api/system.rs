//! Health and observability endpoints (§6): store reachability, per-rule
//! evaluation performance, and the shared log-processing counters.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use stupid_core::alert_rule::LogStats;
use stupid_rules::alert_tracker::TrackerEntry;

use super::envelope::{ApiError, Envelope};
use super::state::AlertAppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub store_reachable: bool,
    pub timestamp: chrono::DateTime<Utc>,
}

/// `GET /api/v1/health`
#[utoipa::path(get, path = "/api/v1/health", responses((status = 200, body = Object)))]
pub async fn health(State(state): State<Arc<AlertAppState>>) -> (StatusCode, Json<Envelope<HealthReport>>) {
    let store_reachable = state.store.health_ping().await;
    let report = HealthReport { store_reachable, timestamp: Utc::now() };
    let status = if store_reachable { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(Envelope::ok(report)))
}

/// `GET /api/v1/system/metrics` — per-rule evaluation performance, keyed by
/// rule ID.
#[utoipa::path(get, path = "/api/v1/system/metrics", responses((status = 200, body = Object)))]
pub async fn system_metrics(
    State(state): State<Arc<AlertAppState>>,
) -> Json<Envelope<std::collections::HashMap<String, TrackerEntry>>> {
    Json(Envelope::ok(state.engine.tracker().snapshot()))
}

/// `GET /api/v1/system/logs/stats`
#[utoipa::path(get, path = "/api/v1/system/logs/stats", responses((status = 200, body = Object)))]
pub async fn logs_stats(
    State(state): State<Arc<AlertAppState>>,
) -> Result<Json<Envelope<LogStats>>, ApiError> {
    let stats = state.store.get_log_stats().await?;
    Ok(Json(Envelope::ok(stats)))
}
