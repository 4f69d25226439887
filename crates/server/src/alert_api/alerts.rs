//! Recent-alerts endpoint (§6).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use stupid_core::alert_rule::Alert;

use super::envelope::{ApiError, Envelope};
use super::state::AlertAppState;

#[derive(Debug, Deserialize)]
pub struct RecentAlertsQuery {
    limit: Option<usize>,
}

const DEFAULT_RECENT_LIMIT: usize = 50;

/// `GET /api/v1/alerts/recent?limit=N`
#[utoipa::path(get, path = "/api/v1/alerts/recent", responses((status = 200, body = Object)))]
pub async fn recent_alerts(
    State(state): State<Arc<AlertAppState>>,
    Query(q): Query<RecentAlertsQuery>,
) -> Result<Json<Envelope<Vec<Alert>>>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let alerts = state.store.list_recent_alerts(limit).await?;
    Ok(Json(Envelope::ok(alerts)))
}
