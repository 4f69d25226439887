//! Rule CRUD and inspection endpoints (§6). Grounded on
//! `crates/server/src/anomaly_rules/crud.rs`'s handler shape: state
//! extraction, typed bodies, `StatusCode` for 4xx/5xx, JSON everywhere else.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use stupid_core::alert_rule::AlertRule;
use stupid_core::log_record::LogRecord;
use stupid_rules::alert_evaluator::test_rule;
use stupid_rules::alert_validation::{
    filter, generate_id, get_rule_template, statistics, RuleFilter,
};

use super::envelope::{ApiError, Envelope};
use super::state::AlertAppState;

/// `GET /api/v1/rules`
#[utoipa::path(get, path = "/api/v1/rules", responses((status = 200, body = Object)))]
pub async fn list_rules(
    State(state): State<Arc<AlertAppState>>,
) -> Result<Json<Envelope<Vec<AlertRule>>>, ApiError> {
    Ok(Json(Envelope::ok(state.engine.list_rules().await)))
}

/// `POST /api/v1/rules`
#[utoipa::path(post, path = "/api/v1/rules", responses((status = 201, body = Object)))]
pub async fn create_rule(
    State(state): State<Arc<AlertAppState>>,
    Json(mut rule): Json<AlertRule>,
) -> Result<(StatusCode, Json<Envelope<AlertRule>>), ApiError> {
    if rule.id.trim().is_empty() {
        rule.id = generate_id(&rule.name);
    }
    let saved = state.engine.add_rule(rule).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(saved))))
}

/// `GET /api/v1/rules/{id}`
#[utoipa::path(get, path = "/api/v1/rules/{id}", responses((status = 200, body = Object)))]
pub async fn get_rule(
    State(state): State<Arc<AlertAppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<AlertRule>>, ApiError> {
    match state.engine.get_rule(&id).await {
        Some(rule) => Ok(Json(Envelope::ok(rule))),
        None => Err(ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("rule not found: {id}"),
        }),
    }
}

/// `PUT /api/v1/rules/{id}`
#[utoipa::path(put, path = "/api/v1/rules/{id}", responses((status = 200, body = Object)))]
pub async fn update_rule(
    State(state): State<Arc<AlertAppState>>,
    Path(id): Path<String>,
    Json(mut rule): Json<AlertRule>,
) -> Result<Json<Envelope<AlertRule>>, ApiError> {
    rule.id = id;
    let saved = state.engine.update_rule(rule).await?;
    Ok(Json(Envelope::ok(saved)))
}

/// `DELETE /api/v1/rules/{id}`
#[utoipa::path(delete, path = "/api/v1/rules/{id}", responses((status = 204)))]
pub async fn delete_rule(
    State(state): State<Arc<AlertAppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_rule(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/rules/stats`
#[utoipa::path(get, path = "/api/v1/rules/stats", responses((status = 200)))]
pub async fn rule_stats(
    State(state): State<Arc<AlertAppState>>,
) -> Json<Envelope<stupid_rules::alert_validation::RuleStatistics>> {
    let rules = state.engine.list_rules().await;
    Json(Envelope::ok(statistics(&rules)))
}

/// `GET /api/v1/rules/template`
#[utoipa::path(get, path = "/api/v1/rules/template", responses((status = 200, body = Object)))]
pub async fn rule_template() -> Json<Envelope<AlertRule>> {
    Json(Envelope::ok(get_rule_template()))
}

/// `GET /api/v1/rules/defaults`
#[utoipa::path(get, path = "/api/v1/rules/defaults", responses((status = 200, body = Object)))]
pub async fn rule_defaults() -> Json<Envelope<Vec<AlertRule>>> {
    Json(Envelope::ok(stupid_rules::alert_validation::create_default_rules()))
}

#[derive(Debug, Serialize)]
pub struct BulkResult {
    pub created: Vec<AlertRule>,
    pub errors: Vec<BulkError>,
}

#[derive(Debug, Serialize)]
pub struct BulkError {
    pub index: usize,
    pub error: String,
}

/// `POST /api/v1/rules/bulk` — partial success: every rule is attempted
/// independently, errors collected rather than aborting the batch.
#[utoipa::path(post, path = "/api/v1/rules/bulk", responses((status = 200, body = Object)))]
pub async fn bulk_create(
    State(state): State<Arc<AlertAppState>>,
    Json(rules): Json<Vec<AlertRule>>,
) -> (StatusCode, Json<Envelope<BulkResult>>) {
    let mut created = Vec::new();
    let mut errors = Vec::new();
    for (index, mut rule) in rules.into_iter().enumerate() {
        if rule.id.trim().is_empty() {
            rule.id = generate_id(&rule.name);
        }
        match state.engine.add_rule(rule).await {
            Ok(saved) => created.push(saved),
            Err(e) => errors.push(BulkError { index, error: e.to_string() }),
        }
    }
    let status = if errors.is_empty() { StatusCode::CREATED } else { StatusCode::MULTI_STATUS };
    (status, Json(Envelope::ok(BulkResult { created, errors })))
}

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
}

/// `POST /api/v1/rules/filter`
#[utoipa::path(post, path = "/api/v1/rules/filter", responses((status = 200, body = Object)))]
pub async fn filter_rules(
    State(state): State<Arc<AlertAppState>>,
    Json(req): Json<FilterRequest>,
) -> Json<Envelope<Vec<AlertRule>>> {
    let rules = state.engine.list_rules().await;
    let spec = RuleFilter {
        enabled: req.enabled,
        namespace: req.namespace,
        service: req.service,
        severity: req.severity,
        log_level: req.log_level,
    };
    Json(Envelope::ok(filter(&rules, &spec)))
}

#[derive(Debug, Deserialize)]
pub struct TestRuleRequest {
    pub conditions: stupid_core::alert_rule::Conditions,
    pub sample_logs: Vec<LogRecord>,
}

/// `POST /api/v1/rules/test` — stateless dry-run, never touches the store.
#[utoipa::path(post, path = "/api/v1/rules/test", responses((status = 200)))]
pub async fn test_rule_handler(
    Json(req): Json<TestRuleRequest>,
) -> Json<Envelope<stupid_rules::alert_evaluator::TestReport>> {
    let report = test_rule(&req.conditions, req.conditions.threshold, &req.sample_logs);
    Json(Envelope::ok(report))
}

/// `POST /api/v1/rules/reload` — reread every rule from the store,
/// replacing the working set atomically.
#[utoipa::path(post, path = "/api/v1/rules/reload", responses((status = 200)))]
pub async fn reload_rules(
    State(state): State<Arc<AlertAppState>>,
) -> Result<Json<Envelope<usize>>, ApiError> {
    state.engine.reload_rules().await?;
    let count = state.engine.list_rules().await.len();
    Ok(Json(Envelope::ok_with_message(count, "rules reloaded")))
}
