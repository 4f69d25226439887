//! HTTP control plane for the alerting engine (§6). A self-contained
//! surface kept apart from the rest of this crate's routes and state.

pub mod alerts;
pub mod doc;
pub mod envelope;
pub mod rules;
pub mod state;
pub mod system;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use state::AlertAppState;

/// Builds the `/api/v1/...` router. Mounted standalone by the alert-server
/// binary; CORS is permissive so browser-based dashboards can call it
/// directly.
pub fn router(state: Arc<AlertAppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(system::health))
        .route(
            "/api/v1/rules",
            get(rules::list_rules).post(rules::create_rule),
        )
        .route(
            "/api/v1/rules/{id}",
            get(rules::get_rule).put(rules::update_rule).delete(rules::delete_rule),
        )
        .route("/api/v1/rules/stats", get(rules::rule_stats))
        .route("/api/v1/rules/template", get(rules::rule_template))
        .route("/api/v1/rules/defaults", get(rules::rule_defaults))
        .route("/api/v1/rules/bulk", post(rules::bulk_create))
        .route("/api/v1/rules/filter", post(rules::filter_rules))
        .route("/api/v1/rules/test", post(rules::test_rule_handler))
        .route("/api/v1/rules/reload", post(rules::reload_rules))
        .route("/api/v1/alerts/recent", get(alerts::recent_alerts))
        .route("/api/v1/system/metrics", get(system::system_metrics))
        .route("/api/v1/system/logs/stats", get(system::logs_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(Scalar::with_url("/docs", doc::ApiDoc::openapi()))
}
