//! OpenAPI documentation aggregator.
//!
//! Collects all `#[utoipa::path]`-annotated handlers into a single OpenAPI
//! 3.1 spec, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "log-alert-engine API",
        version = "0.1.0",
        description = "Real-time log alerting: rule CRUD, alert history, and operational metrics.",
    ),
    tags(
        (name = "Health", description = "Server and store readiness"),
        (name = "Rules", description = "Alert rule CRUD, bulk import, filtering, and dry-run testing"),
        (name = "Alerts", description = "Recent fired alerts"),
        (name = "System", description = "Rule-tracker metrics and ingested-log statistics"),
    ),
    paths(
        crate::alert_api::system::health,
        crate::alert_api::rules::list_rules,
        crate::alert_api::rules::create_rule,
        crate::alert_api::rules::get_rule,
        crate::alert_api::rules::update_rule,
        crate::alert_api::rules::delete_rule,
        crate::alert_api::rules::rule_stats,
        crate::alert_api::rules::rule_template,
        crate::alert_api::rules::rule_defaults,
        crate::alert_api::rules::bulk_create,
        crate::alert_api::rules::filter_rules,
        crate::alert_api::rules::test_rule_handler,
        crate::alert_api::rules::reload_rules,
        crate::alert_api::alerts::recent_alerts,
        crate::alert_api::system::system_metrics,
        crate::alert_api::system::logs_stats,
    )
)]
pub struct ApiDoc;
