//! A single structured log event consumed from the ingest bus.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workload identity attached to a log record: namespace, pod, container,
/// plus whatever labels the producer attached.
///
/// Each accessor resolves through a priority list of aliases because
/// producers disagree on field names (top-level field, a typed nested
/// field, a legacy label) — this is the one place that disagreement is
/// absorbed so the rest of the engine only ever sees one resolved string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkloadIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

impl WorkloadIdentity {
    fn first_non_empty(candidates: &[Option<&str>]) -> String {
        candidates
            .iter()
            .flatten()
            .find(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    /// Resolved namespace: top-level `namespace`, then `kubernetes_namespace`,
    /// then `labels["namespace"]`.
    pub fn namespace(&self) -> String {
        Self::first_non_empty(&[
            self.namespace.as_deref(),
            self.kubernetes_namespace.as_deref(),
            self.labels.get("namespace").map(String::as_str),
        ])
    }

    /// Resolved pod name: top-level `pod`, then `pod_name`, then
    /// `labels["pod"]`.
    pub fn pod_name(&self) -> String {
        Self::first_non_empty(&[
            self.pod.as_deref(),
            self.pod_name.as_deref(),
            self.labels.get("pod").map(String::as_str),
        ])
    }

    /// Resolved container name: top-level `container`, then
    /// `container_name`, then `labels["container"]`.
    pub fn container_name(&self) -> String {
        Self::first_non_empty(&[
            self.container.as_deref(),
            self.container_name.as_deref(),
            self.labels.get("container").map(String::as_str),
        ])
    }

    /// Resolved service name: `labels["app"]`, then `labels["service"]`.
    /// This is the priority order §3 specifies for condition matching.
    pub fn service(&self) -> String {
        Self::first_non_empty(&[
            self.labels.get("app").map(String::as_str),
            self.labels.get("service").map(String::as_str),
        ])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub workload: WorkloadIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl LogRecord {
    pub const DEFAULT_LEVEL: &'static str = "INFO";

    /// Structurally valid iff message and resolved namespace are both
    /// non-empty. Level and timestamp are coerced, not rejected — see
    /// `sanitize`.
    pub fn is_valid(&self) -> bool {
        !self.message.is_empty() && !self.workload.namespace().is_empty()
    }

    /// Coerce a decoded-but-unsanitized record in place: empty level becomes
    /// `INFO`; a zero/epoch timestamp becomes `now`.
    pub fn sanitize(&mut self) {
        if self.level.is_empty() {
            self.level = Self::DEFAULT_LEVEL.to_string();
        }
        if self.timestamp.timestamp() == 0 {
            self.timestamp = Utc::now();
        }
    }

    pub fn namespace(&self) -> String {
        self.workload.namespace()
    }

    pub fn service(&self) -> String {
        self.workload.service()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_with(field: &str, value: &str) -> WorkloadIdentity {
        let mut w = WorkloadIdentity::default();
        match field {
            "namespace" => w.namespace = Some(value.to_string()),
            "kubernetes_namespace" => w.kubernetes_namespace = Some(value.to_string()),
            _ => unreachable!(),
        }
        w
    }

    #[test]
    fn namespace_prefers_top_level() {
        let mut w = identity_with("namespace", "prod");
        w.kubernetes_namespace = Some("legacy".to_string());
        assert_eq!(w.namespace(), "prod");
    }

    #[test]
    fn namespace_falls_back_to_legacy_alias() {
        let w = identity_with("kubernetes_namespace", "legacy-ns");
        assert_eq!(w.namespace(), "legacy-ns");
    }

    #[test]
    fn namespace_falls_back_to_label() {
        let mut w = WorkloadIdentity::default();
        w.labels.insert("namespace".to_string(), "from-label".to_string());
        assert_eq!(w.namespace(), "from-label");
    }

    #[test]
    fn service_prefers_app_label_over_service_label() {
        let mut w = WorkloadIdentity::default();
        w.labels.insert("app".to_string(), "user-service".to_string());
        w.labels.insert("service".to_string(), "other".to_string());
        assert_eq!(w.service(), "user-service");
    }

    #[test]
    fn service_falls_back_when_app_label_absent() {
        let mut w = WorkloadIdentity::default();
        w.labels.insert("version".to_string(), "1.0".to_string());
        assert_eq!(w.service(), "");
    }

    #[test]
    fn sanitize_defaults_empty_level() {
        let mut r = LogRecord {
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            level: String::new(),
            message: "hi".to_string(),
            workload: WorkloadIdentity::default(),
            hostname: None,
        };
        r.sanitize();
        assert_eq!(r.level, "INFO");
        assert!(r.timestamp.timestamp() > 0);
    }

    #[test]
    fn validity_requires_message_and_namespace() {
        let mut r = LogRecord {
            timestamp: Utc::now(),
            level: "ERROR".to_string(),
            message: String::new(),
            workload: identity_with("namespace", "prod"),
            hostname: None,
        };
        assert!(!r.is_valid());
        r.message = "boom".to_string();
        assert!(r.is_valid());
        r.workload = WorkloadIdentity::default();
        assert!(!r.is_valid());
    }
}
