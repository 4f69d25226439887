//! Rule data model: `AlertRule`, its conditions and actions, and the
//! transient records an evaluation produces (`AlertStatus`, `Alert`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comparison applied between the window count and the rule's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl Operator {
    /// Empty string defaults to `gt`, per §3.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "" | "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "eq" => Some(Operator::Eq),
            _ => None,
        }
    }

    pub fn triggered(self, count: i64, threshold: i64) -> bool {
        match self {
            Operator::Gt => count > threshold,
            Operator::Gte => count >= threshold,
            Operator::Lt => count < threshold,
            Operator::Lte => count <= threshold,
            Operator::Eq => count == threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Eq => "eq",
        }
    }
}

/// Severity tag on a rule's action. Empty is treated as `medium` for
/// aggregation purposes (statistics, presentation) but is a distinct stored
/// value from an explicit `medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse(raw: &str) -> Option<Option<Self>> {
        match raw {
            "" => Some(None),
            "low" => Some(Some(Severity::Low)),
            "medium" => Some(Some(Severity::Medium)),
            "high" => Some(Some(Severity::High)),
            "critical" => Some(Some(Severity::Critical)),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Resolve an optional stored severity to its effective value: empty
    /// counts as `medium` everywhere downstream logic reads severity.
    pub fn effective(stored: &str) -> Severity {
        match stored {
            "low" => Severity::Low,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }
}

/// Match conditions a log record is evaluated against. All fields are
/// optional; an entirely empty `Conditions` matches every well-formed log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    pub threshold: i64,
    pub time_window_secs: i64,
    #[serde(default)]
    pub operator: String,
}

/// What happens when a rule fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actions {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub severity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub conditions: Conditions,
    pub actions: Actions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl AlertRule {
    pub fn operator(&self) -> Operator {
        Operator::parse(&self.conditions.operator).unwrap_or(Operator::Gt)
    }

    pub fn severity(&self) -> Severity {
        Severity::effective(&self.actions.severity)
    }
}

/// Transient per-rule status, TTL = 1h from last write (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStatus {
    pub rule_id: String,
    pub last_trigger: Option<DateTime<Utc>>,
    pub window_count: i64,
    pub status: String,
}

impl AlertStatus {
    pub const ACTIVE: &'static str = "active";
    pub const RESOLVED: &'static str = "resolved";

    pub fn new(rule_id: impl Into<String>) -> Self {
        AlertStatus {
            rule_id: rule_id.into(),
            last_trigger: None,
            window_count: 0,
            status: Self::RESOLVED.to_string(),
        }
    }

    /// Whether `last_trigger` falls within the window starting at
    /// `window_start` — used to decide cooldown suppression (§9).
    pub fn triggered_in_window(&self, window_start: DateTime<Utc>, window_secs: i64) -> bool {
        match self.last_trigger {
            Some(t) => t >= window_start && t < window_start + chrono::Duration::seconds(window_secs),
            None => false,
        }
    }
}

use super::log_record::LogRecord;

/// Emitted instance of a rule firing. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub log: LogRecord,
    pub emitted_at: DateTime<Utc>,
    pub severity: String,
    /// The rule's configured destination (`AlertRule.actions.channel`).
    /// Empty means "use the notifier's default".
    #[serde(default)]
    pub channel: String,
    pub message: String,
    pub count: i64,
}

/// Shared observability counters, kept as a single JSON blob at `log_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogStats {
    pub total_processed: u64,
    pub total_decode_failures: u64,
    pub total_validation_failures: u64,
    pub total_matched: u64,
    pub total_alerts_emitted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_defaults_to_gt_on_empty() {
        assert_eq!(Operator::parse("").unwrap(), Operator::Gt);
    }

    #[test]
    fn operator_rejects_unknown() {
        assert!(Operator::parse("nope").is_none());
    }

    #[test]
    fn operator_boundaries() {
        assert!(!Operator::Gt.triggered(3, 3));
        assert!(Operator::Gte.triggered(3, 3));
        assert!(!Operator::Lt.triggered(3, 3));
        assert!(Operator::Lte.triggered(3, 3));
        assert!(Operator::Eq.triggered(3, 3));
    }

    #[test]
    fn severity_empty_is_medium_when_effective() {
        assert_eq!(Severity::effective(""), Severity::Medium);
        assert_eq!(Severity::effective("critical"), Severity::Critical);
    }

    #[test]
    fn alert_status_cooldown_window() {
        let mut s = AlertStatus::new("r1");
        let start = Utc::now();
        s.last_trigger = Some(start + chrono::Duration::seconds(10));
        assert!(s.triggered_in_window(start, 60));
        assert!(!s.triggered_in_window(start + chrono::Duration::seconds(120), 60));
    }
}
