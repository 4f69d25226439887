//! Pure functions over `AlertRule` values: validation, ID generation,
//! defaults, filtering, and statistics (§4.3).

use chrono::Utc;
use stupid_core::alert_rule::{Actions, AlertRule, Conditions, Operator, Severity};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("threshold must be >= 1")]
    ThresholdTooLow,
    #[error("time_window must be > 0")]
    NonPositiveWindow,
    #[error("operator '{0}' is not one of gt, gte, lt, lte, eq")]
    InvalidOperator(String),
    #[error("severity '{0}' is not one of low, medium, high, critical")]
    InvalidSeverity(String),
}

/// Returns the first failing invariant, in the order §3 lists them.
pub fn validate(rule: &AlertRule) -> Result<(), RuleValidationError> {
    if rule.name.trim().is_empty() {
        return Err(RuleValidationError::EmptyName);
    }
    if rule.conditions.threshold < 1 {
        return Err(RuleValidationError::ThresholdTooLow);
    }
    if rule.conditions.time_window_secs <= 0 {
        return Err(RuleValidationError::NonPositiveWindow);
    }
    if Operator::parse(&rule.conditions.operator).is_none() {
        return Err(RuleValidationError::InvalidOperator(
            rule.conditions.operator.clone(),
        ));
    }
    if Severity::parse(&rule.actions.severity).is_none() {
        return Err(RuleValidationError::InvalidSeverity(
            rule.actions.severity.clone(),
        ));
    }
    Ok(())
}

/// Lowercase the name, keep `[a-z0-9-]` as-is, map each whitespace
/// character to one `-`, and drop every other character without leaving a
/// trace. No collapsing of adjacent dashes, no trimming.
///
/// This is the resolved form of the distillation's open question — see
/// DESIGN.md §Open Question 1 for the derivation against both source test
/// cases.
pub fn generate_id(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch.is_whitespace() {
            out.push('-');
        }
        // every other character is dropped
    }
    out
}

/// Three seed rules: an ERROR-rate rule, a database-FATAL rule, and a
/// memory-WARN rule. All enabled, timestamped, and passing `validate`.
pub fn create_default_rules() -> Vec<AlertRule> {
    let now = Utc::now();
    let mk = |name: &str, log_level: &str, keywords: Vec<&str>, threshold: i64, window: i64,
              severity: &str| {
        let id = generate_id(name);
        AlertRule {
            id,
            name: name.to_string(),
            description: String::new(),
            enabled: true,
            conditions: Conditions {
                log_level: Some(log_level.to_string()),
                namespace: None,
                service: None,
                keywords: keywords.into_iter().map(str::to_string).collect(),
                threshold,
                time_window_secs: window,
                operator: "gte".to_string(),
            },
            actions: Actions {
                channel: "#alerts".to_string(),
                severity: severity.to_string(),
            },
            created_at: now,
            updated_at: now,
        }
    };
    vec![
        mk("High Error Rate", "ERROR", vec![], 10, 300, "high"),
        mk("Database Fatal Errors", "FATAL", vec!["database"], 1, 60, "critical"),
        mk("High Memory Warnings", "WARN", vec!["memory"], 5, 300, "medium"),
    ]
}

/// An ID-less, name-less rule with sensible UI-prefill defaults.
pub fn get_rule_template() -> AlertRule {
    let now = Utc::now();
    AlertRule {
        id: String::new(),
        name: String::new(),
        description: String::new(),
        enabled: true,
        conditions: Conditions {
            log_level: Some("ERROR".to_string()),
            namespace: None,
            service: None,
            keywords: vec![],
            threshold: 5,
            time_window_secs: 300,
            operator: "gt".to_string(),
        },
        actions: Actions {
            channel: "#alerts".to_string(),
            severity: "medium".to_string(),
        },
        created_at: now,
        updated_at: now,
    }
}

/// Predicates for `filter`. Missing fields mean "any".
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub enabled: Option<bool>,
    pub namespace: Option<String>,
    pub service: Option<String>,
    pub severity: Option<String>,
    pub log_level: Option<String>,
}

impl RuleFilter {
    fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.namespace.is_none()
            && self.service.is_none()
            && self.severity.is_none()
            && self.log_level.is_none()
    }
}

/// Returns the sublist of `rules` matching every set predicate in `spec`.
/// An empty filter returns the input unchanged.
pub fn filter(rules: &[AlertRule], spec: &RuleFilter) -> Vec<AlertRule> {
    if spec.is_empty() {
        return rules.to_vec();
    }
    rules
        .iter()
        .filter(|r| {
            spec.enabled.map(|want| r.enabled == want).unwrap_or(true)
                && spec
                    .namespace
                    .as_deref()
                    .map(|want| r.conditions.namespace.as_deref() == Some(want))
                    .unwrap_or(true)
                && spec
                    .service
                    .as_deref()
                    .map(|want| r.conditions.service.as_deref() == Some(want))
                    .unwrap_or(true)
                && spec
                    .severity
                    .as_deref()
                    .map(|want| r.actions.severity == want)
                    .unwrap_or(true)
                && spec
                    .log_level
                    .as_deref()
                    .map(|want| r.conditions.log_level.as_deref() == Some(want))
                    .unwrap_or(true)
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RuleStatistics {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub by_severity: std::collections::HashMap<String, usize>,
    pub by_namespace: std::collections::HashMap<String, usize>,
    pub by_service: std::collections::HashMap<String, usize>,
}

/// Totals plus histograms by severity/namespace/service. Empty severity
/// counts as `medium`; empty namespace/service are not counted at all.
pub fn statistics(rules: &[AlertRule]) -> RuleStatistics {
    let mut stats = RuleStatistics {
        total: rules.len(),
        ..Default::default()
    };
    for r in rules {
        if r.enabled {
            stats.enabled += 1;
        } else {
            stats.disabled += 1;
        }
        let severity_key = if r.actions.severity.is_empty() {
            "medium"
        } else {
            r.actions.severity.as_str()
        };
        *stats.by_severity.entry(severity_key.to_string()).or_insert(0) += 1;

        if let Some(ns) = r.conditions.namespace.as_deref().filter(|s| !s.is_empty()) {
            *stats.by_namespace.entry(ns.to_string()).or_insert(0) += 1;
        }
        if let Some(svc) = r.conditions.service.as_deref().filter(|s| !s.is_empty()) {
            *stats.by_service.entry(svc.to_string()).or_insert(0) += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_rule() -> AlertRule {
        let now = Utc::now();
        AlertRule {
            id: "r1".to_string(),
            name: "My Rule".to_string(),
            description: String::new(),
            enabled: true,
            conditions: Conditions {
                log_level: Some("ERROR".to_string()),
                namespace: None,
                service: None,
                keywords: vec![],
                threshold: 1,
                time_window_secs: 60,
                operator: String::new(),
            },
            actions: Actions {
                channel: "#alerts".to_string(),
                severity: String::new(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn generate_id_mixed_punctuation_and_spaces() {
        assert_eq!(generate_id("Alert! @#$% Rule"), "alert--rule");
    }

    #[test]
    fn generate_id_pure_punctuation_vanishes() {
        assert_eq!(generate_id("!@#$%^&*()"), "");
    }

    #[test]
    fn generate_id_empty_stays_empty() {
        assert_eq!(generate_id(""), "");
    }

    #[test]
    fn generate_id_preserves_existing_dashes_and_digits() {
        assert_eq!(generate_id("api-v2 Errors"), "api-v2-errors");
    }

    #[test]
    fn validate_accepts_empty_operator_and_severity() {
        assert!(validate(&valid_rule()).is_ok());
    }

    #[test]
    fn validate_rejects_empty_name() {
        let mut r = valid_rule();
        r.name = "  ".to_string();
        assert_eq!(validate(&r), Err(RuleValidationError::EmptyName));
    }

    #[test]
    fn validate_rejects_zero_threshold() {
        let mut r = valid_rule();
        r.conditions.threshold = 0;
        assert_eq!(validate(&r), Err(RuleValidationError::ThresholdTooLow));
    }

    #[test]
    fn validate_rejects_nonpositive_window() {
        let mut r = valid_rule();
        r.conditions.time_window_secs = 0;
        assert_eq!(validate(&r), Err(RuleValidationError::NonPositiveWindow));
    }

    #[test]
    fn validate_rejects_bad_operator() {
        let mut r = valid_rule();
        r.conditions.operator = "bogus".to_string();
        assert!(matches!(validate(&r), Err(RuleValidationError::InvalidOperator(_))));
    }

    #[test]
    fn default_rules_all_pass_validation() {
        for r in create_default_rules() {
            assert!(validate(&r).is_ok(), "{} failed validation", r.name);
            assert!(r.enabled);
        }
    }

    #[test]
    fn empty_filter_returns_input_unchanged() {
        let rules = create_default_rules();
        let out = filter(&rules, &RuleFilter::default());
        assert_eq!(out.len(), rules.len());
    }

    #[test]
    fn filter_by_severity() {
        let rules = create_default_rules();
        let spec = RuleFilter {
            severity: Some("critical".to_string()),
            ..Default::default()
        };
        let out = filter(&rules, &spec);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].actions.severity, "critical");
    }

    #[test]
    fn statistics_counts_empty_severity_as_medium() {
        let mut r = valid_rule();
        r.actions.severity = String::new();
        let stats = statistics(&[r]);
        assert_eq!(stats.by_severity.get("medium"), Some(&1));
    }

    #[test]
    fn statistics_does_not_count_empty_namespace() {
        let r = valid_rule();
        let stats = statistics(&[r]);
        assert!(stats.by_namespace.is_empty());
    }
}
