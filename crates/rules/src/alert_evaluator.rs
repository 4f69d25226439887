//! The per-log evaluation algorithm (§4.4): condition match, counted
//! increment, threshold decision, and the stateless dry-run `test_rule`.

use std::sync::Arc;

use stupid_core::alert_rule::Conditions;
use stupid_core::log_record::LogRecord;
use stupid_core::store::{window_start_epoch, Store, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("counter increment failed: {0}")]
    CounterIncrement(#[from] StoreError),
}

/// Pure: same inputs always yield the same output, no store access.
/// Returns true iff every non-empty condition field matches the log. An
/// entirely empty condition matches every log.
pub fn match_condition(log: &LogRecord, condition: &Conditions) -> bool {
    if let Some(level) = &condition.log_level {
        if log.level != *level {
            return false;
        }
    }
    if let Some(ns) = &condition.namespace {
        if log.namespace() != *ns {
            return false;
        }
    }
    if let Some(svc) = &condition.service {
        if log.service() != *svc {
            return false;
        }
    }
    if !condition.keywords.is_empty() {
        let message_lower = log.message.to_lowercase();
        for kw in &condition.keywords {
            if !message_lower.contains(&kw.to_lowercase()) {
                return false;
            }
        }
    }
    true
}

/// Unconditionally increments the rule's current-window counter via the
/// store, then applies the operator against the returned count. A
/// counter-increment failure propagates as `EvaluatorError`; the engine is
/// the one that decides to skip the rule and keep evaluating the rest. The
/// window the counter belongs to is the store's own concern
/// (`Store::increment_counter` keys it off its own clock read), so this
/// takes no timestamp.
pub async fn check_threshold(
    store: &dyn Store,
    rule_id: &str,
    condition: &Conditions,
) -> Result<(bool, i64), EvaluatorError> {
    let count = store
        .increment_counter(rule_id, condition.time_window_secs)
        .await?;
    let operator = stupid_core::alert_rule::Operator::parse(&condition.operator)
        .unwrap_or(stupid_core::alert_rule::Operator::Gt);
    Ok((operator.triggered(count, condition.threshold), count))
}

/// Returns the current window's start, for callers that need to correlate
/// a just-incremented counter with its window (e.g. cooldown checks).
pub fn current_window_start(now_epoch_secs: i64, window_secs: i64) -> i64 {
    window_start_epoch(now_epoch_secs, window_secs)
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SampleResult {
    pub index: usize,
    pub matched: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TestReport {
    pub total: usize,
    pub matched: usize,
    /// `matched / total`; `0.0` when `total == 0` (resolved open question,
    /// see DESIGN.md).
    pub match_rate: f64,
    pub would_trigger: bool,
    pub samples: Vec<SampleResult>,
}

/// Stateless dry-run: never touches the store, never increments a counter.
pub fn test_rule(condition: &Conditions, threshold: i64, sample_logs: &[LogRecord]) -> TestReport {
    let samples: Vec<SampleResult> = sample_logs
        .iter()
        .enumerate()
        .map(|(index, log)| SampleResult {
            index,
            matched: match_condition(log, condition),
        })
        .collect();
    let matched = samples.iter().filter(|s| s.matched).count();
    let total = samples.len();
    let match_rate = if total == 0 {
        0.0
    } else {
        matched as f64 / total as f64
    };
    TestReport {
        total,
        matched,
        match_rate,
        would_trigger: matched as i64 >= threshold,
        samples,
    }
}

/// Shares a `Store` implementation across evaluator calls without forcing
/// callers to thread `&dyn Store` through every function.
pub type SharedStore = Arc<dyn Store>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stupid_core::log_record::WorkloadIdentity;

    fn log(level: &str, message: &str, namespace: &str) -> LogRecord {
        let mut w = WorkloadIdentity::default();
        w.namespace = Some(namespace.to_string());
        LogRecord {
            timestamp: Utc::now(),
            level: level.to_string(),
            message: message.to_string(),
            workload: w,
            hostname: None,
        }
    }

    #[test]
    fn empty_condition_matches_everything() {
        let cond = Conditions::default();
        assert!(match_condition(&log("INFO", "anything", "ns"), &cond));
    }

    #[test]
    fn log_level_is_case_sensitive_exact_match() {
        let mut cond = Conditions::default();
        cond.log_level = Some("ERROR".to_string());
        assert!(match_condition(&log("ERROR", "x", "ns"), &cond));
        assert!(!match_condition(&log("error", "x", "ns"), &cond));
    }

    #[test]
    fn keywords_are_case_insensitive_conjunction() {
        let mut cond = Conditions::default();
        cond.keywords = vec!["database".to_string(), "failed".to_string(), "timeout".to_string()];
        assert!(match_condition(
            &log("ERROR", "Database Connection FAILED with TIMEOUT", "ns"),
            &cond
        ));
        assert!(!match_condition(&log("ERROR", "Database failed", "ns"), &cond));
    }

    #[test]
    fn service_resolves_via_app_label() {
        let mut cond = Conditions::default();
        cond.service = Some("user-service".to_string());
        let mut l = log("ERROR", "x", "ns");
        l.workload.labels.insert("app".to_string(), "user-service".to_string());
        assert!(match_condition(&l, &cond));

        let mut l2 = log("ERROR", "x", "ns");
        l2.workload.labels.insert("version".to_string(), "1.0".to_string());
        assert!(!match_condition(&l2, &cond));
    }

    #[test]
    fn test_rule_zero_samples_has_nonpositive_rate() {
        let cond = Conditions::default();
        let report = test_rule(&cond, 1, &[]);
        assert_eq!(report.total, 0);
        assert!(report.match_rate <= 0.0);
        assert!(!report.would_trigger);
    }

    #[test]
    fn test_rule_does_not_mutate_counters() {
        let mut cond = Conditions::default();
        cond.log_level = Some("ERROR".to_string());
        let samples = vec![log("ERROR", "a", "ns"), log("INFO", "b", "ns")];
        let report = test_rule(&cond, 1, &samples);
        assert_eq!(report.matched, 1);
        assert_eq!(report.total, 2);
        assert!(report.would_trigger);
    }
}
