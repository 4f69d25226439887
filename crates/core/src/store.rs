//! The state store interface (§4.1). Consumed, not implemented, by the
//! rule/evaluator/engine crates; concrete implementations live in
//! `stupid-store`.

use async_trait::async_trait;
use thiserror::Error;

use crate::alert_rule::{Alert, AlertRule, AlertStatus, LogStats};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("transient store error: {0}")]
    Transient(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Key-value/document store backing rule persistence, window counters,
/// alert status, and recent alerts. All methods are suspension points —
/// implementations must not block the calling task.
#[async_trait]
pub trait Store: Send + Sync {
    async fn save_rule(&self, rule: &AlertRule) -> Result<(), StoreError>;
    async fn get_rule(&self, id: &str) -> Result<AlertRule, StoreError>;
    async fn list_rules(&self) -> Result<Vec<AlertRule>, StoreError>;
    async fn delete_rule(&self, id: &str) -> Result<(), StoreError>;
    async fn bulk_save_rules(&self, rules: &[AlertRule]) -> Result<(), StoreError>;

    /// Atomically add 1 to the counter for `(rule_id, current_window_start)`
    /// and refresh its TTL to `2 * window_secs`. Returns the new value.
    async fn increment_counter(&self, rule_id: &str, window_secs: i64) -> Result<i64, StoreError>;

    /// Read the counter for the current window; 0 if absent.
    async fn get_counter(&self, rule_id: &str, window_secs: i64) -> Result<i64, StoreError>;

    async fn set_alert_status(&self, status: &AlertStatus) -> Result<(), StoreError>;
    async fn get_alert_status(&self, rule_id: &str) -> Result<AlertStatus, StoreError>;

    async fn save_alert(&self, alert: &Alert) -> Result<(), StoreError>;
    async fn get_alert(&self, id: &str) -> Result<Alert, StoreError>;
    async fn list_recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, StoreError>;

    async fn get_log_stats(&self) -> Result<LogStats, StoreError>;
    async fn save_log_stats(&self, stats: &LogStats) -> Result<(), StoreError>;

    async fn health_ping(&self) -> bool;
}

/// Truncate `now` (epoch seconds) down to a multiple of `window_secs`. This
/// is the single definition of "current window start" every caller must
/// agree on, regardless of which replica or store implementation computes
/// it.
pub fn window_start_epoch(now_epoch_secs: i64, window_secs: i64) -> i64 {
    if window_secs <= 0 {
        return now_epoch_secs;
    }
    (now_epoch_secs / window_secs) * window_secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_truncation_is_stable_within_window() {
        let w = window_start_epoch(1_000_017, 60);
        assert_eq!(w, 1_000_020 - 60);
        assert_eq!(window_start_epoch(1_000_017, 60), window_start_epoch(1_000_059, 60));
    }

    #[test]
    fn window_truncation_crosses_boundary() {
        assert_ne!(window_start_epoch(1_000_059, 60), window_start_epoch(1_000_060, 60));
    }
}
