//! In-memory `Store` implementation: used by the engine/evaluator/ingest
//! test suites and by local/dev runs without Redis. TTLs are tracked but
//! only swept lazily on read, which is sufficient for tests and short-lived
//! dev runs (see SPEC_FULL.md §10.3).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use stupid_core::alert_rule::{Alert, AlertRule, AlertStatus, LogStats};
use stupid_core::store::{window_start_epoch, Store, StoreError};

struct Ttl<T> {
    value: T,
    expires_at: Option<chrono::DateTime<Utc>>,
}

impl<T> Ttl<T> {
    fn fresh(value: T, ttl_secs: Option<i64>) -> Self {
        Ttl {
            value,
            expires_at: ttl_secs.map(|s| Utc::now() + chrono::Duration::seconds(s)),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.map(|e| Utc::now() > e).unwrap_or(false)
    }
}

#[derive(Default)]
struct Inner {
    rules: HashMap<String, AlertRule>,
    counters: HashMap<(String, i64), Ttl<i64>>,
    statuses: HashMap<String, Ttl<AlertStatus>>,
    alerts: HashMap<String, Ttl<Alert>>,
    alert_order: Vec<String>,
    log_stats: Option<Ttl<LogStats>>,
}

/// `Mutex`-guarded maps backing the `Store` trait. Not for production use —
/// ephemeral and single-process.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save_rule(&self, rule: &AlertRule) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("in-memory store lock poisoned");
        inner.rules.insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn get_rule(&self, id: &str) -> Result<AlertRule, StoreError> {
        let inner = self.inner.lock().expect("in-memory store lock poisoned");
        inner
            .rules
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_rules(&self) -> Result<Vec<AlertRule>, StoreError> {
        let inner = self.inner.lock().expect("in-memory store lock poisoned");
        Ok(inner.rules.values().cloned().collect())
    }

    async fn delete_rule(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("in-memory store lock poisoned");
        inner
            .rules
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn bulk_save_rules(&self, rules: &[AlertRule]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("in-memory store lock poisoned");
        for rule in rules {
            inner.rules.insert(rule.id.clone(), rule.clone());
        }
        Ok(())
    }

    async fn increment_counter(&self, rule_id: &str, window_secs: i64) -> Result<i64, StoreError> {
        let window_start = window_start_epoch(Utc::now().timestamp(), window_secs);
        let mut inner = self.inner.lock().expect("in-memory store lock poisoned");
        let key = (rule_id.to_string(), window_start);
        let ttl_secs = 2 * window_secs;
        let entry = inner.counters.remove(&key);
        let current = match entry {
            Some(t) if !t.is_expired() => t.value,
            _ => 0,
        };
        let new_value = current + 1;
        inner
            .counters
            .insert(key, Ttl::fresh(new_value, Some(ttl_secs)));
        Ok(new_value)
    }

    async fn get_counter(&self, rule_id: &str, window_secs: i64) -> Result<i64, StoreError> {
        let window_start = window_start_epoch(Utc::now().timestamp(), window_secs);
        let inner = self.inner.lock().expect("in-memory store lock poisoned");
        Ok(inner
            .counters
            .get(&(rule_id.to_string(), window_start))
            .filter(|t| !t.is_expired())
            .map(|t| t.value)
            .unwrap_or(0))
    }

    async fn set_alert_status(&self, status: &AlertStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("in-memory store lock poisoned");
        inner
            .statuses
            .insert(status.rule_id.clone(), Ttl::fresh(status.clone(), Some(3600)));
        Ok(())
    }

    async fn get_alert_status(&self, rule_id: &str) -> Result<AlertStatus, StoreError> {
        let inner = self.inner.lock().expect("in-memory store lock poisoned");
        inner
            .statuses
            .get(rule_id)
            .filter(|t| !t.is_expired())
            .map(|t| t.value.clone())
            .ok_or_else(|| StoreError::NotFound(rule_id.to_string()))
    }

    async fn save_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("in-memory store lock poisoned");
        inner
            .alerts
            .insert(alert.id.clone(), Ttl::fresh(alert.clone(), Some(24 * 3600)));
        inner.alert_order.push(alert.id.clone());
        Ok(())
    }

    async fn get_alert(&self, id: &str) -> Result<Alert, StoreError> {
        let inner = self.inner.lock().expect("in-memory store lock poisoned");
        inner
            .alerts
            .get(id)
            .filter(|t| !t.is_expired())
            .map(|t| t.value.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, StoreError> {
        let inner = self.inner.lock().expect("in-memory store lock poisoned");
        let mut out: Vec<Alert> = inner
            .alert_order
            .iter()
            .rev()
            .filter_map(|id| inner.alerts.get(id))
            .filter(|t| !t.is_expired())
            .map(|t| t.value.clone())
            .collect();
        out.truncate(limit);
        Ok(out)
    }

    async fn get_log_stats(&self) -> Result<LogStats, StoreError> {
        let inner = self.inner.lock().expect("in-memory store lock poisoned");
        Ok(inner
            .log_stats
            .as_ref()
            .filter(|t| !t.is_expired())
            .map(|t| t.value.clone())
            .unwrap_or_default())
    }

    async fn save_log_stats(&self, stats: &LogStats) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("in-memory store lock poisoned");
        inner.log_stats = Some(Ttl::fresh(stats.clone(), Some(3600)));
        Ok(())
    }

    async fn health_ping(&self) -> bool {
        true
    }
}
