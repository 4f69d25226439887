//! The Engine (§4.5): owns the in-memory rule working set, orchestrates
//! per-log evaluation, invokes the notifier, and persists emitted alerts.
//! Admin operations write through to the store before mutating the
//! working set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use stupid_core::alert_rule::{Alert, AlertRule, AlertStatus};
use stupid_core::log_record::LogRecord;
use stupid_core::store::Store;
use stupid_notify::AlertDispatcher;
use stupid_rules::alert_evaluator::{check_threshold, match_condition};
use stupid_rules::alert_tracker::PerformanceTracker;
use stupid_rules::alert_validation::validate;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;

type WorkingSet = HashMap<String, AlertRule>;

pub struct Engine {
    store: Arc<dyn Store>,
    dispatcher: AlertDispatcher,
    tracker: PerformanceTracker,
    working_set: RwLock<WorkingSet>,
    stopped: AtomicBool,
}

impl Engine {
    /// Populate the working set from `store.list_rules()`. Construction
    /// never fails outright: if the initial load errors, the engine starts
    /// with an empty working set and the error is returned alongside it
    /// for the caller to log or alert on (resolved open question, §9).
    pub async fn new(store: Arc<dyn Store>, dispatcher: AlertDispatcher) -> (Self, Option<EngineError>) {
        let (working_set, load_error) = match store.list_rules().await {
            Ok(rules) => {
                let map = rules
                    .into_iter()
                    .filter(|r| r.enabled)
                    .map(|r| (r.id.clone(), r))
                    .collect();
                (map, None)
            }
            Err(e) => {
                warn!(error = %e, "initial rule load failed, starting with empty working set");
                (HashMap::new(), Some(EngineError::Store(e)))
            }
        };
        let engine = Engine {
            store,
            dispatcher,
            tracker: PerformanceTracker::new(),
            working_set: RwLock::new(working_set),
            stopped: AtomicBool::new(false),
        };
        (engine, load_error)
    }

    pub fn tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(EngineError::Stopped);
        }
        Ok(())
    }

    /// Evaluate one log record against the snapshot of enabled rules.
    /// The working set can hold disabled rules (admin ops insert whatever
    /// they're given so a rule's full history stays queryable via
    /// `get_rule`/`list_rules`), so the `enabled` filter is applied here,
    /// not assumed from membership. A disabled rule is never matched,
    /// counted, or fired. No per-rule failure aborts the loop; the only
    /// error this returns is `Stopped`. Returns every alert actually
    /// emitted (cooldown-suppressed triggers produce none).
    pub async fn evaluate_log(&self, log: &LogRecord) -> Result<Vec<Alert>, EngineError> {
        self.ensure_running()?;

        let snapshot: Vec<AlertRule> = {
            let guard = self.working_set.read().await;
            guard.values().filter(|r| r.enabled).cloned().collect()
        };

        let mut emitted = Vec::new();

        for rule in &snapshot {
            let started = Instant::now();
            let matched = match_condition(log, &rule.conditions);
            if !matched {
                self.tracker.track(&rule.id, started.elapsed(), false);
                continue;
            }

            let now = Utc::now();
            let (triggered, count) =
                match check_threshold(self.store.as_ref(), &rule.id, &rule.conditions).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(rule_id = %rule.id, error = %e, "counter increment failed, skipping threshold decision");
                        self.tracker.track(&rule.id, started.elapsed(), true);
                        continue;
                    }
                };
            self.tracker.track(&rule.id, started.elapsed(), true);

            if !triggered {
                continue;
            }

            if let Some(alert) = self.handle_trigger(rule, log, now, count).await {
                emitted.push(alert);
            }
        }

        Ok(emitted)
    }

    /// On a threshold crossing, suppress re-emission within the same
    /// window (resolved open question, §9): the status snapshot is always
    /// refreshed, but a new alert/notification is produced only if the
    /// rule was not already `active` for the current window.
    async fn handle_trigger(
        &self,
        rule: &AlertRule,
        log: &LogRecord,
        now: chrono::DateTime<Utc>,
        count: i64,
    ) -> Option<Alert> {
        let window_secs = rule.conditions.time_window_secs;
        let window_start_epoch = stupid_core::store::window_start_epoch(now.timestamp(), window_secs);
        let window_start = chrono::DateTime::<Utc>::from_timestamp(window_start_epoch, 0).unwrap_or(now);

        let existing_status = self.store.get_alert_status(&rule.id).await.ok();
        let already_active_this_window = existing_status
            .as_ref()
            .map(|s| s.triggered_in_window(window_start, window_secs))
            .unwrap_or(false);

        let mut status = existing_status.unwrap_or_else(|| AlertStatus::new(&rule.id));
        status.window_count = count;
        status.status = AlertStatus::ACTIVE.to_string();
        if !already_active_this_window {
            status.last_trigger = Some(now);
        }
        if let Err(e) = self.store.set_alert_status(&status).await {
            warn!(rule_id = %rule.id, error = %e, "failed to persist alert status");
        }

        if already_active_this_window {
            return None;
        }

        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            log: log.clone(),
            emitted_at: now,
            severity: rule.actions.severity.clone(),
            channel: rule.actions.channel.clone(),
            message: format!("{} fired ({} matched {} {})", rule.name, count, rule.operator().as_str(), rule.conditions.threshold),
            count,
        };

        if let Err(e) = self.store.save_alert(&alert).await {
            warn!(rule_id = %rule.id, alert_id = %alert.id, error = %e, "failed to persist alert");
        }

        info!(rule_id = %rule.id, alert_id = %alert.id, count, "rule triggered, alert emitted");
        self.dispatcher.dispatch(&alert).await;
        Some(alert)
    }

    pub async fn add_rule(&self, mut rule: AlertRule) -> Result<AlertRule, EngineError> {
        self.ensure_running()?;
        validate(&rule)?;
        if rule.id.is_empty() {
            rule.id = stupid_rules::alert_validation::generate_id(&rule.name);
        }
        {
            let guard = self.working_set.read().await;
            if guard.contains_key(&rule.id) {
                return Err(EngineError::AlreadyExists(rule.id));
            }
        }
        self.store.save_rule(&rule).await?;
        let mut guard = self.working_set.write().await;
        guard.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    pub async fn update_rule(&self, mut rule: AlertRule) -> Result<AlertRule, EngineError> {
        self.ensure_running()?;
        validate(&rule)?;
        let now = Utc::now();
        {
            let guard = self.working_set.read().await;
            if let Some(existing) = guard.get(&rule.id) {
                rule.created_at = existing.created_at;
            }
        }
        rule.updated_at = now;
        self.store.save_rule(&rule).await?;
        let mut guard = self.working_set.write().await;
        guard.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    pub async fn delete_rule(&self, id: &str) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.store.delete_rule(id).await?;
        let mut guard = self.working_set.write().await;
        guard.remove(id);
        Ok(())
    }

    pub async fn get_rule(&self, id: &str) -> Option<AlertRule> {
        self.working_set.read().await.get(id).cloned()
    }

    pub async fn list_rules(&self) -> Vec<AlertRule> {
        self.working_set.read().await.values().cloned().collect()
    }

    /// Atomically replace the working set with a fresh `list_rules()`
    /// result. Readers observe either the old or the new set, never a
    /// partial mix, because the swap happens under the exclusive lock.
    pub async fn reload_rules(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        let rules = self.store.list_rules().await?;
        let map: WorkingSet = rules
            .into_iter()
            .filter(|r| r.enabled)
            .map(|r| (r.id.clone(), r))
            .collect();
        let mut guard = self.working_set.write().await;
        *guard = map;
        Ok(())
    }

    /// Graceful shutdown: after this, admin ops and `evaluate_log` error
    /// rather than acting.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}
