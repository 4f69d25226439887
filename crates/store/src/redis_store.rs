//! Redis-backed `Store` implementation (§10.3). Rules/alerts/status are
//! JSON-encoded values behind `SET`/`GET`/`DEL`; counters use `INCR` +
//! `EXPIRE`; enumeration uses `SCAN`, never `KEYS`, so it stays safe on
//! clustered deployments (§4.1).

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use stupid_core::alert_rule::{Alert, AlertRule, AlertStatus, LogStats};
use stupid_core::store::{window_start_epoch, Store, StoreError};
use tracing::warn;

const RULE_PREFIX: &str = "alert_rule:";
const ALERT_PREFIX: &str = "alert:";
const ALERT_STATUS_PREFIX: &str = "alert_status:";
const LOG_STATS_KEY: &str = "log_stats";
const ALERT_STATUS_TTL_SECS: i64 = 3600;
const ALERT_TTL_SECS: i64 = 24 * 3600;
const LOG_STATS_TTL_SECS: i64 = 3600;

fn counter_key(rule_id: &str, window_start: i64) -> String {
    format!("counter:{rule_id}:{window_start}")
}

fn rule_key(id: &str) -> String {
    format!("{RULE_PREFIX}{id}")
}

fn alert_key(id: &str) -> String {
    format!("{ALERT_PREFIX}{id}")
}

fn alert_status_key(rule_id: &str) -> String {
    format!("{ALERT_STATUS_PREFIX}{rule_id}")
}

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Unavailable(format!("redis connect failed: {e}")))?;
        Ok(RedisStore { conn })
    }

    /// Incremental scan over a key prefix, never `KEYS`. Used by both
    /// `list_rules` and `list_recent_alerts`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(format!("{prefix}*"))
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Transient(format!("scan failed: {e}")))?;
            keys.extend(batch);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(keys)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn save_rule(&self, rule: &AlertRule) -> Result<(), StoreError> {
        let payload = serde_json::to_string(rule).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(rule_key(&rule.id), payload)
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))
    }

    async fn get_rule(&self, id: &str) -> Result<AlertRule, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(rule_key(id))
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Serialize(e.to_string()))
    }

    async fn list_rules(&self) -> Result<Vec<AlertRule>, StoreError> {
        let keys = self.scan_prefix(RULE_PREFIX).await?;
        let mut conn = self.conn.clone();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| StoreError::Transient(e.to_string()))?;
            match raw {
                Some(raw) => match serde_json::from_str(&raw) {
                    Ok(rule) => out.push(rule),
                    Err(e) => warn!(key = %key, error = %e, "dropping undecodable rule from store scan"),
                },
                None => continue, // TTL race: expired between SCAN and GET
            }
        }
        Ok(out)
    }

    async fn delete_rule(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .del(rule_key(id))
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        if removed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn bulk_save_rules(&self, rules: &[AlertRule]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for rule in rules {
            let payload =
                serde_json::to_string(rule).map_err(|e| StoreError::Serialize(e.to_string()))?;
            pipe.set(rule_key(&rule.id), payload);
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))
    }

    async fn increment_counter(&self, rule_id: &str, window_secs: i64) -> Result<i64, StoreError> {
        let window_start = window_start_epoch(Utc::now().timestamp(), window_secs);
        let key = counter_key(rule_id, window_start);
        let mut conn = self.conn.clone();
        let (value,): (i64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, 2 * window_secs)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        Ok(value)
    }

    async fn get_counter(&self, rule_id: &str, window_secs: i64) -> Result<i64, StoreError> {
        let window_start = window_start_epoch(Utc::now().timestamp(), window_secs);
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn
            .get(counter_key(rule_id, window_start))
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        Ok(value.unwrap_or(0))
    }

    async fn set_alert_status(&self, status: &AlertStatus) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(status).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(
            alert_status_key(&status.rule_id),
            payload,
            ALERT_STATUS_TTL_SECS as u64,
        )
        .await
        .map_err(|e| StoreError::Transient(e.to_string()))
    }

    async fn get_alert_status(&self, rule_id: &str) -> Result<AlertStatus, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(alert_status_key(rule_id))
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(rule_id.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Serialize(e.to_string()))
    }

    async fn save_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(alert).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(alert_key(&alert.id), payload, ALERT_TTL_SECS as u64)
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))
    }

    async fn get_alert(&self, id: &str) -> Result<Alert, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(alert_key(id))
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Serialize(e.to_string()))
    }

    async fn list_recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, StoreError> {
        let keys = self.scan_prefix(ALERT_PREFIX).await?;
        let mut conn = self.conn.clone();
        let mut out = Vec::new();
        for key in keys {
            if out.len() >= limit {
                break;
            }
            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| StoreError::Transient(e.to_string()))?;
            if let Some(raw) = raw {
                if let Ok(alert) = serde_json::from_str(&raw) {
                    out.push(alert);
                }
            }
        }
        Ok(out)
    }

    async fn get_log_stats(&self) -> Result<LogStats, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(LOG_STATS_KEY)
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        match raw {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::Serialize(e.to_string())),
            None => Ok(LogStats::default()),
        }
    }

    async fn save_log_stats(&self, stats: &LogStats) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(stats).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(LOG_STATS_KEY, payload, LOG_STATS_TTL_SECS as u64)
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))
    }

    async fn health_ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}
