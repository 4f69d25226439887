//! Ingest Bridge (§4.6): decodes `LogRecord`s off a `LogSource` and hands
//! them to the engine. Three entry points: the long-running consumer loop
//! (`process_logs`), a size/time-batched variant (`batch_process`), and a
//! parallel variant over a pre-collected slice (`batch_evaluate`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use stupid_alert_engine::Engine;
use stupid_core::alert_rule::Alert;
use stupid_core::log_record::LogRecord;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

use crate::log_source::{IngestError, LogSource};

#[derive(Debug, Error)]
pub enum IngestBridgeError {
    #[error("ingest loop canceled")]
    Canceled,

    #[error("source read failed after exhausting retries: {0}")]
    SourceExhausted(#[from] IngestError),
}

/// Cooperative cancellation signal shared between a loop and its supervisor.
/// Grounded on the `tokio::sync::Notify`-based shutdown signal already used
/// by `rules-worker.rs`.
#[derive(Clone, Default)]
pub struct Context {
    notify: Arc<Notify>,
    canceled: Arc<std::sync::atomic::AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    async fn canceled(&self) {
        if self.is_canceled() {
            return;
        }
        self.notify.notified().await;
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IngestMetrics {
    pub total_processed: u64,
    pub total_failures: u64,
    pub last_processed: Option<DateTime<Utc>>,
    pub cumulative_processing_nanos: u128,
}

impl IngestMetrics {
    pub fn error_rate(&self) -> f64 {
        let total = self.total_processed + self.total_failures;
        if total == 0 {
            0.0
        } else {
            self.total_failures as f64 / total as f64
        }
    }
}

pub struct IngestBridgeConfig {
    pub max_retry_attempts: u32,
    pub initial_backoff: Duration,
    pub error_rate_threshold: f64,
    pub staleness_window: Duration,
    pub batch_size: usize,
    pub batch_flush_interval: Duration,
    pub parallel_group_size: usize,
}

impl Default for IngestBridgeConfig {
    fn default() -> Self {
        IngestBridgeConfig {
            max_retry_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            error_rate_threshold: 0.10,
            staleness_window: Duration::from_secs(300),
            batch_size: 100,
            batch_flush_interval: Duration::from_secs(5),
            parallel_group_size: 50,
        }
    }
}

pub struct IngestBridge {
    source: Arc<dyn LogSource>,
    engine: Arc<Engine>,
    config: IngestBridgeConfig,
    metrics: Mutex<IngestMetrics>,
    polls_without_message: AtomicU64,
}

impl IngestBridge {
    pub fn new(source: Arc<dyn LogSource>, engine: Arc<Engine>, config: IngestBridgeConfig) -> Self {
        IngestBridge {
            source,
            engine,
            config,
            metrics: Mutex::new(IngestMetrics::default()),
            polls_without_message: AtomicU64::new(0),
        }
    }

    pub async fn metrics(&self) -> IngestMetrics {
        self.metrics.lock().await.clone()
    }

    /// `true` iff error rate is below threshold and the last successfully
    /// processed record is within the staleness window. A fresh bridge with
    /// no activity reports unhealthy.
    pub async fn health_check(&self) -> bool {
        let metrics = self.metrics.lock().await;
        let Some(last) = metrics.last_processed else {
            return false;
        };
        if metrics.error_rate() >= self.config.error_rate_threshold {
            return false;
        }
        let staleness = Utc::now().signed_duration_since(last);
        staleness.num_seconds() >= 0
            && staleness.to_std().unwrap_or(Duration::MAX) <= self.config.staleness_window
    }

    /// Decode a message body as a `LogRecord`, sanitize it, and reject it if
    /// still structurally invalid after sanitization.
    fn decode(&self, body: &str) -> Option<LogRecord> {
        let mut record: LogRecord = match serde_json::from_str(body) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "failed to decode log record");
                return None;
            }
        };
        record.sanitize();
        if !record.is_valid() {
            warn!("decoded log record failed validation");
            return None;
        }
        Some(record)
    }

    async fn handle_one(&self, record: &LogRecord) {
        let started = Instant::now();
        match self.engine.evaluate_log(record).await {
            Ok(_) => {
                let mut m = self.metrics.lock().await;
                m.total_processed += 1;
                m.last_processed = Some(Utc::now());
                m.cumulative_processing_nanos += started.elapsed().as_nanos();
            }
            Err(e) => {
                warn!(error = %e, "engine evaluation failed for record");
                let mut m = self.metrics.lock().await;
                m.total_failures += 1;
            }
        }
    }

    async fn record_decode_failure(&self) {
        let mut m = self.metrics.lock().await;
        m.total_failures += 1;
    }

    /// One message at a time, forever, until `ctx` is canceled. A read
    /// failure is retried with bounded exponential backoff starting at
    /// `config.initial_backoff`; once `max_retry_attempts` is exhausted the
    /// failure is surfaced so a supervisor can restart the loop.
    pub async fn process_logs(&self, ctx: &Context) -> Result<(), IngestBridgeError> {
        loop {
            if ctx.is_canceled() {
                return Err(IngestBridgeError::Canceled);
            }

            let message = tokio::select! {
                _ = ctx.canceled() => return Err(IngestBridgeError::Canceled),
                result = self.recv_with_backoff() => result?,
            };

            let Some(message) = message else {
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            };

            match self.decode(&message.body) {
                Some(record) => self.handle_one(&record).await,
                None => self.record_decode_failure().await,
            }

            if let Err(e) = self.source.ack(&message.ack_token).await {
                warn!(error = %e, "failed to ack processed message");
            }
        }
    }

    async fn recv_with_backoff(
        &self,
    ) -> Result<Option<crate::log_source::Message>, IngestBridgeError> {
        let mut attempt = 0;
        let mut backoff = self.config.initial_backoff;
        loop {
            match self.source.recv().await {
                Ok(msg) => return Ok(msg),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.config.max_retry_attempts {
                        return Err(IngestBridgeError::SourceExhausted(e));
                    }
                    warn!(attempt, error = %e, "ingest source read failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    /// Accumulate decoded records until `config.batch_size` is reached or
    /// `config.batch_flush_interval` elapses, then hand every record in the
    /// batch to the engine. On cancellation, flushes whatever is buffered
    /// before returning cancellation.
    pub async fn batch_process(&self, ctx: &Context) -> Result<(), IngestBridgeError> {
        let mut buffer: Vec<LogRecord> = Vec::with_capacity(self.config.batch_size);
        let mut batch_started = Instant::now();

        loop {
            if ctx.is_canceled() {
                self.flush_batch(&mut buffer).await;
                return Err(IngestBridgeError::Canceled);
            }

            let message = tokio::select! {
                _ = ctx.canceled() => {
                    self.flush_batch(&mut buffer).await;
                    return Err(IngestBridgeError::Canceled);
                }
                result = self.recv_with_backoff() => result?,
            };

            if let Some(message) = message {
                if let Some(record) = self.decode(&message.body) {
                    buffer.push(record);
                } else {
                    self.record_decode_failure().await;
                }
                if let Err(e) = self.source.ack(&message.ack_token).await {
                    warn!(error = %e, "failed to ack processed message");
                }
            }

            let size_ready = buffer.len() >= self.config.batch_size;
            let time_ready = batch_started.elapsed() >= self.config.batch_flush_interval;
            if !buffer.is_empty() && (size_ready || time_ready) {
                self.flush_batch(&mut buffer).await;
                batch_started = Instant::now();
            } else if buffer.is_empty() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }

    async fn flush_batch(&self, buffer: &mut Vec<LogRecord>) {
        if buffer.is_empty() {
            return;
        }
        info!(batch_size = buffer.len(), "flushing ingest batch");
        for record in buffer.drain(..) {
            self.handle_one(&record).await;
        }
    }

    /// Evaluate a pre-collected slice of logs, split into fixed-size groups
    /// evaluated concurrently. Returns every alert emitted across all
    /// groups; on cancellation, returns whatever has been produced so far
    /// together with cancellation.
    pub async fn batch_evaluate(
        &self,
        logs: &[LogRecord],
        ctx: &Context,
    ) -> (Vec<Alert>, Option<IngestBridgeError>) {
        let mut emitted = Vec::new();
        for group in logs.chunks(self.config.parallel_group_size.max(1)) {
            if ctx.is_canceled() {
                return (emitted, Some(IngestBridgeError::Canceled));
            }
            let futures = group.iter().map(|log| self.engine.evaluate_log(log));
            let results = futures::future::join_all(futures).await;
            for result in results {
                match result {
                    Ok(alerts) => emitted.extend(alerts),
                    Err(e) => warn!(error = %e, "engine evaluation failed during batch_evaluate"),
                }
            }
        }
        (emitted, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_source::InMemoryLogSource;
    use stupid_alert_store::InMemoryStore;
    use stupid_core::alert_rule::{Actions, AlertRule, Conditions};
    use stupid_core::store::Store;
    use stupid_notify::alert_notifier::{AlertNotifier, AlertNotifyError};
    use stupid_notify::AlertDispatcher;

    struct NoopNotifier;

    #[async_trait::async_trait]
    impl AlertNotifier for NoopNotifier {
        async fn send(&self, _alert: &Alert) -> Result<(), AlertNotifyError> {
            Ok(())
        }
        async fn test(&self) -> Result<(), AlertNotifyError> {
            Ok(())
        }
        fn name(&self) -> &str {
            "noop"
        }
        fn enabled(&self) -> bool {
            true
        }
        fn set_enabled(&self, _enabled: bool) {}
    }

    async fn bridge_with_rule() -> (Arc<IngestBridge>, tokio::sync::mpsc::UnboundedSender<String>) {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let dispatcher = AlertDispatcher::new(Arc::new(NoopNotifier));
        let (engine, _) = Engine::new(store, dispatcher).await;
        let engine = Arc::new(engine);

        let now = Utc::now();
        engine
            .add_rule(AlertRule {
                id: "r1".to_string(),
                name: "r1".to_string(),
                description: String::new(),
                enabled: true,
                conditions: Conditions {
                    log_level: Some("ERROR".to_string()),
                    namespace: None,
                    service: None,
                    keywords: vec![],
                    threshold: 1,
                    time_window_secs: 300,
                    operator: "gte".to_string(),
                },
                actions: Actions { channel: "#alerts".to_string(), severity: "high".to_string() },
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let (source, tx) = InMemoryLogSource::new();
        let bridge = Arc::new(IngestBridge::new(Arc::new(source), engine, IngestBridgeConfig::default()));
        (bridge, tx)
    }

    fn valid_log_json() -> String {
        serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": "ERROR",
            "message": "disk full",
            "workload": {"namespace": "prod"},
        })
        .to_string()
    }

    #[tokio::test]
    async fn decode_rejects_malformed_json() {
        let (bridge, _tx) = bridge_with_rule().await;
        assert!(bridge.decode("not json").is_none());
    }

    #[tokio::test]
    async fn decode_accepts_and_sanitizes_valid_record() {
        let (bridge, _tx) = bridge_with_rule().await;
        let record = bridge.decode(&valid_log_json()).unwrap();
        assert_eq!(record.level, "ERROR");
    }

    #[tokio::test]
    async fn fresh_bridge_is_unhealthy() {
        let (bridge, _tx) = bridge_with_rule().await;
        assert!(!bridge.health_check().await);
    }

    #[tokio::test]
    async fn healthy_after_successful_processing() {
        let (bridge, tx) = bridge_with_rule().await;
        tx.send(valid_log_json()).unwrap();
        let ctx = Context::new();
        let bridge2 = bridge.clone();
        let handle = tokio::spawn(async move { bridge2.process_logs(&ctx).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(bridge.health_check().await);
        handle.abort();
    }

    #[tokio::test]
    async fn batch_evaluate_collects_emitted_alerts() {
        let (bridge, _tx) = bridge_with_rule().await;
        let logs = vec![
            LogRecord {
                timestamp: Utc::now(),
                level: "ERROR".to_string(),
                message: "boom".to_string(),
                workload: {
                    let mut w = stupid_core::log_record::WorkloadIdentity::default();
                    w.namespace = Some("prod".to_string());
                    w
                },
                hostname: None,
            };
            3
        ];
        let ctx = Context::new();
        let (alerts, err) = bridge.batch_evaluate(&logs, &ctx).await;
        assert!(err.is_none());
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test]
    async fn batch_evaluate_honors_pre_cancellation() {
        let (bridge, _tx) = bridge_with_rule().await;
        let ctx = Context::new();
        ctx.cancel();
        let (alerts, err) = bridge.batch_evaluate(&[], &ctx).await;
        assert!(alerts.is_empty());
        assert!(err.is_none());
    }
}
