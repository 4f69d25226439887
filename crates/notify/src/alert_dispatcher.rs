//! Routes emitted alerts to the configured notifier. The engine hands it
//! one alert at a time; a delivery failure never blocks evaluation of the
//! next rule (§4.5, §7).

use std::sync::Arc;

use stupid_core::alert_rule::Alert;
use tracing::warn;

use crate::alert_notifier::AlertNotifier;

pub struct AlertDispatcher {
    notifier: Arc<dyn AlertNotifier>,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn AlertNotifier>) -> Self {
        AlertDispatcher { notifier }
    }

    /// Deliver `alert`. Errors are logged, not propagated — alert
    /// persistence upstream already stands regardless of delivery outcome.
    pub async fn dispatch(&self, alert: &Alert) {
        if let Err(e) = self.notifier.send(alert).await {
            warn!(
                notifier = self.notifier.name(),
                rule_id = %alert.rule_id,
                alert_id = %alert.id,
                error = %e,
                "notifier delivery failed"
            );
        }
    }

    pub async fn test(&self) -> Result<(), crate::alert_notifier::AlertNotifyError> {
        self.notifier.test().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert_notifier::AlertNotifyError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockNotifier {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl AlertNotifier for MockNotifier {
        async fn send(&self, _alert: &Alert) -> Result<(), AlertNotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AlertNotifyError::NonSuccessStatus(500))
            } else {
                Ok(())
            }
        }

        async fn test(&self) -> Result<(), AlertNotifyError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn enabled(&self) -> bool {
            true
        }

        fn set_enabled(&self, _enabled: bool) {}
    }

    fn alert() -> Alert {
        Alert {
            id: "a1".to_string(),
            rule_id: "r1".to_string(),
            rule_name: "r1".to_string(),
            log: stupid_core::log_record::LogRecord {
                timestamp: chrono::Utc::now(),
                level: "ERROR".to_string(),
                message: "boom".to_string(),
                workload: Default::default(),
                hostname: None,
            },
            emitted_at: chrono::Utc::now(),
            severity: "high".to_string(),
            channel: "#alerts".to_string(),
            message: "fired".to_string(),
            count: 1,
        }
    }

    #[tokio::test]
    async fn dispatch_never_panics_on_notifier_failure() {
        let mock = Arc::new(MockNotifier { calls: AtomicUsize::new(0), fail: true });
        let dispatcher = AlertDispatcher::new(mock.clone());
        dispatcher.dispatch(&alert()).await;
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispatch_delivers_on_success() {
        let mock = Arc::new(MockNotifier { calls: AtomicUsize::new(0), fail: false });
        let dispatcher = AlertDispatcher::new(mock.clone());
        dispatcher.dispatch(&alert()).await;
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }
}
