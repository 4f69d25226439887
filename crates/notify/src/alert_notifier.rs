//! The alert notifier interface (§4.2): deliver a formatted alert to an
//! external channel, self-test, and carry an enable/disable flag.

use stupid_core::alert_rule::Alert;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertNotifyError {
    #[error("notifier is disabled")]
    Disabled,

    #[error("destination is not configured: {0}")]
    NotConfigured(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote responded with non-success status {0}")]
    NonSuccessStatus(u16),

    #[error("configuration error: {0}")]
    Config(String),
}

#[async_trait::async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Deliver `alert` to this notifier's destination.
    async fn send(&self, alert: &Alert) -> Result<(), AlertNotifyError>;

    /// Send a self-test payload a human can visually confirm.
    async fn test(&self) -> Result<(), AlertNotifyError>;

    /// Stable identifier for logging and metrics.
    fn name(&self) -> &str;

    fn enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
}

/// Stands in for a real destination when none is configured, so the engine
/// can still start. Every call reports `NotConfigured`.
pub struct NoopAlertNotifier;

#[async_trait::async_trait]
impl AlertNotifier for NoopAlertNotifier {
    async fn send(&self, _alert: &Alert) -> Result<(), AlertNotifyError> {
        Err(AlertNotifyError::NotConfigured("no notifier destination configured".to_string()))
    }

    async fn test(&self) -> Result<(), AlertNotifyError> {
        Err(AlertNotifyError::NotConfigured("no notifier destination configured".to_string()))
    }

    fn name(&self) -> &str {
        "noop"
    }

    fn enabled(&self) -> bool {
        false
    }

    fn set_enabled(&self, _enabled: bool) {}
}
