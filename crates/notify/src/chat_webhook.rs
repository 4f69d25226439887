//! Chat-webhook `AlertNotifier` implementation, emitting the exact JSON
//! payload shape specified in §6.
//!
//! Grounded on `webhook.rs`'s `${VAR_NAME}` env-var resolution and
//! `reqwest::Client`-based delivery, adapted to build the fixed
//! Slack-style attachment payload rather than a generically serialized
//! notification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use stupid_core::alert_rule::Alert;

use crate::alert_notifier::{AlertNotifier, AlertNotifyError};
use crate::severity_presentation::SeverityPresentation;

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_LOG_TEXT_LEN: usize = 500;

#[derive(Debug, Serialize)]
struct Field {
    title: &'static str,
    value: String,
    short: bool,
}

#[derive(Debug, Serialize)]
struct Attachment {
    color: &'static str,
    title: String,
    text: String,
    ts: i64,
    footer: String,
    footer_icon: String,
    fields: Vec<Field>,
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    channel: String,
    username: String,
    icon_emoji: String,
    text: String,
    attachments: Vec<Attachment>,
}

pub struct ChatWebhookNotifier {
    url: String,
    default_channel: String,
    username: String,
    icon_emoji: String,
    footer: String,
    footer_icon: String,
    presentation: Arc<SeverityPresentation>,
    client: reqwest::Client,
    enabled: AtomicBool,
}

impl ChatWebhookNotifier {
    pub fn new(
        url_template: &str,
        default_channel: &str,
        username: &str,
        icon_emoji: &str,
        presentation: Arc<SeverityPresentation>,
    ) -> Result<Self, AlertNotifyError> {
        Self::with_timeout(url_template, default_channel, username, icon_emoji, DEFAULT_SEND_TIMEOUT, presentation)
    }

    pub fn with_timeout(
        url_template: &str,
        default_channel: &str,
        username: &str,
        icon_emoji: &str,
        send_timeout: Duration,
        presentation: Arc<SeverityPresentation>,
    ) -> Result<Self, AlertNotifyError> {
        let url = resolve_env_vars(url_template)?;
        if url.is_empty() {
            return Err(AlertNotifyError::NotConfigured(
                "webhook url is empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(send_timeout)
            .build()
            .map_err(AlertNotifyError::Http)?;
        Ok(ChatWebhookNotifier {
            url,
            default_channel: default_channel.to_string(),
            username: username.to_string(),
            icon_emoji: icon_emoji.to_string(),
            footer: "log-alerting-engine".to_string(),
            footer_icon: String::new(),
            presentation,
            client,
            enabled: AtomicBool::new(true),
        })
    }

    fn html_escape(input: &str) -> String {
        input
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    fn truncated_log_text(message: &str) -> String {
        let escaped = Self::html_escape(message);
        let truncated: String = escaped.chars().take(MAX_LOG_TEXT_LEN).collect();
        format!("```{truncated}```")
    }

    /// The alert's own destination wins; an empty `channel` (e.g. a rule
    /// that never set `actions.channel`) falls back to this notifier's
    /// configured default.
    fn resolve_channel<'a>(&'a self, alert: &'a Alert) -> &'a str {
        if alert.channel.is_empty() { &self.default_channel } else { &alert.channel }
    }

    fn build_payload(&self, alert: &Alert, channel: &str, severity: &str) -> WebhookPayload {
        let (emoji, color) = self.presentation.get(severity);
        WebhookPayload {
            channel: channel.to_string(),
            username: self.username.clone(),
            icon_emoji: self.icon_emoji.clone(),
            text: format!("{emoji} *{}* fired", alert.rule_name),
            attachments: vec![Attachment {
                color,
                title: format!("{} {}", alert.rule_name, emoji),
                text: Self::truncated_log_text(&alert.log.message),
                ts: alert.emitted_at.timestamp(),
                footer: self.footer.clone(),
                footer_icon: self.footer_icon.clone(),
                fields: vec![
                    Field { title: "Severity", value: severity.to_string(), short: true },
                    Field { title: "Namespace", value: alert.log.namespace(), short: true },
                    Field { title: "Service", value: alert.log.service(), short: true },
                    Field { title: "Pod", value: alert.log.workload.pod_name(), short: true },
                    Field { title: "Log Level", value: alert.log.level.clone(), short: true },
                    Field { title: "Count", value: alert.count.to_string(), short: true },
                ],
            }],
        }
    }
}

fn resolve_env_vars(input: &str) -> Result<String, AlertNotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(AlertNotifyError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| AlertNotifyError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }
    Ok(result)
}

#[async_trait::async_trait]
impl AlertNotifier for ChatWebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), AlertNotifyError> {
        if !self.enabled() {
            return Err(AlertNotifyError::Disabled);
        }
        let channel = self.resolve_channel(alert).to_string();
        let payload = self.build_payload(alert, &channel, &alert.severity);
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(AlertNotifyError::Http)?;
        if !resp.status().is_success() {
            return Err(AlertNotifyError::NonSuccessStatus(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn test(&self) -> Result<(), AlertNotifyError> {
        let test_alert = Alert {
            id: "test".to_string(),
            rule_id: "test-rule".to_string(),
            rule_name: "Self Test".to_string(),
            log: stupid_core::log_record::LogRecord {
                timestamp: Utc::now(),
                level: "INFO".to_string(),
                message: "this is a test notification from the log alerting engine".to_string(),
                workload: Default::default(),
                hostname: None,
            },
            emitted_at: Utc::now(),
            severity: "low".to_string(),
            channel: String::new(),
            message: "self-test".to_string(),
            count: 0,
        };
        self.send(&test_alert).await
    }

    fn name(&self) -> &str {
        "chat-webhook"
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

/// Verifies that a webhook payload serializes to exactly the shape §6
/// specifies, independent of transport.
pub fn preview_payload_json(
    notifier: &ChatWebhookNotifier,
    alert: &Alert,
    channel: &str,
) -> serde_json::Value {
    json!(notifier.build_payload(alert, channel, &alert.severity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_alert() -> Alert {
        Alert {
            id: "a1".to_string(),
            rule_id: "r1".to_string(),
            rule_name: "High Error Rate".to_string(),
            log: stupid_core::log_record::LogRecord {
                timestamp: Utc::now(),
                level: "ERROR".to_string(),
                message: "<script>alert(1)</script> & more".to_string(),
                workload: Default::default(),
                hostname: None,
            },
            emitted_at: Utc::now(),
            severity: "high".to_string(),
            channel: "#db-alerts".to_string(),
            message: "High Error Rate fired".to_string(),
            count: 11,
        }
    }

    #[test]
    fn env_var_resolution_fails_on_missing_var() {
        let err = resolve_env_vars("${DEFINITELY_NOT_SET_XYZ}");
        assert!(err.is_err());
    }

    #[test]
    fn env_var_resolution_substitutes_value() {
        std::env::set_var("ALERT_TEST_HOST", "hooks.example.com");
        let resolved = resolve_env_vars("https://${ALERT_TEST_HOST}/hook").unwrap();
        assert_eq!(resolved, "https://hooks.example.com/hook");
    }

    #[test]
    fn payload_html_escapes_and_truncates_log_text() {
        std::env::set_var("ALERT_TEST_HOST2", "hooks.example.com");
        let notifier =
            ChatWebhookNotifier::new(
                "https://${ALERT_TEST_HOST2}/hook",
                "#alerts",
                "alert-bot",
                ":rotating_light:",
                Arc::new(SeverityPresentation::default()),
            )
            .unwrap();
        let payload = notifier.build_payload(&sample_alert(), "#alerts", "high");
        let text = &payload.attachments[0].text;
        assert!(text.starts_with("```"));
        assert!(text.contains("&lt;script&gt;"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn payload_fields_include_all_six_labels() {
        std::env::set_var("ALERT_TEST_HOST3", "hooks.example.com");
        let notifier =
            ChatWebhookNotifier::new(
                "https://${ALERT_TEST_HOST3}/hook",
                "#alerts",
                "alert-bot",
                ":rotating_light:",
                Arc::new(SeverityPresentation::default()),
            )
            .unwrap();
        let payload = notifier.build_payload(&sample_alert(), "#alerts", "high");
        let titles: Vec<&str> = payload.attachments[0].fields.iter().map(|f| f.title).collect();
        assert_eq!(
            titles,
            vec!["Severity", "Namespace", "Service", "Pod", "Log Level", "Count"]
        );
    }

    #[test]
    fn resolve_channel_prefers_alerts_own_channel() {
        std::env::set_var("ALERT_TEST_HOST5", "hooks.example.com");
        let notifier = ChatWebhookNotifier::new(
            "https://${ALERT_TEST_HOST5}/hook",
            "#alerts",
            "alert-bot",
            ":rotating_light:",
            Arc::new(SeverityPresentation::default()),
        )
        .unwrap();
        assert_eq!(notifier.resolve_channel(&sample_alert()), "#db-alerts");
    }

    #[test]
    fn resolve_channel_falls_back_to_notifier_default() {
        std::env::set_var("ALERT_TEST_HOST6", "hooks.example.com");
        let notifier = ChatWebhookNotifier::new(
            "https://${ALERT_TEST_HOST6}/hook",
            "#default-alerts",
            "alert-bot",
            ":rotating_light:",
            Arc::new(SeverityPresentation::default()),
        )
        .unwrap();
        let mut alert = sample_alert();
        alert.channel = String::new();
        assert_eq!(notifier.resolve_channel(&alert), "#default-alerts");
    }

    #[test]
    fn payload_carries_configured_username_and_icon() {
        std::env::set_var("ALERT_TEST_HOST7", "hooks.example.com");
        let notifier = ChatWebhookNotifier::new(
            "https://${ALERT_TEST_HOST7}/hook",
            "#alerts",
            "custom-bot",
            ":siren:",
            Arc::new(SeverityPresentation::default()),
        )
        .unwrap();
        let payload = notifier.build_payload(&sample_alert(), "#alerts", "high");
        assert_eq!(payload.username, "custom-bot");
        assert_eq!(payload.icon_emoji, ":siren:");
    }

    #[tokio::test]
    async fn send_fails_when_disabled() {
        std::env::set_var("ALERT_TEST_HOST4", "hooks.example.com");
        let notifier =
            ChatWebhookNotifier::new(
                "https://${ALERT_TEST_HOST4}/hook",
                "#alerts",
                "alert-bot",
                ":rotating_light:",
                Arc::new(SeverityPresentation::default()),
            )
            .unwrap();
        notifier.set_enabled(false);
        let err = notifier.send(&sample_alert()).await.unwrap_err();
        assert!(matches!(err, AlertNotifyError::Disabled));
    }
}
