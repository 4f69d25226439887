//! Notification delivery for fired alerts.
//!
//! This crate provides:
//! - `AlertNotifier` trait for pluggable delivery channels
//! - A chat-webhook notifier (Slack/Discord-style JSON payloads)
//! - A dispatcher that fans a fired alert out to every enabled notifier

pub mod alert_dispatcher;
pub mod alert_notifier;
pub mod chat_webhook;
pub mod severity_presentation;

pub use alert_dispatcher::AlertDispatcher;
pub use alert_notifier::{AlertNotifier, AlertNotifyError, NoopAlertNotifier};
pub use chat_webhook::ChatWebhookNotifier;
pub use severity_presentation::SeverityPresentation;
