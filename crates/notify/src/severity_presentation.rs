//! Severity → emoji / severity → color presentation tables for the
//! chat-webhook payload (§6). Process-scoped with an explicit initializer
//! and getter — no hidden global mutation (§9).

/// Table-driven severity presentation. Constructed once and shared via
/// `Arc`; `default()` gives the built-in table, matching §9's requirement
/// that there be no implicit initialization-order dependency.
#[derive(Debug, Clone)]
pub struct SeverityPresentation {
    entries: Vec<(&'static str, &'static str, &'static str)>, // (severity, emoji, hex color)
    default_entry: (&'static str, &'static str),
}

impl Default for SeverityPresentation {
    fn default() -> Self {
        SeverityPresentation {
            entries: vec![
                ("critical", "\u{1F6A8}", "#8B0000"),
                ("high", "\u{26A0}\u{FE0F}", "#FF4500"),
                ("medium", "\u{26A1}", "#FFA500"),
                ("low", "\u{2139}\u{FE0F}", "#2196F3"),
            ],
            default_entry: ("\u{2753}", "#808080"),
        }
    }
}

impl SeverityPresentation {
    pub fn get(&self, severity: &str) -> (&'static str, &'static str) {
        self.entries
            .iter()
            .find(|(s, _, _)| *s == severity)
            .map(|(_, emoji, color)| (*emoji, *color))
            .unwrap_or(self.default_entry)
    }

    pub fn emoji(&self, severity: &str) -> &'static str {
        self.get(severity).0
    }

    pub fn color(&self, severity: &str) -> &'static str {
        self.get(severity).1
    }
}
