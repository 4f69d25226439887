//! Per-rule evaluation performance aggregates (§4.7).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct TrackerEntry {
    pub evaluation_count: u64,
    pub match_count: u64,
    pub total_eval_nanos: u128,
}

impl TrackerEntry {
    pub fn average_eval_nanos(&self) -> f64 {
        if self.evaluation_count == 0 {
            0.0
        } else {
            self.total_eval_nanos as f64 / self.evaluation_count as f64
        }
    }
}

/// A running aggregate per rule, guarded by its own lock. `track` is O(1);
/// all operations are safe under concurrent callers.
#[derive(Default)]
pub struct PerformanceTracker {
    entries: Mutex<HashMap<String, TrackerEntry>>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, rule_id: &str, duration: Duration, matched: bool) {
        let mut guard = self.entries.lock().expect("tracker lock poisoned");
        let entry = guard.entry(rule_id.to_string()).or_default();
        entry.evaluation_count += 1;
        entry.total_eval_nanos += duration.as_nanos();
        if matched {
            entry.match_count += 1;
        }
    }

    /// Point-in-time copy of every rule's entry.
    pub fn snapshot(&self) -> HashMap<String, TrackerEntry> {
        self.entries.lock().expect("tracker lock poisoned").clone()
    }

    pub fn for_rule(&self, rule_id: &str) -> Option<TrackerEntry> {
        self.entries
            .lock()
            .expect("tracker lock poisoned")
            .get(rule_id)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_accumulates_counts_and_time() {
        let tracker = PerformanceTracker::new();
        tracker.track("r1", Duration::from_millis(1), true);
        tracker.track("r1", Duration::from_millis(2), false);
        let entry = tracker.for_rule("r1").unwrap();
        assert_eq!(entry.evaluation_count, 2);
        assert_eq!(entry.match_count, 1);
        assert!(entry.average_eval_nanos() > 0.0);
    }

    #[test]
    fn for_rule_absent_returns_none() {
        let tracker = PerformanceTracker::new();
        assert!(tracker.for_rule("missing").is_none());
    }

    #[test]
    fn snapshot_is_independent_copy() {
        let tracker = PerformanceTracker::new();
        tracker.track("r1", Duration::from_millis(1), true);
        let snap = tracker.snapshot();
        tracker.track("r1", Duration::from_millis(1), true);
        assert_eq!(snap.get("r1").unwrap().evaluation_count, 1);
        assert_eq!(tracker.for_rule("r1").unwrap().evaluation_count, 2);
    }
}
