//! Rule evaluation, validation, and per-rule performance tracking for the
//! log alerting engine.

pub mod alert_evaluator;
pub mod alert_tracker;
pub mod alert_validation;

pub use alert_evaluator::{check_threshold, match_condition, test_rule, EvaluatorError, TestReport};
pub use alert_tracker::PerformanceTracker;
pub use alert_validation::{
    create_default_rules, filter, generate_id, get_rule_template, statistics, validate,
    RuleFilter, RuleStatistics, RuleValidationError,
};
