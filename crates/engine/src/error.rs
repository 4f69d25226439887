use stupid_core::store::StoreError;
use stupid_rules::alert_validation::RuleValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] RuleValidationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("rule already exists: {0}")]
    AlreadyExists(String),

    #[error("engine has been stopped")]
    Stopped,
}
