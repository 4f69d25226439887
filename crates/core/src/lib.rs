pub mod alert_rule;
pub mod config;
pub mod log_record;
pub mod store;

pub use alert_rule::*;
pub use log_record::{LogRecord, WorkloadIdentity};
pub use store::{window_start_epoch, Store, StoreError};
