pub mod ingest_bridge;
pub mod log_source;

pub use ingest_bridge::{Context, IngestBridge, IngestBridgeConfig, IngestBridgeError, IngestMetrics};
pub use log_source::{IngestError, InMemoryLogSource, LogSource, Message};
