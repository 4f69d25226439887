//! Shared state for the alerting control plane. Deliberately separate from
//! the knowledge-graph `AppState`: this surface only ever needs the engine
//! and the store it was built with.

use std::sync::Arc;

use stupid_alert_engine::Engine;
use stupid_core::store::Store;

pub struct AlertAppState {
    pub engine: Arc<Engine>,
    pub store: Arc<dyn Store>,
}
