use std::sync::Arc;

use crate::engine::lifecycle::{BookingOrchestrator, LifecycleSettings};
use crate::observability::metrics::Metrics;
use crate::services::Collaborators;
use crate::services::memory::MemoryStore;

pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub orchestrator: BookingOrchestrator,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(settings: LifecycleSettings, notification_buffer_size: usize) -> Self {
        let store = Arc::new(MemoryStore::new(notification_buffer_size));
        let metrics = Metrics::new();
        let orchestrator = BookingOrchestrator::new(
            Collaborators::in_memory(store.clone()),
            settings,
            metrics.clone(),
        );

        Self {
            store,
            orchestrator,
            metrics,
        }
    }
}
