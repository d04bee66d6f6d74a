use std::sync::Arc;

use crate::services::WorkerRegistry;

/// Application state for worker handlers
pub struct AppState {
    pub worker_registry: Arc<WorkerRegistry>,
}
