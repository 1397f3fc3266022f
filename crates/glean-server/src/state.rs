use std::sync::Arc;

use glean_ai::Annotator;

/// Shared by every worker.
#[derive(Clone)]
pub struct AppState {
    pub annotator: Arc<Annotator>,
    pub max_batch_size: usize,
}

impl AppState {
    pub fn new(annotator: Arc<Annotator>, max_batch_size: usize) -> Self {
        Self {
            annotator,
            max_batch_size,
        }
    }
}
