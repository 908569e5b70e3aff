use std::sync::Arc;

use crate::config::AppConfig;
use crate::media::{cleanup::CleanupQueue, MediaRelay};
use crate::store::EntityStore;

/// Everything a handler needs, built once in `run()` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub media: Arc<dyn MediaRelay>,
    pub cleanup: CleanupQueue,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntityStore>,
        media: Arc<dyn MediaRelay>,
        config: AppConfig,
    ) -> Self {
        let cleanup = CleanupQueue::start(media.clone(), config.cleanup_max_attempts);
        Self {
            store,
            media,
            cleanup,
            config: Arc::new(config),
        }
    }
}
