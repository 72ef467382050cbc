use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::IngestConfig;
use crate::services::fetch_client::FetchClient;
use crate::store::{CheckpointStore, EtfStore};

/// Everything a sync or metrics run needs, built once at startup and passed
/// down explicitly.
#[derive(Clone)]
pub struct IngestContext {
    pub store: Arc<dyn EtfStore>,
    pub fetch: Arc<FetchClient>,
    pub checkpoints: CheckpointStore,
    pub config: Arc<IngestConfig>,
    pub shutdown: Arc<AtomicBool>,
}

impl IngestContext {
    pub fn new(store: Arc<dyn EtfStore>, fetch: Arc<FetchClient>, config: IngestConfig) -> Self {
        Self {
            store,
            fetch,
            checkpoints: CheckpointStore::new(config.checkpoint_path.clone()),
            config: Arc::new(config),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
