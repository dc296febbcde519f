use crate::persistence::{AuditStore, MemoryStore};
use dashmap::DashMap;
use sitescan_spider::CancelFlag;
use std::sync::Arc;

/// Handle to a live run: the cancellation flag its workers observe.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub cancel: CancelFlag,
}

/// Shared application state: the persistence port plus the registry of
/// in-flight runs. Everything is cheaply cloneable; runs clean their own
/// registry entries up when they finish.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuditStore>,
    pub runs: Arc<DashMap<String, RunHandle>>,
}

impl AppState {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            runs: Arc::new(DashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn register_run(&self, audit_id: &str) -> CancelFlag {
        let cancel = CancelFlag::new();
        self.runs.insert(
            audit_id.to_string(),
            RunHandle {
                cancel: cancel.clone(),
            },
        );
        cancel
    }

    pub fn finish_run(&self, audit_id: &str) {
        self.runs.remove(audit_id);
    }
}
