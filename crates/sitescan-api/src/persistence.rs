use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use sitescan_types::{AuditReport, AuditStatus};

/// Filter for listing stored audits.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Lifecycle status name (`queued`, `running`, `completed`, `failed`).
    pub status: Option<String>,
}

/// Opaque persistence port. The engine depends only on this contract; the
/// backing store is swappable.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn save(&self, report: AuditReport) -> Result<()>;
    async fn load(&self, id: &str) -> Result<Option<AuditReport>>;
    async fn list(&self, filter: ListFilter) -> Result<Vec<String>>;
}

/// In-memory store; the default backing for a single-process deployment.
#[derive(Debug, Default)]
pub struct MemoryStore {
    reports: DashMap<String, AuditReport>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn save(&self, report: AuditReport) -> Result<()> {
        self.reports.insert(report.id.clone(), report);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<AuditReport>> {
        Ok(self.reports.get(id).map(|r| r.value().clone()))
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<String>> {
        let wanted = filter.status.map(|s| s.to_ascii_lowercase());
        let mut ids: Vec<String> = self
            .reports
            .iter()
            .filter(|entry| match &wanted {
                None => true,
                Some(status) => status_name(&entry.value().status) == *status,
            })
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

fn status_name(status: &AuditStatus) -> &'static str {
    match status {
        AuditStatus::Queued => "queued",
        AuditStatus::Running => "running",
        AuditStatus::Completed => "completed",
        AuditStatus::Failed { .. } => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitescan_types::AuditReport;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = MemoryStore::new();
        let mut report = AuditReport::queued("a1", "https://example.com");
        report.status = AuditStatus::Completed;
        store.save(report.clone()).await.expect("saves");

        let loaded = store
            .load("a1")
            .await
            .expect("load works")
            .expect("report present");
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.root_url, report.root_url);
        assert_eq!(loaded.status, report.status);
        assert_eq!(loaded.pages.len(), report.pages.len());
        assert_eq!(loaded.summary.total, report.summary.total);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let store = MemoryStore::new();
        store
            .save(AuditReport::queued("a1", "https://one.example"))
            .await
            .expect("saves");
        let mut done = AuditReport::queued("a2", "https://two.example");
        done.status = AuditStatus::Completed;
        store.save(done).await.expect("saves");

        let all = store.list(ListFilter::default()).await.expect("lists");
        assert_eq!(all, vec!["a1", "a2"]);

        let completed = store
            .list(ListFilter {
                status: Some("completed".to_string()),
            })
            .await
            .expect("lists");
        assert_eq!(completed, vec!["a2"]);
    }

    #[tokio::test]
    async fn load_of_unknown_id_is_none() {
        let store = MemoryStore::new();
        assert!(store.load("nope").await.expect("load works").is_none());
    }
}
