//! Persistence collaborator boundary.
//!
//! The engine hands finished composite reports to a [`ReportStore`] and
//! never reads persisted state mid-job. Durable backends live outside this
//! crate; the in-memory implementation here serves tests and embeddings
//! that do not need durability. A save failure is reported back as a
//! warning on the in-memory report, never as a job failure.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::engine::aggregator::CompositeReport;

/// Errors from the persistence collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// No report persisted under this key
    #[error("no report stored for {0}")]
    NotFound(String),

    /// Backend fault; the caller logs and continues
    #[error("report store unavailable: {0}")]
    Unavailable(String),
}

/// Narrow save/load contract over durable report storage.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Durably record the finished report for a normalized URL key.
    async fn save(&self, key: &str, report: &CompositeReport) -> Result<(), StoreError>;

    /// Load the last persisted report for a key.
    async fn load(&self, key: &str) -> Result<Arc<CompositeReport>, StoreError>;
}

/// Keeps reports in a concurrent map. Not durable.
#[derive(Default)]
pub struct MemoryReportStore {
    reports: DashMap<String, Arc<CompositeReport>>,
}

impl MemoryReportStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            reports: DashMap::new(),
        }
    }

    /// Number of stored reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn save(&self, key: &str, report: &CompositeReport) -> Result<(), StoreError> {
        self.reports
            .insert(key.to_string(), Arc::new(report.clone()));
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Arc<CompositeReport>, StoreError> {
        self.reports
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::job::JobStatus;
    use std::collections::BTreeMap;

    fn report(key: &str) -> CompositeReport {
        CompositeReport {
            url: key.to_string(),
            fetch_url: key.to_string(),
            status: JobStatus::Complete,
            complete: true,
            slots: BTreeMap::new(),
            generated_at: chrono::Utc::now(),
            warnings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemoryReportStore::new();
        store
            .save("https://example.com/", &report("https://example.com/"))
            .await
            .expect("memory store save cannot fail");

        let loaded = store
            .load("https://example.com/")
            .await
            .expect("saved report should load");
        assert_eq!(loaded.url, "https://example.com/");
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let store = MemoryReportStore::new();
        assert!(matches!(
            store.load("https://example.com/").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = MemoryReportStore::new();
        store.save("k", &report("k")).await.unwrap();
        let mut second = report("k");
        second.warnings.push("persisted twice".to_string());
        store.save("k", &second).await.unwrap();

        let loaded = store.load("k").await.unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(store.len(), 1);
    }
}
