use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    newest_match, normalize_lookup, ReportStore, ReportStoreResult, ReportSummary, SavedReport,
};
use crate::domain::EvaluationResult;

/// In-memory report store keyed by content hash.
///
/// Keeps every saved result, so it doubles as a re-serve cache for repeated
/// submissions of identical content.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: Mutex<HashMap<String, Vec<EvaluationResult>>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<EvaluationResult>>> {
        self.reports.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn save(&self, result: &EvaluationResult) -> ReportStoreResult<SavedReport> {
        let id = result.report_id();
        self.lock()
            .entry(result.content_hash.clone())
            .or_default()
            .push(result.clone());
        Ok(SavedReport {
            locations: vec![format!("memory:{}", id.file_stem())],
            id,
        })
    }

    async fn load(&self, hash: &str) -> ReportStoreResult<Option<EvaluationResult>> {
        let prefix = normalize_lookup(hash)?;
        let matches = self
            .lock()
            .iter()
            .filter(|(content_hash, _)| content_hash.starts_with(&prefix))
            .flat_map(|(_, results)| results.iter().cloned())
            .collect();
        newest_match(&prefix, matches)
    }

    async fn list(&self) -> ReportStoreResult<Vec<ReportSummary>> {
        let mut summaries: Vec<ReportSummary> = self
            .lock()
            .values()
            .flatten()
            .map(ReportSummary::of)
            .collect();
        summaries.sort_by(|a, b| b.id.timestamp.cmp(&a.id.timestamp));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::test_support::sample_result;
    use crate::reports::ReportStoreError;

    #[tokio::test]
    async fn save_then_load_latest() {
        let store = MemoryReportStore::new();
        let first = sample_result("same content", 1);
        let second = sample_result("same content", 2);
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        assert_eq!(store.len(), 2);
        let loaded = store.load(&first.content_hash).await.unwrap().unwrap();
        assert_eq!(loaded.timestamp, second.timestamp);
    }

    #[tokio::test]
    async fn shared_prefix_across_contents_is_ambiguous() {
        let store = MemoryReportStore::new();
        let a = sample_result("a", 1);
        let mut b = sample_result("b", 2);
        // Force a shared prefix.
        b.content_hash = format!("{}{}", &a.content_hash[..6], &b.content_hash[6..]);
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        let err = store.load(&a.content_hash[..6]).await.unwrap_err();
        assert!(matches!(err, ReportStoreError::Ambiguous { count: 2, .. }));
        assert!(store.load(&a.content_hash).await.unwrap().is_some());
    }
}
