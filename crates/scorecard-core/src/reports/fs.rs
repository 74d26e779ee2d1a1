use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{
    newest_match, normalize_lookup, parse_json, render_json, render_markdown, ReportStore,
    ReportStoreError, ReportStoreResult, ReportSummary, SavedReport,
};
use crate::domain::EvaluationResult;
use crate::identity::{ReportId, SHORT_HASH_LEN};

/// Filesystem report store.
///
/// Layout: `<root>/report_<YYYYmmdd_HHMMSS>_<hash prefix>.{json,md}`. Lookups
/// narrow candidates by the hash prefix in the file name, then verify the full
/// hash inside the JSON.
#[derive(Debug, Clone)]
pub struct FsReportStore {
    root: PathBuf,
}

impl FsReportStore {
    /// The directory is created lazily on first save.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn save_blocking(root: &Path, result: &EvaluationResult) -> ReportStoreResult<SavedReport> {
        fs::create_dir_all(root)?;
        let id = result.report_id();
        let stem = id.file_stem();

        let json_path = root.join(format!("{stem}.json"));
        write_atomic(root, &json_path, render_json(result, true)?.as_bytes())?;
        let md_path = root.join(format!("{stem}.md"));
        write_atomic(root, &md_path, render_markdown(result).as_bytes())?;

        debug!(path = %json_path.display(), "saved report");
        Ok(SavedReport {
            id,
            locations: vec![
                json_path.display().to_string(),
                md_path.display().to_string(),
            ],
        })
    }

    /// Every `report_*.json` in the root, with its short hash.
    fn report_files(root: &Path) -> ReportStoreResult<Vec<(PathBuf, String)>> {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let short = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(ReportId::short_hash_from_stem)
                .map(str::to_string);
            if let Some(short) = short {
                files.push((path, short));
            }
        }
        Ok(files)
    }

    fn read_report(path: &Path) -> ReportStoreResult<EvaluationResult> {
        let text = fs::read_to_string(path)?;
        parse_json(&text).map_err(|e| ReportStoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn load_blocking(root: &Path, hash: &str) -> ReportStoreResult<Option<EvaluationResult>> {
        let prefix = normalize_lookup(hash)?;
        let file_prefix = &prefix[..prefix.len().min(SHORT_HASH_LEN)];

        let mut matches = Vec::new();
        for (path, short) in Self::report_files(root)? {
            if !short.starts_with(file_prefix) {
                continue;
            }
            match Self::read_report(&path) {
                Ok(result) if result.content_hash.starts_with(&prefix) => matches.push(result),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable report"),
            }
        }
        newest_match(&prefix, matches)
    }

    fn list_blocking(root: &Path) -> ReportStoreResult<Vec<ReportSummary>> {
        let mut summaries = Vec::new();
        for (path, _) in Self::report_files(root)? {
            match Self::read_report(&path) {
                Ok(result) => summaries.push(ReportSummary::of(&result)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable report"),
            }
        }
        summaries.sort_by(|a, b| b.id.timestamp.cmp(&a.id.timestamp));
        Ok(summaries)
    }
}

/// Write to a temp file in `dir`, then rename over `path`.
fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> ReportStoreResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

async fn blocking<T, F>(f: F) -> ReportStoreResult<T>
where
    F: FnOnce() -> ReportStoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ReportStoreError::Io(std::io::Error::other(e)))?
}

#[async_trait]
impl ReportStore for FsReportStore {
    async fn save(&self, result: &EvaluationResult) -> ReportStoreResult<SavedReport> {
        let root = self.root.clone();
        let result = result.clone();
        blocking(move || Self::save_blocking(&root, &result)).await
    }

    async fn load(&self, hash: &str) -> ReportStoreResult<Option<EvaluationResult>> {
        let root = self.root.clone();
        let hash = hash.to_string();
        blocking(move || Self::load_blocking(&root, &hash)).await
    }

    async fn list(&self) -> ReportStoreResult<Vec<ReportSummary>> {
        let root = self.root.clone();
        blocking(move || Self::list_blocking(&root)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::test_support::sample_result;

    fn make_store() -> (tempfile::TempDir, FsReportStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsReportStore::new(dir.path().join("reports"));
        (dir, store)
    }

    #[tokio::test]
    async fn save_writes_json_and_markdown_pair() {
        let (_dir, store) = make_store();
        let result = sample_result("hello", 0);
        let saved = store.save(&result).await.unwrap();

        let stem = result.report_id().file_stem();
        assert_eq!(saved.locations.len(), 2);
        assert!(store.root().join(format!("{stem}.json")).exists());
        assert!(store.root().join(format!("{stem}.md")).exists());
    }

    #[tokio::test]
    async fn load_by_full_or_short_hash_returns_newest() {
        let (_dir, store) = make_store();
        let older = sample_result("hello", 0);
        let newer = sample_result("hello", 30);
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();
        store.save(&sample_result("other", 10)).await.unwrap();

        let by_full = store.load(&older.content_hash).await.unwrap().unwrap();
        assert_eq!(by_full.timestamp, newer.timestamp);
        let by_short = store.load(&older.content_hash[..8]).await.unwrap().unwrap();
        assert_eq!(by_short, newer);
    }

    #[tokio::test]
    async fn load_missing_hash_is_none_even_without_directory() {
        let (_dir, store) = make_store();
        assert!(store.load("deadbeef").await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_skips_corrupt_files() {
        let (_dir, store) = make_store();
        store.save(&sample_result("a", 1)).await.unwrap();
        store.save(&sample_result("b", 2)).await.unwrap();
        std::fs::write(
            store.root().join("report_20250101_000000_abcdef12.json"),
            "{not json",
        )
        .unwrap();
        std::fs::write(store.root().join("notes.json"), "{}").unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].id.timestamp > listed[1].id.timestamp);
    }
}
