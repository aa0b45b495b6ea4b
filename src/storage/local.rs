//! Local filesystem storage implementation.
//!
//! Every write goes to a temporary file first and is renamed into place, so
//! an interrupted run never leaves a truncated snapshot behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Competitor, HiringSnapshot, Report};
use crate::storage::{ProbeStorage, WriteSummary};

const FILE_TS_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path.display().to_string())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<WriteSummary> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let location = self.write_bytes(key, &bytes).await?;
        Ok(WriteSummary {
            location,
            sha256: hex::encode(Sha256::digest(&bytes)),
        })
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match self.read_bytes(path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn report_key(at: DateTime<Utc>) -> String {
        format!("reports/probe_{}.json", at.format(FILE_TS_FORMAT))
    }

    fn latest_key(company: &str) -> String {
        format!("snapshots/{}_jobs.json", Competitor::safe_name(company))
    }

    fn history_key(company: &str, at: DateTime<Utc>) -> String {
        format!(
            "history/{}/{}.json",
            Competitor::safe_name(company),
            at.format(FILE_TS_FORMAT)
        )
    }
}

#[async_trait]
impl ProbeStorage for LocalStorage {
    async fn write_report(&self, report: &Report) -> Result<WriteSummary> {
        let summary = self
            .write_json(&Self::report_key(report.generated_at), report)
            .await?;
        log::info!("Report written to {}", summary.location);
        Ok(summary)
    }

    async fn save_hiring_snapshot(&self, snapshot: &HiringSnapshot) -> Result<WriteSummary> {
        self.write_json(
            &Self::history_key(&snapshot.company, snapshot.captured_at),
            snapshot,
        )
        .await?;
        let summary = self
            .write_json(&Self::latest_key(&snapshot.company), snapshot)
            .await?;
        log::debug!(
            "{}: {} listing(s) saved to {}",
            snapshot.company,
            snapshot.total_jobs(),
            summary.location
        );
        Ok(summary)
    }

    async fn load_hiring_snapshot(&self, company: &str) -> Result<Option<HiringSnapshot>> {
        self.read_json(&self.path(&Self::latest_key(company))).await
    }

    async fn load_snapshot_file(&self, path: &Path) -> Result<HiringSnapshot> {
        self.read_json(path).await?.ok_or_else(|| {
            AppError::config(format!("Snapshot file not found: {}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AtsBackend, JobListing};
    use tempfile::TempDir;

    fn snapshot(company: &str, titles: &[&str]) -> HiringSnapshot {
        HiringSnapshot {
            company: company.into(),
            backend: AtsBackend::Greenhouse,
            board_url: Some("https://boards.greenhouse.io/acme".into()),
            partial: false,
            captured_at: Utc::now(),
            listings: titles
                .iter()
                .map(|t| JobListing::new(*t, "Engineering", "Remote", AtsBackend::Greenhouse))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes(&tmp.path().join("test.txt")).await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.load_hiring_snapshot("Nobody").await.unwrap().is_none());
        let err = storage
            .load_snapshot_file(&tmp.path().join("nope.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_snapshot_latest_and_history() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let snap = snapshot("Acme Corp", &["Backend Engineer", "Designer"]);
        let summary = storage.save_hiring_snapshot(&snap).await.unwrap();
        assert!(summary.location.ends_with("acme_corp_jobs.json"));
        assert_eq!(summary.sha256.len(), 64);

        let loaded = storage.load_hiring_snapshot("Acme Corp").await.unwrap().unwrap();
        assert_eq!(loaded.listings, snap.listings);
        assert_eq!(loaded.backend, AtsBackend::Greenhouse);

        let history: Vec<_> = std::fs::read_dir(tmp.path().join("history/acme_corp"))
            .unwrap()
            .collect();
        assert_eq!(history.len(), 1);

        let from_file = storage
            .load_snapshot_file(Path::new(&summary.location))
            .await
            .unwrap();
        assert_eq!(from_file.company, "Acme Corp");
    }

    #[tokio::test]
    async fn test_write_report() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let report = Report::new(6, Vec::new());
        let summary = storage.write_report(&report).await.unwrap();

        let raw = std::fs::read_to_string(&summary.location).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["competitor_count"], 0);
        assert_eq!(value["lookback_months"], 6);
    }
}
