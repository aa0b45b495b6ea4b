//! Page snapshot retrieval, current and archived.
//!
//! Archived captures come from a Wayback-style archive: the CDX index picks
//! the latest successful capture at or before the requested time, and the
//! raw capture is replayed with the `id_` modifier so no archive chrome is
//! injected into the markup.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{ArchiveConfig, CaptureTime, PageSnapshot};
use crate::utils::http::HttpFetcher;

/// Archive timestamp format (`YYYYMMDDhhmmss`).
const ARCHIVE_TS_FORMAT: &str = "%Y%m%d%H%M%S";

/// Source of page renderings.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// The nearest capture of `url` at or before `as_of`, never after.
    async fn retrieve(&self, url: &str, as_of: DateTime<Utc>) -> Result<PageSnapshot>;

    /// The page as it exists now.
    async fn retrieve_current(&self, url: &str) -> Result<PageSnapshot>;
}

/// Retrieves live pages directly and past pages from the web archive.
pub struct SnapshotRetriever {
    fetcher: HttpFetcher,
    config: ArchiveConfig,
}

impl SnapshotRetriever {
    pub fn new(fetcher: HttpFetcher, config: &ArchiveConfig) -> Self {
        Self {
            fetcher,
            config: config.clone(),
        }
    }

    /// Look up the latest capture at or before `as_of`.
    ///
    /// Returns the capture timestamp and the URL as archived.
    async fn find_capture(
        &self,
        url: &str,
        as_of: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, String)> {
        let unavailable = || AppError::SnapshotUnavailable {
            url: url.to_string(),
            as_of: as_of.to_rfc3339(),
        };

        let query = [
            ("url", url.to_string()),
            ("to", as_of.format(ARCHIVE_TS_FORMAT).to_string()),
            ("output", "json".to_string()),
            ("fl", "timestamp,original".to_string()),
            ("filter", "statuscode:200".to_string()),
            ("limit", "-1".to_string()),
        ];
        let rows: Vec<Vec<String>> = self.fetcher.get_json(&self.config.cdx_url, &query).await?;

        let (timestamp, original) = rows
            .into_iter()
            .filter(|row| row.len() >= 2 && row[0] != "timestamp")
            .filter_map(|row| {
                let ts = parse_archive_timestamp(&row[0])?;
                Some((ts, row[1].clone()))
            })
            // The index may return captures past the bound; they are never used
            .filter(|(ts, _)| *ts <= as_of)
            .max_by_key(|(ts, _)| *ts)
            .ok_or_else(unavailable)?;

        Ok((timestamp, original))
    }
}

#[async_trait]
impl SnapshotSource for SnapshotRetriever {
    async fn retrieve(&self, url: &str, as_of: DateTime<Utc>) -> Result<PageSnapshot> {
        let (captured_at, original) = self.find_capture(url, as_of).await?;
        let replay = format!(
            "{}/{}id_/{}",
            self.config.replay_url.trim_end_matches('/'),
            captured_at.format(ARCHIVE_TS_FORMAT),
            original
        );

        log::debug!("Replaying {} captured {}", url, captured_at);
        let content = self.fetcher.get_text(&replay).await?;
        Ok(PageSnapshot::new(url, CaptureTime::At(captured_at), content))
    }

    async fn retrieve_current(&self, url: &str) -> Result<PageSnapshot> {
        let content = self.fetcher.get_text(url).await?;
        Ok(PageSnapshot::current(url, content))
    }
}

fn parse_archive_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, ARCHIVE_TS_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
