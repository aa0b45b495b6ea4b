// src/models/snapshot.rs

//! Captured page renderings.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// When a snapshot was captured: an archive timestamp, or "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureTime {
    At(DateTime<Utc>),
    Current,
}

impl Ord for CaptureTime {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CaptureTime::At(a), CaptureTime::At(b)) => a.cmp(b),
            (CaptureTime::At(_), CaptureTime::Current) => Ordering::Less,
            (CaptureTime::Current, CaptureTime::At(_)) => Ordering::Greater,
            (CaptureTime::Current, CaptureTime::Current) => Ordering::Equal,
        }
    }
}

impl PartialOrd for CaptureTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CaptureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureTime::At(ts) => write!(f, "{}", ts.to_rfc3339()),
            CaptureTime::Current => f.write_str("current"),
        }
    }
}

impl Serialize for CaptureTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CaptureTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "current" {
            return Ok(CaptureTime::Current);
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| CaptureTime::At(ts.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

/// An immutable rendering of a page at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// The page URL (not the archive replay URL)
    pub source_url: String,

    /// Capture time of this rendering
    pub captured_at: CaptureTime,

    /// Markup as retrieved
    pub raw_content: String,

    /// SHA-256 of `raw_content`, hex encoded
    pub content_hash: String,
}

impl PageSnapshot {
    /// Build a snapshot, hashing the content.
    pub fn new(
        source_url: impl Into<String>,
        captured_at: CaptureTime,
        raw_content: impl Into<String>,
    ) -> Self {
        let raw_content = raw_content.into();
        let content_hash = hex::encode(Sha256::digest(raw_content.as_bytes()));
        Self {
            source_url: source_url.into(),
            captured_at,
            raw_content,
            content_hash,
        }
    }

    /// Snapshot of a page as it exists now.
    pub fn current(source_url: impl Into<String>, raw_content: impl Into<String>) -> Self {
        Self::new(source_url, CaptureTime::Current, raw_content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_content_hash_is_stable() {
        let a = PageSnapshot::current("https://example.com", "<html></html>");
        let b = PageSnapshot::current("https://example.com", "<html></html>");
        let c = PageSnapshot::current("https://example.com", "<html> </html>");
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn test_capture_time_ordering() {
        let older = CaptureTime::At(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let newer = CaptureTime::At(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let mut times = vec![CaptureTime::Current, newer, older];
        times.sort();
        assert_eq!(times, vec![older, newer, CaptureTime::Current]);
    }

    #[test]
    fn test_capture_time_serde() {
        let at = CaptureTime::At(Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap());
        let json = serde_json::to_string(&at).unwrap();
        assert_eq!(json, "\"2024-05-06T07:08:09+00:00\"");
        let back: CaptureTime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, at);

        let current: CaptureTime = serde_json::from_str("\"current\"").unwrap();
        assert_eq!(current, CaptureTime::Current);
    }
}
