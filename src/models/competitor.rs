// src/models/competitor.rs

//! Probe inputs and per-competitor results.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FailureKind, Result};
use crate::models::{AtsBackend, HiringSnapshot, HiringTrend, PricingDiff};
use crate::services::detector::AtsDetector;

/// A competitor to probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,

    #[serde(default)]
    pub pricing_url: Option<String>,

    #[serde(default)]
    pub careers_url: Option<String>,

    /// Explicit job board URL; bypasses detection
    #[serde(default)]
    pub ats_url: Option<String>,

    /// Back end of `ats_url`; inferred from the URL when omitted
    #[serde(default)]
    pub ats_type: Option<AtsBackend>,
}

impl Competitor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// File-system friendly name used for stored snapshots.
    pub fn safe_name(name: &str) -> String {
        name.trim()
            .to_lowercase()
            .replace(' ', "_")
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect()
    }

    fn validate(&self, detector: &AtsDetector) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::config("Competitor name is empty"));
        }

        for (field, value) in [
            ("pricing_url", &self.pricing_url),
            ("careers_url", &self.careers_url),
            ("ats_url", &self.ats_url),
        ] {
            if let Some(raw) = value {
                let parsed = url::Url::parse(raw).map_err(|e| {
                    AppError::config(format!("{}: invalid {field} '{raw}': {e}", self.name))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(AppError::config(format!(
                        "{}: {field} must be http(s), got '{raw}'",
                        self.name
                    )));
                }
            }
        }

        match (&self.ats_url, self.ats_type) {
            (None, Some(_)) => Err(AppError::config(format!(
                "{}: ats_type given without ats_url",
                self.name
            ))),
            (Some(_), Some(AtsBackend::Unknown)) => Err(AppError::config(format!(
                "{}: ats_type must be greenhouse, lever or ashby",
                self.name
            ))),
            // Same resolution the prober applies to the override
            (Some(url), ats_type) => detector
                .board_from_url(url, ats_type)
                .map(|_| ())
                .map_err(|e| AppError::config(format!("{}: {e}", self.name))),
            (None, None) => Ok(()),
        }
    }
}

/// Competitor list file (`[[competitors]]` tables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetitorList {
    #[serde(default)]
    pub competitors: Vec<Competitor>,
}

impl CompetitorList {
    /// Load a competitor list from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Cannot read competitor list {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            AppError::config(format!("Malformed competitor list {}: {e}", path.display()))
        })
    }

    /// Reject lists that cannot be probed.
    pub fn validate(&self) -> Result<()> {
        if self.competitors.is_empty() {
            return Err(AppError::config("No competitors to probe"));
        }

        let detector = AtsDetector::new()?;
        let mut seen = HashSet::new();
        for competitor in &self.competitors {
            competitor.validate(&detector)?;
            if !seen.insert(competitor.name.trim().to_lowercase()) {
                return Err(AppError::config(format!(
                    "Duplicate competitor '{}'",
                    competitor.name
                )));
            }
        }
        Ok(())
    }
}

/// Result of one acquisition branch: data, or the reason it is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BranchOutcome<T> {
    Ok(T),
    Unavailable { kind: FailureKind, reason: String },
}

impl<T> BranchOutcome<T> {
    pub fn unavailable(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            kind,
            reason: reason.into(),
        }
    }

    pub fn from_error(error: &AppError) -> Self {
        Self::unavailable(error.failure_kind(), error.to_string())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Ok(data) => Some(data),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<(FailureKind, &str)> {
        match self {
            Self::Ok(_) => None,
            Self::Unavailable { kind, reason } => Some((*kind, reason)),
        }
    }
}

/// Everything learned about one competitor in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorRecord {
    pub name: String,
    pub pricing_url: Option<String>,
    pub careers_url: Option<String>,
    pub pricing: BranchOutcome<PricingDiff>,
    pub hiring: BranchOutcome<HiringSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hiring_trend: Option<HiringTrend>,
}

impl CompetitorRecord {
    /// Same record with a hiring trend attached.
    pub fn with_trend(self, trend: HiringTrend) -> Self {
        Self {
            hiring_trend: Some(trend),
            ..self
        }
    }
}

/// Aggregate output of a probe run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub competitor_count: usize,
    pub lookback_months: u32,
    pub results: Vec<CompetitorRecord>,
}

impl Report {
    pub fn new(lookback_months: u32, results: Vec<CompetitorRecord>) -> Self {
        Self {
            generated_at: Utc::now(),
            competitor_count: results.len(),
            lookback_months,
            results,
        }
    }
}
