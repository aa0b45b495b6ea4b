// src/models/hiring.rs

//! Job listings and hiring snapshots.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::AppError;

/// Applicant tracking system serving a careers page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtsBackend {
    Greenhouse,
    Lever,
    Ashby,
    Unknown,
}

impl AtsBackend {
    /// Back ends that have an adapter, in fallback probing order.
    pub const KNOWN: [AtsBackend; 3] = [AtsBackend::Greenhouse, AtsBackend::Lever, AtsBackend::Ashby];

    pub fn as_str(&self) -> &'static str {
        match self {
            AtsBackend::Greenhouse => "greenhouse",
            AtsBackend::Lever => "lever",
            AtsBackend::Ashby => "ashby",
            AtsBackend::Unknown => "unknown",
        }
    }

}

impl fmt::Display for AtsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AtsBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "greenhouse" => Ok(AtsBackend::Greenhouse),
            "lever" => Ok(AtsBackend::Lever),
            "ashby" => Ok(AtsBackend::Ashby),
            other => Err(AppError::config(format!(
                "Unsupported ATS type '{other}' (expected greenhouse, lever or ashby)"
            ))),
        }
    }
}

/// A job board located on (or inferred for) a careers page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtsBoard {
    pub backend: AtsBackend,

    /// Board URL as found on the page
    pub board_url: String,

    /// Company identifier on the back end, when the signature carries one
    pub slug: Option<String>,
}

/// A normalized open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub title: String,
    pub department: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<NaiveDate>,
    pub source_backend: AtsBackend,
}

impl JobListing {
    pub const DEFAULT_DEPARTMENT: &'static str = "General";
    pub const DEFAULT_LOCATION: &'static str = "Not specified";

    /// Build a listing, substituting defaults for blank department/location.
    pub fn new(
        title: impl Into<String>,
        department: impl Into<String>,
        location: impl Into<String>,
        source_backend: AtsBackend,
    ) -> Self {
        Self {
            title: collapse(&title.into()),
            department: non_blank(department.into(), Self::DEFAULT_DEPARTMENT),
            location: non_blank(location.into(), Self::DEFAULT_LOCATION),
            posted_at: None,
            source_backend,
        }
    }

    pub fn posted(mut self, date: Option<NaiveDate>) -> Self {
        self.posted_at = date;
        self
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_blank(value: String, default: &str) -> String {
    let value = collapse(&value);
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// Listing count for one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentCount {
    pub name: String,
    pub count: usize,
}

/// Share of listings matching a strategic focus area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicSignal {
    pub category: String,
    pub count: usize,
    pub percent: f64,
}

/// Focus areas and the title terms that indicate them.
const SIGNAL_TERMS: &[(&str, &[&str])] = &[
    ("AI/ML", &["ai", "machine learning", "ml", "llm", "gpt", "neural"]),
    ("Enterprise", &["enterprise", "b2b", "sales", "account executive"]),
    ("Platform", &["platform", "infrastructure", "devops", "sre"]),
    ("Security", &["security", "compliance", "soc", "privacy"]),
    ("Growth", &["growth", "marketing", "demand gen", "content"]),
    ("International", &["emea", "apac", "international", "remote"]),
];

/// Whole-word (or whole-phrase) containment on lowercase word tokens.
pub(crate) fn title_mentions(title: &str, term: &str) -> bool {
    let words: Vec<String> = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let padded = format!(" {} ", words.join(" "));
    padded.contains(&format!(" {} ", term.to_lowercase()))
}

/// Open positions for one company at one point in time.
///
/// Aggregates (`total_jobs`, `top_departments`, `strategic_signals`) are derived
/// from `listings` when serialized and are never stored separately.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HiringSnapshot {
    pub company: String,
    pub backend: AtsBackend,
    #[serde(default)]
    pub board_url: Option<String>,
    /// Served by the lower-fidelity fallback path
    #[serde(default)]
    pub partial: bool,
    pub captured_at: DateTime<Utc>,
    pub listings: Vec<JobListing>,
}

impl HiringSnapshot {
    /// Number of departments reported in `top_departments`.
    pub const TOP_DEPARTMENTS: usize = 5;

    pub fn total_jobs(&self) -> usize {
        self.listings.len()
    }

    /// Largest departments, by count descending then name ascending.
    pub fn top_departments(&self, limit: usize) -> Vec<DepartmentCount> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for job in &self.listings {
            *counts.entry(job.department.as_str()).or_default() += 1;
        }

        let mut ranked: Vec<DepartmentCount> = counts
            .into_iter()
            .map(|(name, count)| DepartmentCount {
                name: name.to_string(),
                count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        ranked.truncate(limit);
        ranked
    }

    /// Focus areas suggested by listing titles, most frequent first.
    pub fn strategic_signals(&self) -> Vec<StrategicSignal> {
        if self.listings.is_empty() {
            return Vec::new();
        }

        let mut signals: Vec<StrategicSignal> = SIGNAL_TERMS
            .iter()
            .filter_map(|(category, terms)| {
                let count = self
                    .listings
                    .iter()
                    .filter(|job| terms.iter().any(|t| title_mentions(&job.title, t)))
                    .count();
                (count > 0).then(|| StrategicSignal {
                    category: category.to_string(),
                    count,
                    percent: (count as f64 / self.listings.len() as f64 * 1000.0).round() / 10.0,
                })
            })
            .collect();
        // Stable sort keeps table order among equal counts
        signals.sort_by(|a, b| b.count.cmp(&a.count));
        signals
    }
}

impl Serialize for HiringSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("HiringSnapshot", 9)?;
        state.serialize_field("company", &self.company)?;
        state.serialize_field("backend", &self.backend)?;
        state.serialize_field("board_url", &self.board_url)?;
        state.serialize_field("partial", &self.partial)?;
        state.serialize_field("captured_at", &self.captured_at)?;
        state.serialize_field("total_jobs", &self.total_jobs())?;
        state.serialize_field("top_departments", &self.top_departments(Self::TOP_DEPARTMENTS))?;
        state.serialize_field("strategic_signals", &self.strategic_signals())?;
        state.serialize_field("listings", &self.listings)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: &str, dept: &str) -> JobListing {
        JobListing::new(title, dept, "Remote", AtsBackend::Lever)
    }

    fn snapshot(listings: Vec<JobListing>) -> HiringSnapshot {
        HiringSnapshot {
            company: "Acme".into(),
            backend: AtsBackend::Lever,
            board_url: None,
            partial: false,
            captured_at: Utc::now(),
            listings,
        }
    }

    #[test]
    fn test_listing_defaults() {
        let listing = JobListing::new("  Staff   Engineer ", " ", "", AtsBackend::Ashby);
        assert_eq!(listing.title, "Staff Engineer");
        assert_eq!(listing.department, "General");
        assert_eq!(listing.location, "Not specified");
    }

    #[test]
    fn test_top_departments_ordering() {
        let snap = snapshot(vec![
            job("A", "Sales"),
            job("B", "Engineering"),
            job("C", "Engineering"),
            job("D", "Design"),
            job("E", "Sales"),
            job("F", "Engineering"),
        ]);
        let top = snap.top_departments(2);
        assert_eq!(snap.total_jobs(), 6);
        assert_eq!(top[0], DepartmentCount { name: "Engineering".into(), count: 3 });
        assert_eq!(top[1], DepartmentCount { name: "Sales".into(), count: 2 });
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn test_strategic_signals_whole_words() {
        let snap = snapshot(vec![
            job("Senior ML Engineer", "Engineering"),
            job("Maintenance Coordinator", "Ops"),
            job("Enterprise Account Executive", "Sales"),
            job("AI Research Scientist", "Research"),
        ]);
        let signals = snap.strategic_signals();
        assert_eq!(signals[0].category, "AI/ML");
        assert_eq!(signals[0].count, 2);
        assert_eq!(signals[0].percent, 50.0);
        assert_eq!(signals[1].category, "Enterprise");
        assert!(!title_mentions("Maintenance Coordinator", "ai"));
    }

    #[test]
    fn test_serialized_aggregates() {
        let snap = snapshot(vec![job("Backend Engineer", "Engineering")]);
        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["total_jobs"], 1);
        assert_eq!(value["top_departments"][0]["name"], "Engineering");

        let back: HiringSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("Greenhouse".parse::<AtsBackend>().unwrap(), AtsBackend::Greenhouse);
        assert!("workday".parse::<AtsBackend>().is_err());
    }
}
