//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client and retry behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-destination request spacing
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Web archive endpoints for historical snapshots
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Orchestration settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Job board endpoints and limits
    #[serde(default)]
    pub hiring: HiringConfig,

    /// Secondary hiring data source
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Pricing plan extraction limits
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Report and snapshot locations
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::config("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::config("http.timeout_secs must be > 0"));
        }
        if self.probe.max_concurrent == 0 {
            return Err(AppError::config("probe.max_concurrent must be > 0"));
        }
        if self.probe.pricing_timeout_secs == 0 || self.probe.hiring_timeout_secs == 0 {
            return Err(AppError::config("probe branch timeouts must be > 0"));
        }
        if self.hiring.max_pages == 0 {
            return Err(AppError::config("hiring.max_pages must be > 0"));
        }
        if self.hiring.max_listings == 0 {
            return Err(AppError::config("hiring.max_listings must be > 0"));
        }
        if self.fallback.max_results == 0 {
            return Err(AppError::config("fallback.max_results must be > 0"));
        }
        if self.extraction.max_plan_name_length == 0 {
            return Err(AppError::config(
                "extraction.max_plan_name_length must be > 0",
            ));
        }
        for (field, value) in [
            ("archive.cdx_url", &self.archive.cdx_url),
            ("archive.replay_url", &self.archive.replay_url),
            ("hiring.greenhouse_url", &self.hiring.greenhouse_url),
            ("hiring.lever_url", &self.hiring.lever_url),
            ("hiring.ashby_api_url", &self.hiring.ashby_api_url),
            ("hiring.ashby_board_url", &self.hiring.ashby_board_url),
            ("fallback.aggregator_url", &self.fallback.aggregator_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::config(format!("{field} is not a valid URL: {e}")))?;
        }
        Ok(())
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on timeouts, 5xx and 429
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
        }
    }
}

/// Minimum spacing between request starts to the same host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Interval for hosts without an override
    #[serde(default = "defaults::default_interval")]
    pub default_interval_ms: u64,

    /// Per-host overrides
    #[serde(default = "defaults::host_limits")]
    pub hosts: Vec<HostLimit>,
}

impl RateLimitConfig {
    /// Interval for a host, honoring overrides (suffix match).
    pub fn interval_for(&self, host: &str) -> u64 {
        self.hosts
            .iter()
            .find(|h| host == h.host || host.ends_with(&format!(".{}", h.host)))
            .map(|h| h.interval_ms)
            .unwrap_or(self.default_interval_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: defaults::default_interval(),
            hosts: defaults::host_limits(),
        }
    }
}

/// Rate limit override for one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostLimit {
    pub host: String,
    pub interval_ms: u64,
}

/// Web archive endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// CDX capture index endpoint
    #[serde(default = "defaults::cdx_url")]
    pub cdx_url: String,

    /// Replay endpoint prefix; captures are fetched from `{replay_url}/{timestamp}id_/{url}`
    #[serde(default = "defaults::replay_url")]
    pub replay_url: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            cdx_url: defaults::cdx_url(),
            replay_url: defaults::replay_url(),
        }
    }
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// How far back the historical pricing snapshot is taken
    #[serde(default = "defaults::lookback_months")]
    pub lookback_months: u32,

    /// Competitors probed at the same time
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Deadline for the pricing branch of one competitor
    #[serde(default = "defaults::branch_timeout")]
    pub pricing_timeout_secs: u64,

    /// Deadline for the hiring branch of one competitor
    #[serde(default = "defaults::branch_timeout")]
    pub hiring_timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            lookback_months: defaults::lookback_months(),
            max_concurrent: defaults::max_concurrent(),
            pricing_timeout_secs: defaults::branch_timeout(),
            hiring_timeout_secs: defaults::branch_timeout(),
        }
    }
}

/// Job board endpoints and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiringConfig {
    #[serde(default = "defaults::greenhouse_url")]
    pub greenhouse_url: String,

    #[serde(default = "defaults::lever_url")]
    pub lever_url: String,

    #[serde(default = "defaults::ashby_api_url")]
    pub ashby_api_url: String,

    /// Hosted Ashby boards, parsed when the job-board query yields nothing
    #[serde(default = "defaults::ashby_board_url")]
    pub ashby_board_url: String,

    /// Pages fetched from a paginated board before stopping
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Listings kept per company
    #[serde(default = "defaults::max_listings")]
    pub max_listings: usize,
}

impl Default for HiringConfig {
    fn default() -> Self {
        Self {
            greenhouse_url: defaults::greenhouse_url(),
            lever_url: defaults::lever_url(),
            ashby_api_url: defaults::ashby_api_url(),
            ashby_board_url: defaults::ashby_board_url(),
            max_pages: defaults::max_pages(),
            max_listings: defaults::max_listings(),
        }
    }
}

/// Secondary hiring data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Job search endpoint keyed by company name
    #[serde(default = "defaults::aggregator_url")]
    pub aggregator_url: String,

    /// The aggregator's natural page size
    #[serde(default = "defaults::max_results")]
    pub max_results: usize,

    /// Try boards at slugs derived from the company name first
    #[serde(default = "defaults::enabled")]
    pub guess_board_slugs: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            aggregator_url: defaults::aggregator_url(),
            max_results: defaults::max_results(),
            guess_board_slugs: defaults::enabled(),
        }
    }
}

/// Pricing plan extraction limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Longer heading text is treated as prose, not a plan name
    #[serde(default = "defaults::max_plan_name_length")]
    pub max_plan_name_length: usize,

    /// Longer list items are treated as prose, not feature labels
    #[serde(default = "defaults::max_feature_length")]
    pub max_feature_length: usize,

    /// How many ancestors above a heading may form the plan card
    #[serde(default = "defaults::max_card_depth")]
    pub max_card_depth: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_plan_name_length: defaults::max_plan_name_length(),
            max_feature_length: defaults::max_feature_length(),
            max_card_depth: defaults::max_card_depth(),
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for reports and hiring snapshots
    #[serde(default = "defaults::storage_dir")]
    pub storage_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            storage_dir: defaults::storage_dir(),
        }
    }
}

mod defaults {
    use super::HostLimit;

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; Sentinel/1.0)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn max_retries() -> u32 {
        2
    }
    pub fn backoff_base() -> u64 {
        500
    }

    // Rate limit defaults
    pub fn default_interval() -> u64 {
        250
    }
    pub fn host_limits() -> Vec<HostLimit> {
        vec![
            HostLimit {
                host: "linkedin.com".into(),
                interval_ms: 3000,
            },
            HostLimit {
                host: "archive.org".into(),
                interval_ms: 1000,
            },
        ]
    }

    // Archive defaults
    pub fn cdx_url() -> String {
        "https://web.archive.org/cdx/search/cdx".into()
    }
    pub fn replay_url() -> String {
        "https://web.archive.org/web".into()
    }

    // Probe defaults
    pub fn lookback_months() -> u32 {
        6
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn branch_timeout() -> u64 {
        120
    }

    // Hiring defaults
    pub fn greenhouse_url() -> String {
        "https://job-boards.greenhouse.io".into()
    }
    pub fn lever_url() -> String {
        "https://jobs.lever.co".into()
    }
    pub fn ashby_api_url() -> String {
        "https://jobs.ashbyhq.com/api/non-user-graphql?op=ApiJobBoardWithTeams".into()
    }
    pub fn ashby_board_url() -> String {
        "https://jobs.ashbyhq.com".into()
    }
    pub fn max_pages() -> usize {
        10
    }
    pub fn max_listings() -> usize {
        1000
    }

    // Fallback defaults
    pub fn aggregator_url() -> String {
        "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search".into()
    }
    pub fn max_results() -> usize {
        15
    }
    pub fn enabled() -> bool {
        true
    }

    // Extraction defaults
    pub fn max_plan_name_length() -> usize {
        40
    }
    pub fn max_feature_length() -> usize {
        120
    }
    pub fn max_card_depth() -> usize {
        6
    }

    // Output defaults
    pub fn storage_dir() -> String {
        "storage".into()
    }
}
