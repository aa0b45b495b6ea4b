//! Probe orchestration.
//!
//! Each competitor runs two independent branches concurrently:
//!
//! - pricing: archived snapshot -> current snapshot -> diff
//! - hiring: board override or detection -> adapter -> fallback on failure
//!
//! A failed or timed-out branch is recorded as unavailable in that
//! competitor's record and never affects the sibling branch or other
//! competitors. Records come back in input order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Months, Utc};
use futures::{StreamExt, stream};

use crate::error::{FailureKind, Result};
use crate::models::{
    AtsBackend, AtsBoard, BranchOutcome, Competitor, CompetitorRecord, Config, HiringSnapshot,
    PricingDiff,
};
use crate::pipeline::diff::DiffEngine;
use crate::services::adapters::{AtsAdapter, JobBoard, collect_jobs};
use crate::services::detector::AtsDetector;
use crate::services::fallback::{FallbackResolver, JobFallback};
use crate::services::retriever::{SnapshotRetriever, SnapshotSource};
use crate::utils::http::HttpFetcher;
use crate::utils::rate_limit::RateLimiter;

/// Runs pricing and hiring probes for a batch of competitors.
pub struct Prober {
    snapshots: Arc<dyn SnapshotSource>,
    boards: HashMap<AtsBackend, Arc<dyn JobBoard>>,
    fallback: Arc<dyn JobFallback>,
    detector: AtsDetector,
    diff: DiffEngine,
    max_concurrent: usize,
    pricing_timeout: Duration,
    hiring_timeout: Duration,
    max_listings: usize,
}

impl Prober {
    /// Build a prober with network sources from configuration.
    ///
    /// All sources share one rate limiter, so concurrent competitors hitting
    /// the same host are spaced out together.
    pub fn new(config: &Config) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let fetcher = HttpFetcher::new(&config.http, limiter)?;

        let boards = AtsAdapter::all(&fetcher, &config.hiring)
            .into_iter()
            .map(|adapter| (adapter.backend(), Arc::new(adapter) as Arc<dyn JobBoard>))
            .collect();

        Self::with_sources(
            config,
            Arc::new(SnapshotRetriever::new(fetcher.clone(), &config.archive)),
            boards,
            Arc::new(FallbackResolver::new(fetcher, &config.fallback, &config.hiring)),
        )
    }

    /// Build a prober around explicit sources.
    pub fn with_sources(
        config: &Config,
        snapshots: Arc<dyn SnapshotSource>,
        boards: HashMap<AtsBackend, Arc<dyn JobBoard>>,
        fallback: Arc<dyn JobFallback>,
    ) -> Result<Self> {
        Ok(Self {
            snapshots,
            boards,
            fallback,
            detector: AtsDetector::new()?,
            diff: DiffEngine::new(&config.extraction)?,
            max_concurrent: config.probe.max_concurrent.max(1),
            pricing_timeout: Duration::from_secs(config.probe.pricing_timeout_secs),
            hiring_timeout: Duration::from_secs(config.probe.hiring_timeout_secs),
            max_listings: config.hiring.max_listings,
        })
    }

    /// Probe every competitor; one record per input, in input order.
    pub async fn run(&self, competitors: &[Competitor], lookback_months: u32) -> Vec<CompetitorRecord> {
        let now = Utc::now();
        let as_of = now
            .checked_sub_months(Months::new(lookback_months))
            .unwrap_or(now);
        log::info!(
            "Probing {} competitor(s), pricing baseline at or before {}",
            competitors.len(),
            as_of.format("%Y-%m-%d")
        );

        let mut records: Vec<(usize, CompetitorRecord)> = stream::iter(competitors.iter().enumerate())
            .map(|(index, competitor)| async move {
                (index, self.probe_competitor(competitor, as_of).await)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        records.sort_by_key(|(index, _)| *index);
        records.into_iter().map(|(_, record)| record).collect()
    }

    async fn probe_competitor(&self, competitor: &Competitor, as_of: DateTime<Utc>) -> CompetitorRecord {
        let pricing = async {
            match competitor.pricing_url.as_deref() {
                Some(url) => {
                    bounded("pricing", &competitor.name, self.pricing_timeout, self.pricing_branch(url, as_of))
                        .await
                }
                None => BranchOutcome::unavailable(FailureKind::NotConfigured, "No pricing URL"),
            }
        };
        let hiring = bounded(
            "hiring",
            &competitor.name,
            self.hiring_timeout,
            self.hiring_branch(competitor),
        );

        let (pricing, hiring) = tokio::join!(pricing, hiring);
        log::info!(
            "{}: pricing {}, hiring {}",
            competitor.name,
            status(&pricing),
            status(&hiring)
        );

        CompetitorRecord {
            name: competitor.name.clone(),
            pricing_url: competitor.pricing_url.clone(),
            careers_url: competitor.careers_url.clone(),
            pricing,
            hiring,
            hiring_trend: None,
        }
    }

    async fn pricing_branch(&self, url: &str, as_of: DateTime<Utc>) -> Result<PricingDiff> {
        let past = self.snapshots.retrieve(url, as_of).await?;
        let present = self.snapshots.retrieve_current(url).await?;
        Ok(self.diff.compare(&past, &present))
    }

    async fn hiring_branch(&self, competitor: &Competitor) -> Result<HiringSnapshot> {
        let board = self.locate_board(competitor).await?;

        if let Some(board) = &board {
            match (&board.slug, self.boards.get(&board.backend)) {
                (Some(slug), Some(adapter)) => {
                    match collect_jobs(adapter.as_ref(), slug, self.max_listings).await {
                        Ok(listings) => {
                            return Ok(HiringSnapshot {
                                company: competitor.name.clone(),
                                backend: board.backend,
                                board_url: Some(board.board_url.clone()),
                                partial: false,
                                captured_at: Utc::now(),
                                listings,
                            });
                        }
                        Err(e) => log::warn!("{}: {}, using fallback", competitor.name, e),
                    }
                }
                _ => log::info!(
                    "{}: {} board without identifier, using fallback",
                    competitor.name,
                    board.backend
                ),
            }
        }

        let found = self.fallback.resolve(&competitor.name).await?;
        Ok(HiringSnapshot {
            company: competitor.name.clone(),
            backend: found.backend,
            board_url: found.board_url,
            partial: true,
            captured_at: Utc::now(),
            listings: found.listings,
        })
    }

    /// The explicit override, else the board detected on the careers page.
    async fn locate_board(&self, competitor: &Competitor) -> Result<Option<AtsBoard>> {
        if let Some(ats_url) = competitor.ats_url.as_deref() {
            return self
                .detector
                .board_from_url(ats_url, competitor.ats_type)
                .map(Some);
        }

        let Some(careers_url) = competitor.careers_url.as_deref() else {
            log::info!("{}: no careers URL, using fallback", competitor.name);
            return Ok(None);
        };

        match self.snapshots.retrieve_current(careers_url).await {
            Ok(page) => {
                let board = self.detector.detect_board(&page);
                if board.is_none() {
                    log::info!("{}: no known job board on {}", competitor.name, careers_url);
                }
                Ok(board)
            }
            Err(e) => {
                log::warn!("{}: careers page unavailable ({}), using fallback", competitor.name, e);
                Ok(None)
            }
        }
    }
}

/// Run a branch under its deadline, converting failures into markers.
async fn bounded<T>(
    branch: &str,
    company: &str,
    limit: Duration,
    work: impl Future<Output = Result<T>>,
) -> BranchOutcome<T> {
    match tokio::time::timeout(limit, work).await {
        Ok(Ok(value)) => BranchOutcome::Ok(value),
        Ok(Err(e)) => {
            log::warn!("{}: {} branch failed: {}", company, branch, e);
            BranchOutcome::from_error(&e)
        }
        Err(_) => {
            log::warn!("{}: {} branch timed out after {:?}", company, branch, limit);
            BranchOutcome::unavailable(
                FailureKind::BranchTimeout,
                format!("{branch} branch timed out after {}s", limit.as_secs()),
            )
        }
    }
}

fn status<T>(outcome: &BranchOutcome<T>) -> String {
    match outcome.failure() {
        None => "ok".to_string(),
        Some((kind, _)) => format!("unavailable ({kind:?})"),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::TimeZone;
    use futures::stream::BoxStream;

    use super::*;
    use crate::error::AppError;
    use crate::models::{CaptureTime, JobListing, PageSnapshot};
    use crate::services::fallback::FallbackJobs;

    /// Pages keyed by URL; missing past pages are unavailable.
    #[derive(Default)]
    struct FakePages {
        past: HashMap<String, String>,
        current: HashMap<String, String>,
        delays: HashMap<String, Duration>,
    }

    impl FakePages {
        fn pricing(mut self, url: &str, past: &str, current: &str) -> Self {
            self.past.insert(url.into(), past.into());
            self.current.insert(url.into(), current.into());
            self
        }

        fn page(mut self, url: &str, html: &str) -> Self {
            self.current.insert(url.into(), html.into());
            self
        }

        fn delay(mut self, url: &str, secs: u64) -> Self {
            self.delays.insert(url.into(), Duration::from_secs(secs));
            self
        }
    }

    #[async_trait]
    impl SnapshotSource for FakePages {
        async fn retrieve(&self, url: &str, as_of: DateTime<Utc>) -> Result<PageSnapshot> {
            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            let content = self.past.get(url).ok_or_else(|| AppError::SnapshotUnavailable {
                url: url.into(),
                as_of: as_of.to_rfc3339(),
            })?;
            let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
            Ok(PageSnapshot::new(url, CaptureTime::At(at), content.clone()))
        }

        async fn retrieve_current(&self, url: &str) -> Result<PageSnapshot> {
            let content = self.current.get(url).ok_or_else(|| AppError::Status {
                url: url.into(),
                status: 404,
            })?;
            Ok(PageSnapshot::current(url, content.clone()))
        }
    }

    /// Board serving fixed listings per slug; other slugs fail.
    struct FakeBoard {
        backend: AtsBackend,
        slugs: HashMap<String, Vec<String>>,
        delay: Option<Duration>,
    }

    impl JobBoard for FakeBoard {
        fn backend(&self) -> AtsBackend {
            self.backend
        }

        fn fetch_jobs<'a>(&'a self, company: &'a str) -> BoxStream<'a, Result<JobListing>> {
            let backend = self.backend;
            let delay = self.delay;
            let result = self.slugs.get(company).cloned().ok_or_else(|| {
                AppError::adapter(backend, format!("no board '{company}'"))
            });
            stream::once(async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                result
            })
            .flat_map(move |result| match result {
                Ok(titles) => stream::iter(
                    titles
                        .into_iter()
                        .map(move |t| Ok(JobListing::new(t, "Engineering", "Remote", backend)))
                        .collect::<Vec<_>>(),
                )
                .boxed(),
                Err(e) => stream::iter(vec![Err(e)]).boxed(),
            })
            .boxed()
        }
    }

    struct FakeFallback;

    #[async_trait]
    impl JobFallback for FakeFallback {
        async fn resolve(&self, company: &str) -> Result<FallbackJobs> {
            if company == "Nobody" {
                return Err(AppError::no_hiring_data(company));
            }
            Ok(FallbackJobs {
                backend: AtsBackend::Unknown,
                board_url: None,
                listings: vec![JobListing::new("Aggregated Role", "", "", AtsBackend::Unknown)],
            })
        }
    }

    const PAST: &str = r#"<div class="plans"><div><h3>Pro</h3><p>$10/mo</p></div></div>"#;
    const NOW: &str = r#"<div class="plans"><div><h3>Pro</h3><p>$15/mo</p></div></div>"#;

    fn prober(pages: FakePages, board_delay: Option<Duration>) -> Prober {
        let lever = FakeBoard {
            backend: AtsBackend::Lever,
            slugs: HashMap::from([("acme".to_string(), vec!["Platform Engineer".to_string()])]),
            delay: board_delay,
        };
        let boards: HashMap<AtsBackend, Arc<dyn JobBoard>> =
            HashMap::from([(AtsBackend::Lever, Arc::new(lever) as Arc<dyn JobBoard>)]);

        let mut config = Config::default();
        config.probe.pricing_timeout_secs = 30;
        config.probe.hiring_timeout_secs = 30;
        Prober::with_sources(&config, Arc::new(pages), boards, Arc::new(FakeFallback)).unwrap()
    }

    fn competitor(name: &str, pricing: Option<&str>, careers: Option<&str>) -> Competitor {
        Competitor {
            name: name.into(),
            pricing_url: pricing.map(str::to_string),
            careers_url: careers.map(str::to_string),
            ..Competitor::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_input_order() {
        let pages = FakePages::default()
            .pricing("https://a.com/pricing", PAST, NOW)
            .pricing("https://b.com/pricing", PAST, NOW)
            .pricing("https://c.com/pricing", PAST, NOW)
            .delay("https://a.com/pricing", 5)
            .delay("https://c.com/pricing", 2);
        let competitors = vec![
            competitor("A", Some("https://a.com/pricing"), None),
            competitor("B", Some("https://b.com/pricing"), None),
            competitor("C", Some("https://c.com/pricing"), None),
        ];

        let records = prober(pages, None).run(&competitors, 6).await;
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(records.iter().all(|r| r.pricing.is_ok()));
    }

    #[tokio::test]
    async fn test_branch_isolation() {
        let pages = FakePages::default()
            .page("https://x.com/pricing", NOW)
            .pricing("https://y.com/pricing", PAST, NOW)
            .page("https://x.com/careers", r#"<a href="https://jobs.lever.co/acme">Jobs</a>"#);
        let competitors = vec![
            competitor("X", Some("https://x.com/pricing"), Some("https://x.com/careers")),
            competitor("Y", Some("https://y.com/pricing"), None),
        ];

        let records = prober(pages, None).run(&competitors, 6).await;

        let x = &records[0];
        assert_eq!(
            x.pricing.failure().map(|(kind, _)| kind),
            Some(FailureKind::SnapshotUnavailable)
        );
        let hiring = x.hiring.data().unwrap();
        assert_eq!(hiring.backend, AtsBackend::Lever);
        assert!(!hiring.partial);
        assert_eq!(hiring.listings[0].title, "Platform Engineer");

        let y = &records[1];
        let diff = y.pricing.data().unwrap();
        assert_eq!(diff.price_changes.len(), 1);
        assert_eq!(diff.price_changes[0].percent_delta, Some(0.5));
        assert!(y.hiring.data().unwrap().partial);
    }

    #[tokio::test]
    async fn test_unknown_board_uses_fallback() {
        let pages = FakePages::default().page("https://z.com/careers", "<h1>We are hiring!</h1>");
        let competitors = vec![competitor("Z", None, Some("https://z.com/careers"))];

        let records = prober(pages, None).run(&competitors, 6).await;
        let hiring = records[0].hiring.data().unwrap();
        assert!(hiring.partial);
        assert_eq!(hiring.backend, AtsBackend::Unknown);
        assert_eq!(hiring.listings[0].title, "Aggregated Role");
        assert_eq!(
            records[0].pricing.failure().map(|(kind, _)| kind),
            Some(FailureKind::NotConfigured)
        );
    }

    #[tokio::test]
    async fn test_adapter_failure_uses_fallback() {
        let mut target = competitor("W", None, None);
        target.ats_url = Some("https://jobs.lever.co/unknown-slug".into());

        let records = prober(FakePages::default(), None).run(&[target], 6).await;
        let hiring = records[0].hiring.data().unwrap();
        assert!(hiring.partial);
    }

    #[tokio::test]
    async fn test_no_hiring_data_anywhere() {
        let records = prober(FakePages::default(), None)
            .run(&[competitor("Nobody", None, None)], 6)
            .await;
        assert_eq!(
            records[0].hiring.failure().map(|(kind, _)| kind),
            Some(FailureKind::NoHiringDataAvailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_branch_times_out_alone() {
        let pages = FakePages::default().pricing("https://s.com/pricing", PAST, NOW);
        let mut slow = competitor("S", Some("https://s.com/pricing"), None);
        slow.ats_url = Some("https://jobs.lever.co/acme".into());

        let records = prober(pages, Some(Duration::from_secs(600)))
            .run(&[slow], 6)
            .await;
        assert_eq!(
            records[0].hiring.failure().map(|(kind, _)| kind),
            Some(FailureKind::BranchTimeout)
        );
        assert!(records[0].pricing.is_ok());
    }
}
