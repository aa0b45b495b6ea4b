//! Fallback hiring data.
//!
//! Used when no board was detected or the detected board failed. Two
//! lower-fidelity sources are tried in order: boards at slugs guessed from
//! the company name, then a public job-search aggregator keyed by name.
//! Results from either are partial.

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{AtsBackend, FallbackConfig, HiringConfig, JobListing};
use crate::services::adapters::{AtsAdapter, JobBoard, collect_jobs};
use crate::services::detector::canonical_board_url;
use crate::utils::clean_text;
use crate::utils::http::HttpFetcher;

/// Listings served by a fallback source.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackJobs {
    /// Board back end when a guessed board answered, else `Unknown`
    pub backend: AtsBackend,
    /// Address of the guessed board; `None` for aggregator results
    pub board_url: Option<String>,
    pub listings: Vec<JobListing>,
}

/// Secondary hiring source keyed by company name.
#[async_trait]
pub trait JobFallback: Send + Sync {
    /// Fails with `NoHiringDataAvailable` when nothing is found.
    async fn resolve(&self, company: &str) -> Result<FallbackJobs>;
}

pub struct FallbackResolver {
    fetcher: HttpFetcher,
    config: FallbackConfig,
    boards: Vec<AtsAdapter>,
    max_listings: usize,
}

impl FallbackResolver {
    pub fn new(fetcher: HttpFetcher, config: &FallbackConfig, hiring: &HiringConfig) -> Self {
        let boards = if config.guess_board_slugs {
            AtsAdapter::all(&fetcher, hiring)
        } else {
            Vec::new()
        };

        Self {
            fetcher,
            config: config.clone(),
            boards,
            max_listings: hiring.max_listings,
        }
    }

    /// First guessed board that lists at least one position.
    async fn guess_board(&self, company: &str) -> Option<FallbackJobs> {
        let slugs = candidate_slugs(company);

        for board in &self.boards {
            for slug in &slugs {
                match collect_jobs(board, slug, self.max_listings).await {
                    Ok(listings) if !listings.is_empty() => {
                        log::info!(
                            "Guessed {} board '{}' for {} ({} listings)",
                            board.backend(),
                            slug,
                            company,
                            listings.len()
                        );
                        return Some(FallbackJobs {
                            backend: board.backend(),
                            board_url: Some(canonical_board_url(board.backend(), slug)),
                            listings,
                        });
                    }
                    Ok(_) => log::debug!("{} board '{}' is empty", board.backend(), slug),
                    Err(e) => log::debug!("{} board '{}' not found: {}", board.backend(), slug, e),
                }
            }
        }
        None
    }

    async fn search_aggregator(&self, company: &str) -> Result<Vec<JobListing>> {
        let query = [("keywords", company.to_string()), ("start", "0".to_string())];
        let html = self
            .fetcher
            .get_text_with_query(&self.config.aggregator_url, &query)
            .await?;

        let mut listings = parse_search_cards(&html, company)?;
        listings.truncate(self.config.max_results);
        Ok(listings)
    }
}

#[async_trait]
impl JobFallback for FallbackResolver {
    async fn resolve(&self, company: &str) -> Result<FallbackJobs> {
        if let Some(found) = self.guess_board(company).await {
            return Ok(found);
        }

        match self.search_aggregator(company).await {
            Ok(listings) if !listings.is_empty() => {
                log::info!("Aggregator returned {} listing(s) for {}", listings.len(), company);
                Ok(FallbackJobs {
                    backend: AtsBackend::Unknown,
                    board_url: None,
                    listings,
                })
            }
            Ok(_) => Err(AppError::no_hiring_data(company)),
            Err(e) => {
                log::warn!("Aggregator search failed for {}: {}", company, e);
                Err(AppError::no_hiring_data(company))
            }
        }
    }
}

/// Board slugs to try: name with separators removed, then hyphenated.
pub fn candidate_slugs(company: &str) -> Vec<String> {
    let lower = company.trim().to_lowercase();
    let compact: String = lower.chars().filter(|c| c.is_alphanumeric()).collect();
    let hyphenated: String = lower
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let mut slugs = vec![compact];
    if !slugs.contains(&hyphenated) {
        slugs.push(hyphenated);
    }
    slugs.retain(|s| !s.is_empty());
    slugs
}

/// Parse aggregator search-result cards, keeping those posted by `company`.
pub(crate) fn parse_search_cards(html: &str, company: &str) -> Result<Vec<JobListing>> {
    let parse = |s: &str| Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")));
    let card_sel = parse(".base-search-card")?;
    let title_sel = parse(".base-search-card__title")?;
    let company_sel = parse(".base-search-card__subtitle")?;
    let location_sel = parse(".job-search-card__location")?;
    let time_sel = parse("time[datetime]")?;

    let document = Html::parse_document(html);
    let wanted = company.trim().to_lowercase();
    let text = |el: ElementRef<'_>| clean_text(&el.text().collect::<Vec<_>>().join(" "));

    let listings = document
        .select(&card_sel)
        .filter_map(|card| {
            let title = card.select(&title_sel).next().map(text)?;
            let employer = card.select(&company_sel).next().map(text).unwrap_or_default();
            let employer = employer.to_lowercase();
            let same_company = employer.contains(&wanted) || wanted.contains(&employer);
            if title.is_empty() || employer.is_empty() || !same_company {
                return None;
            }

            let location = card.select(&location_sel).next().map(text).unwrap_or_default();
            let posted = card
                .select(&time_sel)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

            Some(JobListing::new(title, "", location, AtsBackend::Unknown).posted(posted))
        })
        .collect();
    Ok(listings)
}
