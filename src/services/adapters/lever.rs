//! Lever job boards (HTML, grouped postings on one page).

use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use scraper::{ElementRef, Html, Selector};

use super::JobBoard;
use crate::error::{AppError, Result};
use crate::models::{AtsBackend, JobListing};
use crate::utils::clean_text;
use crate::utils::http::HttpFetcher;

pub struct LeverAdapter {
    fetcher: HttpFetcher,
    base_url: String,
}

impl LeverAdapter {
    pub fn new(fetcher: HttpFetcher, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_all(&self, company: &str) -> Result<Vec<JobListing>> {
        let url = format!("{}/{}", self.base_url, company);
        let html = self
            .fetcher
            .get_text(&url)
            .await
            .map_err(|e| AppError::adapter(AtsBackend::Lever, e))?;

        let jobs = parse_postings(&html).map_err(|e| AppError::adapter(AtsBackend::Lever, e))?;
        log::debug!("Lever {}: {} listing(s)", company, jobs.len());
        Ok(jobs)
    }
}

impl JobBoard for LeverAdapter {
    fn backend(&self) -> AtsBackend {
        AtsBackend::Lever
    }

    // Lever serves every posting on one page
    fn fetch_jobs<'a>(&'a self, company: &'a str) -> BoxStream<'a, Result<JobListing>> {
        stream::once(self.fetch_all(company))
            .map_ok(|jobs| stream::iter(jobs.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}

struct PostingSelectors {
    posting: Selector,
    title: Selector,
    title_link: Selector,
    location: Selector,
    team: Selector,
    group: Selector,
    group_header: Selector,
}

impl PostingSelectors {
    fn new() -> Result<Self> {
        let parse = |s: &str| Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")));
        Ok(Self {
            posting: parse("div.posting")?,
            title: parse("a.posting-title h5, h5[data-qa=posting-name]")?,
            title_link: parse("a.posting-title")?,
            location: parse("span.sort-by-location, span.location")?,
            team: parse("span.sort-by-team, span.department")?,
            group: parse("div.posting-group")?,
            group_header: parse(".posting-category-title, div.posting-group-header")?,
        })
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Parse a Lever board page.
///
/// Individual `div.posting` blocks are preferred; their department is the
/// posting's team label, else the enclosing group header. Pages with only
/// grouped title links fall back to the group header for every link.
pub(crate) fn parse_postings(html: &str) -> Result<Vec<JobListing>> {
    let document = Html::parse_document(html);
    let sel = PostingSelectors::new()?;

    let mut jobs = Vec::new();
    for posting in document.select(&sel.posting) {
        let title = posting
            .select(&sel.title)
            .next()
            .or_else(|| posting.select(&sel.title_link).next())
            .map(text_of)
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }

        let location = posting.select(&sel.location).next().map(text_of);
        let department = posting
            .select(&sel.team)
            .next()
            .map(text_of)
            .or_else(|| group_header(posting, &sel));

        jobs.push(JobListing::new(
            title,
            department.unwrap_or_default(),
            location.unwrap_or_default(),
            AtsBackend::Lever,
        ));
    }

    if !jobs.is_empty() {
        return Ok(jobs);
    }

    for group in document.select(&sel.group) {
        let department = group.select(&sel.group_header).next().map(text_of);
        for link in group.select(&sel.title_link) {
            let title = text_of(link);
            if !title.is_empty() {
                jobs.push(JobListing::new(
                    title,
                    department.clone().unwrap_or_default(),
                    "",
                    AtsBackend::Lever,
                ));
            }
        }
    }
    Ok(jobs)
}

fn group_header(posting: ElementRef<'_>, sel: &PostingSelectors) -> Option<String> {
    posting
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.value().name() == "div" && el.value().classes().any(|c| c == "posting-group")
        })
        .and_then(|group| group.select(&sel.group_header).next())
        .map(text_of)
}
