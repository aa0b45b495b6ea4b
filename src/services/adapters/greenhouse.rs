//! Greenhouse job boards (HTML, paginated).

use std::collections::HashSet;

use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::JobBoard;
use crate::error::{AppError, Result};
use crate::models::{AtsBackend, JobListing};
use crate::utils::clean_text;
use crate::utils::http::HttpFetcher;

/// Link texts that are navigation, not positions.
const SKIP_TITLES: &[&str] = &[
    "apply", "view", "see all", "all open positions", "see all open positions", "view all",
    "learn more", "read more", "careers", "jobs", "home", "about", "benefits", "culture",
    "teams", "locations",
];

/// Words that mark a short link text as a role rather than an office or team.
const ROLE_WORDS: &[&str] = &[
    "engineer", "manager", "director", "analyst", "designer", "developer", "lead", "head",
    "specialist", "coordinator",
];

const MIN_TITLE_CHARS: usize = 10;
const MAX_LOCATION_CHARS: usize = 100;

type ListingKey = (String, String, String);

/// Pagination state: next page number and listings already yielded.
struct PageCursor {
    page: usize,
    seen: HashSet<ListingKey>,
}

pub struct GreenhouseAdapter {
    fetcher: HttpFetcher,
    base_url: String,
    max_pages: usize,
}

impl GreenhouseAdapter {
    pub fn new(fetcher: HttpFetcher, base_url: &str, max_pages: usize) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_pages,
        }
    }

    async fn fetch_page(&self, company: &str, page: usize) -> Result<Vec<JobListing>> {
        let url = format!("{}/{}", self.base_url, company);
        let html = if page <= 1 {
            self.fetcher.get_text(&url).await
        } else {
            self.fetcher
                .get_text_with_query(&url, &[("page", page.to_string())])
                .await
        }
        .map_err(|e| AppError::adapter(AtsBackend::Greenhouse, e))?;

        parse_board(&html).map_err(|e| AppError::adapter(AtsBackend::Greenhouse, e))
    }

    async fn next_page(
        &self,
        company: &str,
        mut cursor: PageCursor,
    ) -> Result<Option<(Vec<JobListing>, PageCursor)>> {
        if cursor.page > self.max_pages {
            return Ok(None);
        }

        let listings = self.fetch_page(company, cursor.page).await?;
        // Boards without pagination serve the same page for any ?page=N
        let fresh: Vec<JobListing> = listings
            .into_iter()
            .filter(|job| !cursor.seen.contains(&key(job)))
            .collect();
        if fresh.is_empty() {
            return Ok(None);
        }

        log::debug!(
            "Greenhouse {}: page {} has {} new listing(s)",
            company,
            cursor.page,
            fresh.len()
        );
        cursor.seen.extend(fresh.iter().map(key));
        cursor.page += 1;
        Ok(Some((fresh, cursor)))
    }
}

impl JobBoard for GreenhouseAdapter {
    fn backend(&self) -> AtsBackend {
        AtsBackend::Greenhouse
    }

    fn fetch_jobs<'a>(&'a self, company: &'a str) -> BoxStream<'a, Result<JobListing>> {
        let start = PageCursor {
            page: 1,
            seen: HashSet::new(),
        };

        stream::try_unfold(start, move |cursor| self.next_page(company, cursor))
            .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}

fn key(job: &JobListing) -> ListingKey {
    (job.title.clone(), job.department.clone(), job.location.clone())
}

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn text_of(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Parse one board page. Classic `div.opening` markup is tried first, then
/// the newer layout of job links grouped under department headings.
pub(crate) fn parse_board(html: &str) -> Result<Vec<JobListing>> {
    let document = Html::parse_document(html);

    let classic = parse_openings(&document)?;
    if !classic.is_empty() {
        return Ok(classic);
    }
    parse_job_links(&document)
}

fn parse_openings(document: &Html) -> Result<Vec<JobListing>> {
    let opening_sel = selector("div.opening")?;
    let link_sel = selector("a")?;
    let location_sel = selector("span.location")?;
    let heading_sel = selector("h2, h3, h4")?;

    let mut jobs = Vec::new();
    for opening in document.select(&opening_sel) {
        let Some(title) = opening.select(&link_sel).next().map(text_of) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let location = opening
            .select(&location_sel)
            .next()
            .map(text_of)
            .unwrap_or_default();

        let department = opening
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "section")
            .and_then(|section| section.select(&heading_sel).next())
            .map(text_of)
            .unwrap_or_default();

        jobs.push(JobListing::new(title, department, location, AtsBackend::Greenhouse));
    }
    Ok(jobs)
}

fn parse_job_links(document: &Html) -> Result<Vec<JobListing>> {
    let walk_sel = selector("h2, h3, h4, a[href]")?;
    let para_sel = selector("p")?;
    let job_href = Regex::new(r"/jobs/\d+")?;

    let mut jobs = Vec::new();
    let mut department = String::new();

    for element in document.select(&walk_sel) {
        if element.value().name() != "a" {
            department = text_of(element);
            continue;
        }

        let href = element.value().attr("href").unwrap_or_default();
        if !job_href.is_match(href) {
            continue;
        }

        // Newer boards put title and location in sibling <p> tags inside the link
        let paragraphs: Vec<String> = element.select(&para_sel).map(text_of).collect();
        let (title, location) = match paragraphs.as_slice() {
            [title, location, ..] => (title.clone(), location.clone()),
            [title] => (title.clone(), String::new()),
            [] => (text_of(element), sibling_location(element)),
        };

        if !looks_like_role(&title) {
            continue;
        }
        jobs.push(JobListing::new(
            title,
            department.clone(),
            location,
            AtsBackend::Greenhouse,
        ));
    }
    Ok(jobs)
}

fn sibling_location(link: ElementRef<'_>) -> String {
    link.next_siblings()
        .find_map(ElementRef::wrap)
        .map(text_of)
        .filter(|text| text.chars().count() < MAX_LOCATION_CHARS)
        .unwrap_or_default()
}

fn looks_like_role(title: &str) -> bool {
    let lower = title.to_lowercase();
    if title.chars().count() < MIN_TITLE_CHARS {
        return false;
    }
    if SKIP_TITLES
        .iter()
        .any(|skip| lower == *skip || (skip.contains(' ') && lower.contains(skip)))
    {
        return false;
    }
    title.split_whitespace().count() > 3 || ROLE_WORDS.iter().any(|w| lower.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CLASSIC: &str = r#"
        <div id="main">
          <section class="level-0">
            <h3 id="4001">Engineering</h3>
            <div class="opening"><a href="/acme/jobs/111">Backend Engineer</a>
              <span class="location">Berlin</span></div>
            <div class="opening"><a href="/acme/jobs/112">SRE</a>
              <span class="location">Remote</span></div>
          </section>
          <section class="level-0">
            <h3 id="4002">Sales</h3>
            <div class="opening"><a href="/acme/jobs/113">Account Executive</a></div>
          </section>
        </div>
    "#;

    fn job_board(rows: &[(&str, &str, &str)]) -> String {
        let mut html = String::from("<main><h2>Open roles</h2>");
        let mut current = "";
        for (id, dept, title) in rows {
            if *dept != current {
                html.push_str(&format!(r#"<h3 class="section-header">{dept}</h3>"#));
                current = *dept;
            }
            html.push_str(&format!(
                r#"<tr class="job-post"><td><a href="https://job-boards.greenhouse.io/acme/jobs/{id}">
                   <p class="body--medium">{title}</p><p class="body--metadata">Remote, US</p></a></td></tr>"#
            ));
        }
        html.push_str(r#"<a href="/acme/jobs/999">Apply</a><a href="/acme">See all open positions</a></main>"#);
        html
    }

    #[test]
    fn test_parse_classic_openings() {
        let jobs = parse_board(CLASSIC).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].title, "Backend Engineer");
        assert_eq!(jobs[0].department, "Engineering");
        assert_eq!(jobs[0].location, "Berlin");
        assert_eq!(jobs[2].department, "Sales");
        assert_eq!(jobs[2].location, "Not specified");
        assert!(jobs.iter().all(|j| j.source_backend == AtsBackend::Greenhouse));
    }

    #[test]
    fn test_parse_grouped_job_links() {
        let html = job_board(&[
            ("1", "Engineering", "Senior Platform Engineer"),
            ("2", "Engineering", "Staff Software Engineer, Data"),
            ("3", "Marketing", "Product Marketing Manager"),
        ]);
        let jobs = parse_board(&html).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[1].department, "Engineering");
        assert_eq!(jobs[2].title, "Product Marketing Manager");
        assert_eq!(jobs[2].department, "Marketing");
        assert_eq!(jobs[2].location, "Remote, US");
    }

    #[test]
    fn test_navigation_links_are_skipped() {
        assert!(!looks_like_role("Apply"));
        assert!(!looks_like_role("See all open positions"));
        assert!(!looks_like_role("San Francisco"));
        assert!(looks_like_role("Engineering Manager"));
        assert!(looks_like_role("Customer Success Operations Partner"));
    }

    #[tokio::test]
    async fn test_paginates_until_no_new_listings() {
        let server = MockServer::start().await;
        let page2 = job_board(&[("3", "Sales", "Enterprise Account Executive, EMEA")]);
        Mock::given(method("GET"))
            .and(path("/acme"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page2.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/acme"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page2))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/acme"))
            .respond_with(ResponseTemplate::new(200).set_body_string(job_board(&[
                ("1", "Engineering", "Senior Platform Engineer"),
                ("2", "Engineering", "Engineering Manager"),
            ])))
            .mount(&server)
            .await;

        let adapter = GreenhouseAdapter::new(HttpFetcher::for_tests(), &server.uri(), 10);
        let jobs: Vec<JobListing> = adapter.fetch_jobs("acme").try_collect().await.unwrap();
        let titles: Vec<&str> = jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Senior Platform Engineer",
                "Engineering Manager",
                "Enterprise Account Executive, EMEA"
            ]
        );
    }

    #[tokio::test]
    async fn test_page_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/acme"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CLASSIC))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = GreenhouseAdapter::new(HttpFetcher::for_tests(), &server.uri(), 1);
        let jobs: Vec<JobListing> = adapter.fetch_jobs("acme").try_collect().await.unwrap();
        assert_eq!(jobs.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_board_is_adapter_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = GreenhouseAdapter::new(HttpFetcher::for_tests(), &server.uri(), 10);
        let err = adapter
            .fetch_jobs("nobody")
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::AdapterUnreachable {
                backend: AtsBackend::Greenhouse,
                ..
            }
        ));
    }
}
