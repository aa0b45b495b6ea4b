//! Ashby job boards.
//!
//! The GraphQL job-board query is the primary source. When it fails or comes
//! back empty, the hosted board page is parsed instead: embedded Next.js
//! data, then inline posting JSON, then posting markup.

use std::collections::{HashMap, HashSet};

use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{Value, json};

use super::JobBoard;
use crate::error::{AppError, Result};
use crate::models::{AtsBackend, JobListing};
use crate::utils::clean_text;
use crate::utils::http::HttpFetcher;

const OPERATION: &str = "ApiJobBoardWithTeams";

const QUERY: &str = r#"
query ApiJobBoardWithTeams($organizationHostedJobsPageName: String!) {
  jobBoard: jobBoardWithTeams(organizationHostedJobsPageName: $organizationHostedJobsPageName) {
    jobPostings {
      id
      title
      teamId
      locationId
      locationName
      employmentType
      secondaryLocations { locationId locationName }
    }
    teams { id name parentTeamId }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<BoardData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardData {
    job_board: Option<Board>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Board {
    #[serde(default)]
    job_postings: Vec<Posting>,
    #[serde(default)]
    teams: Vec<Team>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Posting {
    #[serde(default)]
    title: String,
    team_id: Option<String>,
    location_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Team {
    id: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

pub struct AshbyAdapter {
    fetcher: HttpFetcher,
    api_url: String,
    board_url: String,
}

impl AshbyAdapter {
    pub fn new(fetcher: HttpFetcher, api_url: &str, board_url: &str) -> Self {
        Self {
            fetcher,
            api_url: api_url.to_string(),
            board_url: board_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_all(&self, company: &str) -> Result<Vec<JobListing>> {
        let api_error = match self.fetch_api(company).await {
            Ok(jobs) if !jobs.is_empty() => return Ok(jobs),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Ashby {}: job-board query failed ({}), trying hosted page", company, e);
                Some(e)
            }
        };

        let page_url = format!("{}/{}", self.board_url, company);
        let page = self
            .fetcher
            .get_text(&page_url)
            .await
            .map_err(|e| AppError::adapter(AtsBackend::Ashby, e));

        match (page, api_error) {
            (Ok(html), api_error) => {
                let jobs = parse_hosted_board(&html)?;
                log::debug!("Ashby {}: {} listing(s) from hosted page", company, jobs.len());
                match api_error {
                    Some(e) if jobs.is_empty() => Err(e),
                    _ => Ok(jobs),
                }
            }
            // The query answered with an empty board; that stands
            (Err(e), None) => {
                log::debug!("Ashby {}: hosted page unavailable: {}", company, e);
                Ok(Vec::new())
            }
            (Err(_), Some(e)) => Err(e),
        }
    }

    async fn fetch_api(&self, company: &str) -> Result<Vec<JobListing>> {
        let payload = json!({
            "operationName": OPERATION,
            "variables": { "organizationHostedJobsPageName": company },
            "query": QUERY,
        });

        let response: GraphQlResponse = self
            .fetcher
            .post_json(&self.api_url, &payload)
            .await
            .map_err(|e| AppError::adapter(AtsBackend::Ashby, e))?;

        let jobs = listings_from(response, company)?;
        log::debug!("Ashby {}: {} listing(s) from job-board query", company, jobs.len());
        Ok(jobs)
    }
}

impl JobBoard for AshbyAdapter {
    fn backend(&self) -> AtsBackend {
        AtsBackend::Ashby
    }

    // Either source returns every posting in one response
    fn fetch_jobs<'a>(&'a self, company: &'a str) -> BoxStream<'a, Result<JobListing>> {
        stream::once(self.fetch_all(company))
            .map_ok(|jobs| stream::iter(jobs.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}

fn listings_from(response: GraphQlResponse, company: &str) -> Result<Vec<JobListing>> {
    if let Some(error) = response.errors.first() {
        return Err(AppError::adapter(AtsBackend::Ashby, &error.message));
    }

    let board = response
        .data
        .and_then(|data| data.job_board)
        .ok_or_else(|| {
            AppError::adapter(AtsBackend::Ashby, format!("no job board named '{company}'"))
        })?;

    // Team names may carry a numeric cost-centre prefix, e.g. "32010 Backend"
    let prefix = Regex::new(r"^\d+\s+")?;
    let teams: HashMap<String, String> = board
        .teams
        .into_iter()
        .filter_map(|team| {
            let name = team.name?;
            Some((team.id, prefix.replace(&name, "").into_owned()))
        })
        .collect();

    Ok(board
        .job_postings
        .into_iter()
        .filter(|posting| !posting.title.trim().is_empty())
        .map(|posting| {
            let department = posting
                .team_id
                .as_ref()
                .and_then(|id| teams.get(id))
                .cloned()
                .unwrap_or_default();
            JobListing::new(
                posting.title,
                department,
                posting.location_name.unwrap_or_default(),
                AtsBackend::Ashby,
            )
        })
        .collect())
}

/// Parse a hosted board page. Empty when no stage recognizes any posting.
fn parse_hosted_board(html: &str) -> Result<Vec<JobListing>> {
    let document = Html::parse_document(html);

    let next_data = selector("script#__NEXT_DATA__")?;
    if let Some(script) = document.select(&next_data).next() {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(&raw) {
            Ok(data) => {
                let jobs = postings_in(&data["props"]["pageProps"]);
                if !jobs.is_empty() {
                    return Ok(jobs);
                }
            }
            Err(e) => log::debug!("Ashby page data is not JSON: {}", e),
        }
    }

    let inline = Regex::new(r#"(?s)\{.*"jobPosting.*\}"#)?;
    let scripts = selector("script")?;
    for script in document.select(&scripts) {
        let raw = script.text().collect::<String>();
        let Some(found) = inline.find(&raw) else {
            continue;
        };
        if let Ok(data) = serde_json::from_str::<Value>(found.as_str()) {
            let jobs = postings_in(&data);
            if !jobs.is_empty() {
                return Ok(jobs);
            }
        }
    }

    parse_posting_markup(&document)
}

/// Postings under `jobPostings` (or `jobs`) of a JSON object.
fn postings_in(container: &Value) -> Vec<JobListing> {
    let postings = [&container["jobPostings"], &container["jobs"]]
        .into_iter()
        .filter_map(Value::as_array)
        .find(|list| !list.is_empty());

    postings
        .into_iter()
        .flatten()
        .filter_map(|posting| {
            let title = posting["title"].as_str().map(str::trim).filter(|t| !t.is_empty())?;
            let location = posting["location"]["name"]
                .as_str()
                .or_else(|| posting["locationName"].as_str())
                .unwrap_or_default();
            let department = posting["team"]["name"]
                .as_str()
                .or_else(|| posting["departmentName"].as_str())
                .unwrap_or_default();
            Some(JobListing::new(title, department, location, AtsBackend::Ashby))
        })
        .collect()
}

/// Older boards render postings as classed blocks.
fn parse_posting_markup(document: &Html) -> Result<Vec<JobListing>> {
    let block_sel = selector("div[class], a[class]")?;
    let titled_sel = selector("h3[class], h4[class], a[class], span[class]")?;
    let heading_sel = selector("h3, h4")?;
    let classed_sel = selector("[class]")?;

    let block_re = Regex::new(r"(?i)job|posting|position|opening")?;
    let title_re = Regex::new(r"(?i)title|name")?;
    let location_re = Regex::new(r"(?i)location")?;
    let team_re = Regex::new(r"(?i)department|team")?;

    let mut seen = HashSet::new();
    let mut jobs = Vec::new();
    for block in document.select(&block_sel).filter(|el| class_matches(el, &block_re)) {
        let title = block
            .select(&titled_sel)
            .find(|el| class_matches(el, &title_re))
            .or_else(|| block.select(&heading_sel).next())
            .map(text)
            .unwrap_or_default();
        if title.chars().count() <= 2 {
            continue;
        }

        let field = |re: &Regex| {
            block
                .select(&classed_sel)
                .find(|el| class_matches(el, re))
                .map(text)
                .unwrap_or_default()
        };
        let location = field(&location_re);
        let department = field(&team_re);

        // Nested blocks repeat the posting they belong to
        if seen.insert((title.clone(), location.clone())) {
            jobs.push(JobListing::new(title, department, location, AtsBackend::Ashby));
        }
    }
    Ok(jobs)
}

fn class_matches(el: &ElementRef<'_>, re: &Regex) -> bool {
    el.value().attr("class").is_some_and(|class| re.is_match(class))
}

fn text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
