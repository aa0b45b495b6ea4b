//! ATS detection service.
//!
//! Classifies a careers page by the job board back end serving it. Only the
//! already-fetched page is inspected; no network calls are made.

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{AtsBackend, AtsBoard, PageSnapshot};
use crate::utils::resolve;

/// Signature table, checked in order; the first match wins.
///
/// Each entry is (backend, pattern). Patterns with a capture group yield the
/// board slug. Greenhouse embeds come first because the embed URL shares its
/// host with hosted boards but carries the slug in the query string.
const URL_SIGNATURES: &[(AtsBackend, &str)] = &[
    (
        AtsBackend::Greenhouse,
        r"(?i)boards(?:\.eu)?\.greenhouse\.io/embed/job_board(?:/js)?\?(?:[^&#\s]*&)*for=([A-Za-z0-9_-]+)",
    ),
    (
        AtsBackend::Greenhouse,
        r"(?i)(?:job-boards|boards)(?:\.eu)?\.greenhouse\.io/([A-Za-z0-9_-]+)",
    ),
    (AtsBackend::Lever, r"(?i)jobs(?:\.eu)?\.lever\.co/([A-Za-z0-9_-]+)"),
    (AtsBackend::Ashby, r"(?i)jobs\.ashbyhq\.com/([A-Za-z0-9_.%-]+)"),
];

/// Markup fingerprints for embedded widgets whose URL is not on the page.
const MARKUP_FINGERPRINTS: &[(AtsBackend, &str)] = &[
    (AtsBackend::Greenhouse, "grnhse_app"),
    (AtsBackend::Greenhouse, "grnhse_iframe"),
    (AtsBackend::Lever, "lever-jobs-container"),
    (AtsBackend::Lever, "lever-jobs-embed"),
    (AtsBackend::Ashby, "ashby_embed"),
    (AtsBackend::Ashby, "ashby-job-posting-brief"),
];

/// Path segments that follow a board host but are not company slugs.
const RESERVED_SEGMENTS: &[&str] = &["embed", "api", "v1", "static", "assets"];

struct Signature {
    backend: AtsBackend,
    pattern: Regex,
}

/// Service for detecting the ATS back end behind a careers page.
pub struct AtsDetector {
    signatures: Vec<Signature>,
    link_selector: Selector,
}

impl AtsDetector {
    /// Create a detector with the built-in signature table.
    pub fn new() -> Result<Self> {
        let signatures = URL_SIGNATURES
            .iter()
            .map(|(backend, pattern)| {
                Ok(Signature {
                    backend: *backend,
                    pattern: Regex::new(pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let selector = "a[href], iframe[src], script[src]";
        let link_selector =
            Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))?;

        Ok(Self {
            signatures,
            link_selector,
        })
    }

    /// Classify a careers page. `Unknown` is a normal outcome.
    pub fn detect(&self, careers_page: &PageSnapshot) -> AtsBackend {
        self.detect_board(careers_page)
            .map(|board| board.backend)
            .unwrap_or(AtsBackend::Unknown)
    }

    /// Locate the job board on a careers page.
    ///
    /// Checks the page's own URL, then link/iframe/script URLs in document
    /// order, then the raw markup. The slug is `None` when only a markup
    /// fingerprint matched.
    pub fn detect_board(&self, careers_page: &PageSnapshot) -> Option<AtsBoard> {
        if let Some(board) = self.match_url(&careers_page.source_url) {
            log::debug!("Detected {} from page URL {}", board.backend, careers_page.source_url);
            return Some(board);
        }

        let document = Html::parse_document(&careers_page.raw_content);
        let from_links = document
            .select(&self.link_selector)
            .filter_map(|el| el.value().attr("href").or_else(|| el.value().attr("src")))
            .find_map(|link| {
                // Protocol-relative and relative embeds resolve against the page
                let absolute = resolve(&careers_page.source_url, link);
                self.match_url(absolute.as_deref().unwrap_or(link))
            });
        if let Some(board) = from_links {
            log::debug!("Detected {} from link on {}", board.backend, careers_page.source_url);
            return Some(board);
        }

        if let Some(board) = self.match_url(&careers_page.raw_content) {
            log::debug!("Detected {} in markup of {}", board.backend, careers_page.source_url);
            return Some(board);
        }

        let html_lower = careers_page.raw_content.to_lowercase();
        MARKUP_FINGERPRINTS
            .iter()
            .find(|(_, fingerprint)| html_lower.contains(fingerprint))
            .map(|(backend, fingerprint)| {
                log::debug!(
                    "Detected {} by fingerprint '{}' on {}",
                    backend,
                    fingerprint,
                    careers_page.source_url
                );
                AtsBoard {
                    backend: *backend,
                    board_url: careers_page.source_url.clone(),
                    slug: None,
                }
            })
    }

    /// Build a board from an explicit URL, bypassing page detection.
    ///
    /// The back end comes from `backend` when given, otherwise from the URL.
    /// The slug is taken from a known signature, else the first path segment.
    pub fn board_from_url(&self, ats_url: &str, backend: Option<AtsBackend>) -> Result<AtsBoard> {
        let matched = self.match_url(ats_url);
        let backend = backend
            .or_else(|| matched.as_ref().map(|b| b.backend))
            .ok_or_else(|| {
                AppError::config(format!("Cannot infer ATS type from '{ats_url}'; pass an ATS type"))
            })?;

        let slug = match matched {
            Some(board) if board.backend == backend => board.slug,
            _ => first_path_segment(ats_url)?,
        };

        Ok(AtsBoard {
            backend,
            board_url: ats_url.to_string(),
            slug,
        })
    }

    /// Run the signature table against one string.
    fn match_url(&self, text: &str) -> Option<AtsBoard> {
        self.signatures.iter().find_map(|sig| {
            sig.pattern
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str())
                .find(|slug| !RESERVED_SEGMENTS.contains(&slug.to_lowercase().as_str()))
                .map(|slug| AtsBoard {
                    backend: sig.backend,
                    board_url: canonical_board_url(sig.backend, slug),
                    slug: Some(slug.to_string()),
                })
        })
    }
}

/// Public board address for a back end and company slug.
pub fn canonical_board_url(backend: AtsBackend, slug: &str) -> String {
    match backend {
        AtsBackend::Greenhouse => format!("https://job-boards.greenhouse.io/{slug}"),
        AtsBackend::Lever => format!("https://jobs.lever.co/{slug}"),
        AtsBackend::Ashby => format!("https://jobs.ashbyhq.com/{slug}"),
        AtsBackend::Unknown => slug.to_string(),
    }
}

fn first_path_segment(url: &str) -> Result<Option<String>> {
    let parsed = Url::parse(url)?;
    Ok(parsed
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .map(str::to_string))
}
