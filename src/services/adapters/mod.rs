//! Job board adapters.
//!
//! Each back end has one adapter translating its response shape into
//! [`JobListing`]s. Adapters are selected through the closed [`AtsAdapter`]
//! enum; adding a back end means one new variant plus one detector signature.

mod ashby;
mod greenhouse;
mod lever;

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};

use crate::error::Result;
use crate::models::{AtsBackend, HiringConfig, JobListing};
use crate::utils::http::HttpFetcher;

pub use ashby::AshbyAdapter;
pub use greenhouse::GreenhouseAdapter;
pub use lever::LeverAdapter;

/// A source of normalized job listings for one back end.
pub trait JobBoard: Send + Sync {
    /// The back end this adapter serves.
    fn backend(&self) -> AtsBackend;

    /// Stream a company's open positions.
    ///
    /// The stream is lazy and restartable: calling again starts over.
    /// Pagination is internal. Failures surface as `AdapterUnreachable`.
    fn fetch_jobs<'a>(&'a self, company: &'a str) -> BoxStream<'a, Result<JobListing>>;
}

/// Closed set of supported adapters.
pub enum AtsAdapter {
    Greenhouse(GreenhouseAdapter),
    Lever(LeverAdapter),
    Ashby(AshbyAdapter),
}

impl AtsAdapter {
    /// Build the adapter for a back end; `None` for `Unknown`.
    pub fn for_backend(
        backend: AtsBackend,
        fetcher: HttpFetcher,
        config: &HiringConfig,
    ) -> Option<Self> {
        match backend {
            AtsBackend::Greenhouse => Some(Self::Greenhouse(GreenhouseAdapter::new(
                fetcher,
                &config.greenhouse_url,
                config.max_pages,
            ))),
            AtsBackend::Lever => Some(Self::Lever(LeverAdapter::new(fetcher, &config.lever_url))),
            AtsBackend::Ashby => Some(Self::Ashby(AshbyAdapter::new(
                fetcher,
                &config.ashby_api_url,
                &config.ashby_board_url,
            ))),
            AtsBackend::Unknown => None,
        }
    }

    /// One adapter per known back end, in fallback probing order.
    pub fn all(fetcher: &HttpFetcher, config: &HiringConfig) -> Vec<Self> {
        AtsBackend::KNOWN
            .iter()
            .filter_map(|backend| Self::for_backend(*backend, fetcher.clone(), config))
            .collect()
    }

    fn inner(&self) -> &dyn JobBoard {
        match self {
            Self::Greenhouse(adapter) => adapter,
            Self::Lever(adapter) => adapter,
            Self::Ashby(adapter) => adapter,
        }
    }
}

impl JobBoard for AtsAdapter {
    fn backend(&self) -> AtsBackend {
        self.inner().backend()
    }

    fn fetch_jobs<'a>(&'a self, company: &'a str) -> BoxStream<'a, Result<JobListing>> {
        self.inner().fetch_jobs(company)
    }
}

/// Drain up to `limit` listings from a board.
pub async fn collect_jobs(
    board: &dyn JobBoard,
    company: &str,
    limit: usize,
) -> Result<Vec<JobListing>> {
    board.fetch_jobs(company).take(limit).try_collect().await
}
