//! Persistence for probe reports and hiring snapshots.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── reports/
//! │   └── probe_20250301T120000Z.json   # One per run
//! ├── snapshots/
//! │   └── acme_jobs.json                # Latest hiring snapshot per company
//! └── history/
//!     └── acme/
//!         └── 20250301T120000Z.json     # Every hiring snapshot ever saved
//! ```

pub mod local;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{HiringSnapshot, Report};

pub use local::LocalStorage;

/// Where a write landed.
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// Location of the primary file written
    pub location: String,
    /// Content hash of the bytes written (hex SHA-256)
    pub sha256: String,
}

/// Storage backend for probe output.
#[async_trait]
pub trait ProbeStorage: Send + Sync {
    /// Persist a full probe report.
    async fn write_report(&self, report: &Report) -> Result<WriteSummary>;

    /// Save a hiring snapshot as the company's latest and append it to history.
    async fn save_hiring_snapshot(&self, snapshot: &HiringSnapshot) -> Result<WriteSummary>;

    /// Latest stored hiring snapshot for a company, if any.
    async fn load_hiring_snapshot(&self, company: &str) -> Result<Option<HiringSnapshot>>;

    /// Load a hiring snapshot from an explicit file.
    async fn load_snapshot_file(&self, path: &Path) -> Result<HiringSnapshot>;
}
