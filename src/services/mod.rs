//! Service layer for the probe application.
//!
//! This module contains the acquisition and extraction logic:
//! - Page snapshots, live and archived (`SnapshotRetriever`)
//! - Pricing plan extraction (`PlanExtractor`)
//! - Job board detection (`AtsDetector`)
//! - Job board adapters (`AtsAdapter`)
//! - Fallback hiring sources (`FallbackResolver`)

pub mod adapters;
pub mod detector;
pub mod extract;
pub mod fallback;
pub mod retriever;

pub use adapters::{AtsAdapter, JobBoard};
pub use detector::AtsDetector;
pub use extract::PlanExtractor;
pub use fallback::{FallbackResolver, JobFallback};
pub use retriever::{SnapshotRetriever, SnapshotSource};
