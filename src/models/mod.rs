// src/models/mod.rs

//! Domain models for the probe application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod competitor;
mod config;
mod hiring;
mod pricing;
mod snapshot;
mod trend;

// Re-export all public types
pub use competitor::{BranchOutcome, Competitor, CompetitorList, CompetitorRecord, Report};
pub use config::{
    ArchiveConfig, Config, ExtractionConfig, FallbackConfig, HiringConfig, HostLimit, HttpConfig,
    OutputConfig, ProbeConfig, RateLimitConfig,
};
pub(crate) use hiring::title_mentions;
pub use hiring::{
    AtsBackend, AtsBoard, DepartmentCount, HiringSnapshot, JobListing, StrategicSignal,
};
pub use pricing::{
    BillingPeriod, ExtractionWarning, PlanAdded, PlanChanged, PlanRemoved, Price, PriceChanged,
    PricingDiff, PricingPlan, normalize_name,
};
pub use snapshot::{CaptureTime, PageSnapshot};
pub use trend::{CountDelta, HiringTrend};
