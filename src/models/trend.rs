// src/models/trend.rs

//! Hiring trend between two stored snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::JobListing;

/// Old/new count pair for a department or keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountDelta {
    pub old: usize,
    pub new: usize,
    pub delta: i64,
}

impl CountDelta {
    pub fn new(old: usize, new: usize) -> Self {
        Self {
            old,
            new,
            delta: new as i64 - old as i64,
        }
    }
}

/// Change in open roles between two hiring snapshots of one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiringTrend {
    pub summary: String,
    pub old_captured_at: DateTime<Utc>,
    pub new_captured_at: DateTime<Utc>,
    pub old_count: usize,
    pub new_count: usize,
    /// Percentage change in open roles, one decimal
    pub velocity_change_percent: f64,
    pub new_roles: Vec<JobListing>,
    pub removed_roles: Vec<JobListing>,
    pub department_changes: BTreeMap<String, CountDelta>,
    pub keyword_changes: BTreeMap<String, CountDelta>,
}

impl HiringTrend {
    pub fn has_changes(&self) -> bool {
        self.old_count != self.new_count
            || !self.new_roles.is_empty()
            || !self.removed_roles.is_empty()
            || !self.department_changes.is_empty()
    }
}
