//! Hiring trend between two stored snapshots of one company.
//!
//! Roles are matched by normalized title, the same rule pricing plans are
//! matched by.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::models::{
    CountDelta, HiringSnapshot, HiringTrend, JobListing, normalize_name, title_mentions,
};

/// Title terms whose counts are tracked between snapshots.
pub const TRACKED_KEYWORDS: &[&str] = &[
    "AI",
    "ML",
    "Machine Learning",
    "Enterprise",
    "Sales",
    "Security",
    "Platform",
    "Infrastructure",
    "Staff",
    "Principal",
    "Director",
    "VP",
];

/// Roles listed in `new_roles` / `removed_roles`.
pub const MAX_LISTED_ROLES: usize = 10;

/// Compare an older snapshot against a newer one.
pub fn compare_hiring(old: &HiringSnapshot, new: &HiringSnapshot) -> HiringTrend {
    let old_count = old.total_jobs();
    let new_count = new.total_jobs();

    let velocity = if old_count > 0 {
        (new_count as f64 - old_count as f64) / old_count as f64 * 100.0
    } else if new_count > 0 {
        100.0
    } else {
        0.0
    };

    let keyword_changes = TRACKED_KEYWORDS
        .iter()
        .filter_map(|keyword| {
            let delta = CountDelta::new(
                count_mentions(&old.listings, keyword),
                count_mentions(&new.listings, keyword),
            );
            (delta.delta != 0).then(|| (keyword.to_string(), delta))
        })
        .collect();

    HiringTrend {
        summary: summarize(velocity),
        old_captured_at: old.captured_at,
        new_captured_at: new.captured_at,
        old_count,
        new_count,
        velocity_change_percent: (velocity * 10.0).round() / 10.0,
        new_roles: roles_missing_from(&new.listings, &old.listings),
        removed_roles: roles_missing_from(&old.listings, &new.listings),
        department_changes: department_changes(&old.listings, &new.listings),
        keyword_changes,
    }
}

fn count_mentions(listings: &[JobListing], keyword: &str) -> usize {
    listings
        .iter()
        .filter(|job| title_mentions(&job.title, keyword))
        .count()
}

/// Listings in `from` whose title does not occur in `other`, in order.
fn roles_missing_from(from: &[JobListing], other: &[JobListing]) -> Vec<JobListing> {
    let titles: HashSet<String> = other.iter().map(|job| normalize_name(&job.title)).collect();
    from.iter()
        .filter(|job| !titles.contains(&normalize_name(&job.title)))
        .take(MAX_LISTED_ROLES)
        .cloned()
        .collect()
}

fn department_changes(old: &[JobListing], new: &[JobListing]) -> BTreeMap<String, CountDelta> {
    let count = |listings: &[JobListing]| {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for job in listings {
            *counts.entry(job.department.clone()).or_default() += 1;
        }
        counts
    };
    let before = count(old);
    let after = count(new);

    let departments: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    departments
        .into_iter()
        .filter_map(|dept| {
            let delta = CountDelta::new(
                before.get(dept).copied().unwrap_or(0),
                after.get(dept).copied().unwrap_or(0),
            );
            (delta.delta != 0).then(|| (dept.clone(), delta))
        })
        .collect()
}

fn summarize(velocity: f64) -> String {
    if velocity > 0.0 {
        format!("Hiring velocity increased by {velocity:.0}%")
    } else if velocity < 0.0 {
        format!("Hiring velocity decreased by {:.0}%", velocity.abs())
    } else {
        "Hiring velocity unchanged".to_string()
    }
}
