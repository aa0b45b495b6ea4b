//! Diff calculation between two renderings of a pricing page.
//!
//! Plans are matched by normalized name. The comparison is a pure function of
//! the two snapshots: no I/O, and identical inputs yield identical output.

use std::collections::HashMap;

use crate::error::Result;
use crate::models::{
    ExtractionConfig, ExtractionWarning, PageSnapshot, PlanAdded, PlanChanged, PlanRemoved, Price,
    PriceChanged, PricingDiff, PricingPlan,
};
use crate::services::extract::{Extraction, PlanExtractor};

/// Computes structured diffs between pricing snapshots.
pub struct DiffEngine {
    extractor: PlanExtractor,
}

impl DiffEngine {
    /// Create a diff engine with the given extraction limits.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self {
            extractor: PlanExtractor::new(config)?,
        })
    }

    /// Compare a past rendering against the present one.
    ///
    /// `removed` and `changed` follow the past page's plan order, `added`
    /// follows the present page's.
    pub fn compare(&self, past: &PageSnapshot, present: &PageSnapshot) -> PricingDiff {
        let before = self.extractor.extract(past);
        let after = self.extractor.extract(present);

        let mut diff = PricingDiff {
            source_url: present.source_url.clone(),
            past_captured_at: past.captured_at,
            present_captured_at: present.captured_at,
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
            price_changes: Vec::new(),
            warnings: warnings("past", &before)
                .chain(warnings("present", &after))
                .collect(),
        };

        let present_by_key: HashMap<String, &PricingPlan> =
            after.plans.iter().map(|p| (p.key(), p)).collect();
        let past_by_key: HashMap<String, &PricingPlan> =
            before.plans.iter().map(|p| (p.key(), p)).collect();

        for old in &before.plans {
            match present_by_key.get(&old.key()) {
                Some(new) => compare_plan(old, new, &mut diff),
                None => diff.removed.push(PlanRemoved {
                    plan_name: old.plan_name.clone(),
                    price: old.price.clone(),
                }),
            }
        }

        diff.added = after
            .plans
            .iter()
            .filter(|p| !past_by_key.contains_key(&p.key()))
            .map(|p| PlanAdded {
                plan_name: p.plan_name.clone(),
                price: p.price.clone(),
            })
            .collect();

        log::debug!(
            "Pricing diff for {}: {} change(s), {} warning(s)",
            diff.source_url,
            diff.change_count(),
            diff.warnings.len()
        );
        diff
    }
}

fn warnings<'a>(
    label: &'static str,
    extraction: &'a Extraction,
) -> impl Iterator<Item = ExtractionWarning> + 'a {
    extraction
        .duplicates
        .iter()
        .map(move |(name, position)| ExtractionWarning::DuplicatePlan {
            plan_name: name.clone(),
            snapshot: label.to_string(),
            position: *position,
        })
}

/// Record every difference between two plans matched by name.
fn compare_plan(old: &PricingPlan, new: &PricingPlan, diff: &mut PricingDiff) {
    // Present-side display name is reported for matched plans
    let name = &new.plan_name;

    if old.price.amount != new.price.amount {
        diff.price_changes.push(PriceChanged {
            plan_name: name.clone(),
            old_price: old.price.clone(),
            new_price: new.price.clone(),
            percent_delta: percent_delta(old.price.amount, new.price.amount),
        });
    }

    if unit_label(&old.price) != unit_label(&new.price) {
        diff.changed.push(field_change(
            name,
            "price_unit",
            unit_label(&old.price),
            unit_label(&new.price),
        ));
    }

    if old.billing_period != new.billing_period {
        diff.changed.push(field_change(
            name,
            "billing_period",
            Some(old.billing_period.to_string()),
            Some(new.billing_period.to_string()),
        ));
    }

    for feature in old.features.difference(&new.features) {
        diff.changed
            .push(field_change(name, "features", Some(feature.clone()), None));
    }
    for feature in new.features.difference(&old.features) {
        diff.changed
            .push(field_change(name, "features", None, Some(feature.clone())));
    }
}

/// Relative change; undefined (`None`) from a zero base.
pub fn percent_delta(old: f64, new: f64) -> Option<f64> {
    (old != 0.0).then(|| (new - old) / old)
}

/// Currency plus per-unit qualifier, e.g. `$/user`.
fn unit_label(price: &Price) -> Option<String> {
    match (&price.unit, price.currency.is_empty()) {
        (Some(unit), _) => Some(format!("{}/{}", price.currency, unit)),
        (None, false) => Some(price.currency.clone()),
        (None, true) => None,
    }
}

fn field_change(
    plan_name: &str,
    field: &str,
    old_value: Option<String>,
    new_value: Option<String>,
) -> PlanChanged {
    PlanChanged {
        plan_name: plan_name.to_string(),
        field: field.to_string(),
        old_value,
        new_value,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::CaptureTime;

    const URL: &str = "https://example.com/pricing";

    fn engine() -> DiffEngine {
        DiffEngine::new(&ExtractionConfig::default()).unwrap()
    }

    /// Render plans as pricing cards: (name, price, features).
    fn page(plans: &[(&str, &str, &[&str])]) -> String {
        let cards: String = plans
            .iter()
            .map(|(name, price, features)| {
                let items: String = features.iter().map(|f| format!("<li>{f}</li>")).collect();
                format!(
                    r#"<div class="card"><h3>{name}</h3><p class="price">{price}</p><ul>{items}</ul></div>"#
                )
            })
            .collect();
        format!("<html><body><main><div class=\"grid\">{cards}</div></main></body></html>")
    }

    fn past(html: String) -> PageSnapshot {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        PageSnapshot::new(URL, CaptureTime::At(at), html)
    }

    fn present(html: String) -> PageSnapshot {
        PageSnapshot::current(URL, html)
    }

    #[test]
    fn test_matching_correctness() {
        let old = past(page(&[("A", "$10/mo", &[]), ("B", "$20/mo", &[])]));
        let new = present(page(&[("A", "$12/mo", &[]), ("C", "$30/mo", &[])]));

        let diff = engine().compare(&old, &new);

        assert_eq!(diff.price_changes.len(), 1);
        assert_eq!(diff.price_changes[0].plan_name, "A");
        assert_eq!(diff.price_changes[0].old_price.amount, 10.0);
        assert_eq!(diff.price_changes[0].new_price.amount, 12.0);
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].plan_name, "B");
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].plan_name, "C");
        assert!(diff.changed.is_empty());
        assert_eq!(diff.change_count(), 3);
    }

    #[test]
    fn test_identical_snapshots_yield_empty_diff() {
        let html = page(&[("Starter", "$9/mo", &["1 project"]), ("Team", "$29/mo", &["SSO"])]);
        let snap = present(html);

        let diff = engine().compare(&snap, &snap);
        assert!(!diff.has_changes());
        assert!(diff.warnings.is_empty());
    }

    #[test]
    fn test_compare_is_deterministic() {
        let old = past(page(&[("Pro", "$10/mo", &["a", "b"]), ("Max", "$50/mo", &["c"])]));
        let new = present(page(&[("Pro", "$15/mo", &["b", "d"]), ("Lite", "$5/mo", &[])]));

        let engine = engine();
        let first = serde_json::to_string(&engine.compare(&old, &new)).unwrap();
        let second = serde_json::to_string(&engine.compare(&old, &new)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_percent_delta() {
        let old = past(page(&[("Pro", "$10/mo", &[]), ("Hobby", "Free", &[])]));
        let new = present(page(&[("Pro", "$15/mo", &[]), ("Hobby", "$4/mo", &[])]));

        let diff = engine().compare(&old, &new);
        let pro = diff.price_changes.iter().find(|c| c.plan_name == "Pro").unwrap();
        assert_eq!(pro.percent_delta, Some(0.5));

        let hobby = diff.price_changes.iter().find(|c| c.plan_name == "Hobby").unwrap();
        assert_eq!(hobby.percent_delta, None);

        let json = serde_json::to_value(hobby).unwrap();
        assert!(json["percent_delta"].is_null());
    }

    #[test]
    fn test_feature_changes_one_per_label() {
        let old = past(page(&[("Pro", "$10/mo", &["Audit log", "SSO"])]));
        let new = present(page(&[("Pro", "$10/mo", &["SSO", "SCIM", "API access"])]));

        let diff = engine().compare(&old, &new);
        let features: Vec<_> = diff
            .changed
            .iter()
            .filter(|c| c.field == "features")
            .map(|c| (c.old_value.as_deref(), c.new_value.as_deref()))
            .collect();
        assert_eq!(
            features,
            vec![
                (Some("Audit log"), None),
                (None, Some("API access")),
                (None, Some("SCIM")),
            ]
        );
        assert!(diff.price_changes.is_empty());
    }

    #[test]
    fn test_billing_and_unit_changes() {
        let old = past(page(&[("Team", "$8 per user/month", &[])]));
        let new = present(page(&[("Team", "$8 per seat/year", &[])]));

        let diff = engine().compare(&old, &new);
        let fields: Vec<&str> = diff.changed.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["price_unit", "billing_period"]);
        assert_eq!(diff.changed[0].new_value.as_deref(), Some("$/seat"));
        assert_eq!(diff.changed[1].old_value.as_deref(), Some("monthly"));
        assert_eq!(diff.changed[1].new_value.as_deref(), Some("annual"));
    }

    #[test]
    fn test_duplicate_plan_first_occurrence_wins() {
        let old = past(page(&[("Pro", "$10/mo", &[])]));
        let new = present(page(&[("Pro", "$10/mo", &[]), ("Pro", "$99/mo", &[])]));

        let diff = engine().compare(&old, &new);
        assert!(!diff.has_changes());
        assert_eq!(
            diff.warnings,
            vec![ExtractionWarning::DuplicatePlan {
                plan_name: "Pro".into(),
                snapshot: "present".into(),
                position: 1,
            }]
        );
    }

    #[test]
    fn test_names_match_case_insensitively() {
        let old = past(page(&[("PRO plan", "$10/mo", &[])]));
        let new = present(page(&[("Pro Plan", "$10/mo", &[])]));
        assert!(!engine().compare(&old, &new).has_changes());
    }

    #[test]
    fn test_percent_delta_helper() {
        assert_eq!(percent_delta(20.0, 10.0), Some(-0.5));
        assert_eq!(percent_delta(0.0, 10.0), None);
    }
}
