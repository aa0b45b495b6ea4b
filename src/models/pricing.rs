// src/models/pricing.rs

//! Pricing plans and the structured diff between two pricing pages.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::CaptureTime;

/// A plan price: numeric amount plus currency and optional unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,

    /// Currency symbol as written on the page ("$", "€", "£")
    pub currency: String,

    /// Per-unit qualifier, e.g. "user" or "seat"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Price {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            unit: None,
        }
    }

    pub fn per(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.amount.fract() == 0.0 {
            write!(f, "{}{}", self.currency, self.amount as i64)?;
        } else {
            write!(f, "{}{:.2}", self.currency, self.amount)?;
        }
        if let Some(unit) = &self.unit {
            write!(f, "/{unit}")?;
        }
        Ok(())
    }
}

/// Billing cadence of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Annual,
    Unspecified,
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Annual => "annual",
            BillingPeriod::Unspecified => "unspecified",
        })
    }
}

/// One plan extracted from a pricing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPlan {
    /// Plan name as displayed
    pub plan_name: String,
    pub price: Price,
    pub features: BTreeSet<String>,
    pub billing_period: BillingPeriod,
}

impl PricingPlan {
    /// Matching key: lowercase with collapsed whitespace.
    pub fn key(&self) -> String {
        normalize_name(&self.plan_name)
    }
}

/// Normalize a display name into a matching key.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Non-fatal extraction notes carried alongside a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionWarning {
    /// A later plan reused an earlier plan's name and was dropped.
    DuplicatePlan {
        plan_name: String,
        /// Which snapshot: "past" or "present"
        snapshot: String,
        /// Zero-based document position of the dropped occurrence
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanAdded {
    pub plan_name: String,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRemoved {
    pub plan_name: String,
    pub price: Price,
}

/// A non-price field change on a matched plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanChanged {
    pub plan_name: String,
    /// "features", "billing_period" or "price_unit"
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChanged {
    pub plan_name: String,
    pub old_price: Price,
    pub new_price: Price,
    /// `(new - old) / old`; `None` when the old amount is zero
    pub percent_delta: Option<f64>,
}

/// Structured comparison of two renderings of one pricing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingDiff {
    pub source_url: String,
    pub past_captured_at: CaptureTime,
    pub present_captured_at: CaptureTime,
    pub added: Vec<PlanAdded>,
    pub removed: Vec<PlanRemoved>,
    pub changed: Vec<PlanChanged>,
    pub price_changes: Vec<PriceChanged>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ExtractionWarning>,
}

impl PricingDiff {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len() + self.price_changes.len()
    }
}
