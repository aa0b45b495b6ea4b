// src/services/extract.rs

//! Pricing plan extraction.
//!
//! A plan is recognized from structural cues in the markup: a short heading,
//! the smallest enclosing block that holds a price token and no other heading
//! of the same or higher rank (the plan "card"), and the `li` items of that
//! card as feature labels. Anything that does not fit is skipped.

use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{BillingPeriod, ExtractionConfig, PageSnapshot, Price, PricingPlan};
use crate::utils::clean_text;

/// Characters after a price token searched for unit and period words.
const PRICE_TAIL_CHARS: usize = 48;

/// Plans found in one snapshot, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub plans: Vec<PricingPlan>,

    /// Dropped later occurrences: (plan name, zero-based document position)
    pub duplicates: Vec<(String, usize)>,
}

/// Extracts pricing plans from page markup.
pub struct PlanExtractor {
    config: ExtractionConfig,
    /// `rank_selectors[n]` matches headings h1..=h(n+1)
    rank_selectors: Vec<Selector>,
    heading_sel: Selector,
    feature_sel: Selector,
    price_re: Regex,
    free_re: Regex,
    unit_re: Regex,
}

impl PlanExtractor {
    /// Create an extractor with the given limits.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let levels = ["h1", "h2", "h3", "h4", "h5"];
        let rank_selectors = (1..=levels.len())
            .map(|n| Self::parse_selector(&levels[..n].join(", ")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config: config.clone(),
            rank_selectors,
            heading_sel: Self::parse_selector("h1, h2, h3, h4, h5")?,
            feature_sel: Self::parse_selector("li")?,
            price_re: Regex::new(r"([$€£])\s?(\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?)")?,
            free_re: Regex::new(r"(?i)\bfree\b(\s+trial)?")?,
            unit_re: Regex::new(r"(?i)^\s*(?:/|per)\s*(user|seat|member|editor|agent|host)s?\b")?,
        })
    }

    /// Extract plans from a snapshot. First occurrence of a name wins.
    pub fn extract(&self, snapshot: &PageSnapshot) -> Extraction {
        let document = Html::parse_document(&snapshot.raw_content);
        let mut extraction = Extraction::default();
        let mut seen = HashSet::new();
        let mut position = 0;

        for heading in document.select(&self.heading_sel) {
            let Some(plan) = self.plan_for_heading(heading) else {
                continue;
            };

            if seen.insert(plan.key()) {
                extraction.plans.push(plan);
            } else {
                log::warn!(
                    "Duplicate plan '{}' at position {} in {} dropped",
                    plan.plan_name,
                    position,
                    snapshot.source_url
                );
                extraction.duplicates.push((plan.plan_name, position));
            }
            position += 1;
        }

        extraction
    }

    fn plan_for_heading(&self, heading: ElementRef<'_>) -> Option<PricingPlan> {
        let name = clean_text(&heading.text().collect::<Vec<_>>().join(" "));
        if name.is_empty()
            || name.chars().count() > self.config.max_plan_name_length
            || self.price_re.is_match(&name)
        {
            return None;
        }

        let card = self.find_card(heading)?;
        let card_text = clean_text(&card.text().collect::<Vec<_>>().join(" "));
        let (price, tail) = self.parse_price(&price_text(card))?;

        let features: BTreeSet<String> = card
            .select(&self.feature_sel)
            .map(|li| clean_text(&li.text().collect::<Vec<_>>().join(" ")))
            .filter(|f| !f.is_empty() && f.chars().count() <= self.config.max_feature_length)
            .collect();

        Some(PricingPlan {
            plan_name: name,
            price,
            features,
            billing_period: Self::billing_period(&tail, &card_text),
        })
    }

    /// Smallest ancestor holding a price and no competing heading.
    fn find_card<'a>(&self, heading: ElementRef<'a>) -> Option<ElementRef<'a>> {
        let rank = heading
            .value()
            .name()
            .trim_start_matches('h')
            .parse::<usize>()
            .ok()?;
        let competing = &self.rank_selectors[rank.clamp(1, self.rank_selectors.len()) - 1];

        for node in heading.ancestors().take(self.config.max_card_depth) {
            let element = ElementRef::wrap(node)?;
            if matches!(element.value().name(), "body" | "html") {
                return None;
            }
            if element.select(competing).count() > 1 {
                return None;
            }
            let text = price_text(element);
            if self.price_re.is_match(&text) || self.free_price(&text) {
                return Some(element);
            }
        }
        None
    }

    fn free_price(&self, text: &str) -> bool {
        self.free_re
            .captures_iter(text)
            .any(|caps| caps.get(1).is_none())
    }

    /// First price token in the card, plus the text that follows it.
    fn parse_price(&self, text: &str) -> Option<(Price, String)> {
        if let Some(caps) = self.price_re.captures(text) {
            let whole = caps.get(0)?;
            let amount: f64 = caps[2].replace(',', "").parse().ok()?;
            let tail: String = text[whole.end()..].chars().take(PRICE_TAIL_CHARS).collect();

            let mut price = Price::new(amount, &caps[1]);
            if let Some(unit) = self.unit_re.captures(&tail) {
                price = price.per(unit[1].to_lowercase());
            }
            return Some((price, tail));
        }

        if self.free_price(text) {
            return Some((Price::new(0.0, ""), String::new()));
        }
        None
    }

    fn billing_period(tail: &str, card_text: &str) -> BillingPeriod {
        let tail = tail.to_lowercase();
        let near = |words: &[&str]| words.iter().any(|w| tail.contains(w));
        if near(&["/mo", "month"]) {
            return BillingPeriod::Monthly;
        }
        if near(&["/yr", "/year", "year", "annual"]) {
            return BillingPeriod::Annual;
        }

        let card = card_text.to_lowercase();
        if card.contains("billed annually") || card.contains("billed yearly") {
            BillingPeriod::Annual
        } else if card.contains("billed monthly") {
            BillingPeriod::Monthly
        } else {
            BillingPeriod::Unspecified
        }
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

/// Card text outside headings and feature items.
///
/// Prices are only read from here, so "Free onboarding" as a feature or
/// "Free" as a plan name never reads as a price.
fn price_text(card: ElementRef<'_>) -> String {
    let parts: Vec<&str> = card
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let labelled = node
                .ancestors()
                .take_while(|ancestor| ancestor.id() != card.id())
                .filter_map(|ancestor| ancestor.value().as_element())
                .any(|el| matches!(el.name(), "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"));
            (!labelled).then_some(&**text)
        })
        .collect();
    clean_text(&parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Extraction {
        let extractor = PlanExtractor::new(&ExtractionConfig::default()).unwrap();
        extractor.extract(&PageSnapshot::current("https://example.com/pricing", html))
    }

    const PAGE: &str = r#"
        <html><body>
          <h1>Simple pricing for every team</h1>
          <div class="plans">
            <div class="plan">
              <h3>Free</h3>
              <p>Free forever</p>
              <ul><li>Up to 3 users</li><li>Basic support</li></ul>
            </div>
            <div class="plan">
              <h3>Pro</h3>
              <p><span>$12</span> per user/month</p>
              <ul><li>Unlimited projects</li><li>Priority support</li></ul>
            </div>
            <div class="plan">
              <h3>Enterprise</h3>
              <p>$1,200 /year, billed annually</p>
              <h4>Includes</h4>
              <ul><li>SSO</li><li>Audit log</li></ul>
            </div>
            <div class="plan">
              <h3>Custom</h3>
              <p>Contact sales</p>
            </div>
          </div>
          <h2>FAQ</h2>
          <p>Do you offer a free trial? Yes.</p>
        </body></html>
    "#;

    #[test]
    fn test_extracts_plans_in_document_order() {
        let result = extract(PAGE);
        let names: Vec<&str> = result.plans.iter().map(|p| p.plan_name.as_str()).collect();
        assert_eq!(names, vec!["Free", "Pro", "Enterprise"]);
        assert!(result.duplicates.is_empty());
    }

    #[test]
    fn test_price_unit_and_period() {
        let result = extract(PAGE);

        let free = &result.plans[0];
        assert_eq!(free.price.amount, 0.0);

        let pro = &result.plans[1];
        assert_eq!(pro.price, Price::new(12.0, "$").per("user"));
        assert_eq!(pro.billing_period, BillingPeriod::Monthly);
        assert!(pro.features.contains("Unlimited projects"));
        assert_eq!(pro.features.len(), 2);

        let enterprise = &result.plans[2];
        assert_eq!(enterprise.price.amount, 1200.0);
        assert_eq!(enterprise.billing_period, BillingPeriod::Annual);
        assert!(enterprise.features.contains("SSO"));
    }

    #[test]
    fn test_plan_without_price_is_omitted() {
        let result = extract(PAGE);
        assert!(result.plans.iter().all(|p| p.plan_name != "Custom"));
        assert!(result.plans.iter().all(|p| p.plan_name != "FAQ"));
        assert!(result.plans.iter().all(|p| p.plan_name != "Includes"));
    }

    #[test]
    fn test_free_feature_is_not_a_price() {
        let html = r#"
            <div class="plans">
              <div class="plan"><h3>Pro</h3><p>$10/mo</p><ul><li>Projects</li></ul></div>
              <div class="plan"><h3>Enterprise</h3><p>Contact sales</p>
                <ul><li>Free onboarding</li><li>SSO</li></ul></div>
              <div class="plan"><h3>Free</h3><p>Get started</p><ul><li>1 user</li></ul></div>
            </div>
        "#;
        let result = extract(html);
        let plans: Vec<(&str, f64)> = result
            .plans
            .iter()
            .map(|p| (p.plan_name.as_str(), p.price.amount))
            .collect();
        assert_eq!(plans, vec![("Pro", 10.0)]);
    }

    #[test]
    fn test_duplicate_names_first_wins() {
        let html = r#"
            <div><section><h3>Pro</h3><p>$10/mo</p><ul><li>X feature</li></ul></section>
            <section><h3>PRO</h3><p>$99/mo</p><ul><li>Y feature</li></ul></section></div>
        "#;
        let result = extract(html);
        assert_eq!(result.plans.len(), 1);
        assert_eq!(result.plans[0].price.amount, 10.0);
        assert!(result.plans[0].features.contains("X feature"));
        assert_eq!(result.duplicates, vec![("PRO".to_string(), 1)]);
    }

    #[test]
    fn test_non_html_yields_nothing() {
        assert!(extract("plain text, $10").plans.is_empty());
    }
}
