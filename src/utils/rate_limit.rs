// src/utils/rate_limit.rs

//! Per-destination request spacing shared across concurrent probes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::models::RateLimitConfig;
use crate::utils::get_domain;

/// Reserves start slots per host so that requests to one host are spaced by
/// at least the configured interval, whichever task issues them.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(RateLimitConfig {
            default_interval_ms: 0,
            hosts: Vec::new(),
        })
    }

    /// Wait until a request to `url`'s host may start.
    pub async fn acquire(&self, url: &str) {
        let host = get_domain(url).unwrap_or_default();
        let interval = Duration::from_millis(self.config.interval_for(&host));
        if interval.is_zero() {
            return;
        }

        let slot = {
            let mut slots = self.next_slot.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let slot = slots
                .get(&host)
                .copied()
                .filter(|next| *next > now)
                .unwrap_or(now);
            slots.insert(host.clone(), slot + interval);
            slot
        };

        if slot > Instant::now() {
            log::debug!("Rate limit: waiting for slot on {}", host);
            tokio::time::sleep_until(slot).await;
        }
    }
}
