//! Per-domain politeness gate.
//!
//! Serializes requests to the same host and spaces them with a jittered
//! delay. The spacing widens after a block report and decays back toward
//! the base window once the host behaves again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Multiplier applied to the delay window after each reported block.
const WIDEN_FACTOR: f64 = 2.0;
/// Multiplier applied on success while recovering.
const DECAY_FACTOR: f64 = 0.75;
/// Upper bound on the widened scale (base window times this).
const MAX_SCALE: f64 = 16.0;

#[derive(Debug)]
struct DomainState {
    next_ready: Instant,
    /// 1.0 is the base window; grows on blocks, decays on success.
    scale: f64,
    blocks: u64,
}

/// Gate shared by every fetch in one search call.
#[derive(Debug, Clone)]
pub struct PolitenessGate {
    min_delay: Duration,
    max_delay: Duration,
    domains: Arc<Mutex<HashMap<String, DomainState>>>,
}

impl PolitenessGate {
    /// `min_delay..=max_delay` is the jittered base spacing window.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            domains: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
    }

    /// Wait until the domain is ready, then claim the next slot. Returns the
    /// domain so callers can report the outcome back.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let domain = Self::extract_domain(url)?;

        loop {
            let wait = {
                let mut domains = self.domains.lock().await;
                let now = Instant::now();
                let state = domains.entry(domain.clone()).or_insert(DomainState {
                    next_ready: now,
                    scale: 1.0,
                    blocks: 0,
                });

                if state.next_ready <= now {
                    let delay = self.jittered_delay(state.scale);
                    state.next_ready = now + delay;
                    None
                } else {
                    Some(state.next_ready - now)
                }
            };

            match wait {
                None => return Some(domain),
                Some(wait) => {
                    debug!(domain = %domain, ?wait, "politeness wait");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Report a block verdict; the domain's spacing widens.
    pub async fn report_block(&self, domain: &str) {
        let mut domains = self.domains.lock().await;
        if let Some(state) = domains.get_mut(domain) {
            state.blocks += 1;
            state.scale = (state.scale * WIDEN_FACTOR).min(MAX_SCALE);
            debug!(
                domain,
                blocks = state.blocks,
                scale = state.scale,
                "politeness widened after block"
            );
        }
    }

    /// Report a clean fetch; spacing decays back toward the base window.
    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.lock().await;
        if let Some(state) = domains.get_mut(domain) {
            state.scale = (state.scale * DECAY_FACTOR).max(1.0);
        }
    }

    fn jittered_delay(&self, scale: f64) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        let base = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        Duration::from_millis((base as f64 * scale) as u64)
    }

    #[cfg(test)]
    async fn scale_of(&self, domain: &str) -> Option<f64> {
        self.domains.lock().await.get(domain).map(|s| s.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_domain_handles_urls_and_garbage() {
        assert_eq!(
            PolitenessGate::extract_domain("https://www.ebay.com/sch/i.html"),
            Some("www.ebay.com".to_string())
        );
        assert_eq!(PolitenessGate::extract_domain("not a url"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn same_domain_requests_are_spaced() {
        let gate = PolitenessGate::new(Duration::from_millis(100), Duration::from_millis(100));

        let t0 = Instant::now();
        gate.acquire("https://example.com/a").await;
        gate.acquire("https://example.com/b").await;
        // Second acquire had to wait out the full spacing window.
        assert!(t0.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_domains_do_not_wait_on_each_other() {
        let gate = PolitenessGate::new(Duration::from_millis(200), Duration::from_millis(200));

        let t0 = Instant::now();
        gate.acquire("https://one.example/a").await;
        gate.acquire("https://two.example/a").await;
        assert!(t0.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn blocks_widen_and_successes_decay() {
        let gate = PolitenessGate::new(Duration::from_millis(10), Duration::from_millis(10));
        gate.acquire("https://example.com/a").await;

        gate.report_block("example.com").await;
        gate.report_block("example.com").await;
        assert_eq!(gate.scale_of("example.com").await, Some(4.0));

        gate.report_success("example.com").await;
        assert_eq!(gate.scale_of("example.com").await, Some(3.0));

        for _ in 0..20 {
            gate.report_success("example.com").await;
        }
        assert_eq!(gate.scale_of("example.com").await, Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn widening_is_capped() {
        let gate = PolitenessGate::new(Duration::from_millis(10), Duration::from_millis(10));
        gate.acquire("https://example.com/a").await;
        for _ in 0..10 {
            gate.report_block("example.com").await;
        }
        assert_eq!(gate.scale_of("example.com").await, Some(MAX_SCALE));
    }
}
