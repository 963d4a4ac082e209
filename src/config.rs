//! Runtime configuration for the search engine.
//!
//! Everything here has a sensible default so `SearchConfig::default()` is a
//! production configuration; tests shrink the timing knobs instead of
//! sleeping through real backoff windows.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Dedup key policy for merged results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupePolicy {
    /// Normalized title only. Cross-site collisions collapse to the
    /// higher-relevance copy.
    #[default]
    Title,
    /// (normalized title, source site) - keeps one copy per supplier.
    TitlePerSite,
}

/// Tunables for one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Aggregate deadline for the whole search, in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Per-attempt fetch timeout, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Plain-HTTP attempts per site before escalating to the browser.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Concurrent per-site pipelines.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Politeness delay window before each same-site request, milliseconds.
    #[serde(default = "default_politeness_min_ms")]
    pub politeness_min_ms: u64,
    #[serde(default = "default_politeness_max_ms")]
    pub politeness_max_ms: u64,

    /// Retry backoff: `backoff_base_ms * 2^attempt` plus a jitter drawn from
    /// `[jitter_min_ms, jitter_max_ms]`.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,

    /// Browser content-selector wait budget, seconds.
    #[serde(default = "default_browser_wait_secs")]
    pub browser_wait_secs: u64,

    /// Browser page-load budget for hard-tier sites, seconds.
    #[serde(default = "default_patient_load_secs")]
    pub patient_load_secs: u64,

    /// Image download cap in bytes.
    #[serde(default = "default_image_cap_bytes")]
    pub image_cap_bytes: u64,

    /// How many images per listing get probed.
    #[serde(default = "default_images_per_listing")]
    pub images_per_listing: usize,

    #[serde(default)]
    pub dedupe: DedupePolicy,

    /// Whether the external web-search source augments site results.
    #[serde(default = "default_true")]
    pub augment: bool,

    /// Override for the web-search endpoint (tests point this at a mock).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_endpoint: Option<String>,
}

impl SearchConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn politeness_window(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.politeness_min_ms),
            Duration::from_millis(self.politeness_max_ms),
        )
    }

    /// Backoff before retry `attempt` (zero-based), jitter included.
    pub fn backoff(&self, attempt: u32, jitter_ms: u64) -> Duration {
        let base = self.backoff_base_ms.saturating_mul(1u64 << attempt.min(6));
        Duration::from_millis(base.saturating_add(jitter_ms))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_attempts: default_max_attempts(),
            pool_size: default_pool_size(),
            politeness_min_ms: default_politeness_min_ms(),
            politeness_max_ms: default_politeness_max_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            browser_wait_secs: default_browser_wait_secs(),
            patient_load_secs: default_patient_load_secs(),
            image_cap_bytes: default_image_cap_bytes(),
            images_per_listing: default_images_per_listing(),
            dedupe: DedupePolicy::default(),
            augment: default_true(),
            web_search_endpoint: None,
        }
    }
}

fn default_deadline_secs() -> u64 {
    60
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_pool_size() -> usize {
    8
}
fn default_politeness_min_ms() -> u64 {
    1_000
}
fn default_politeness_max_ms() -> u64 {
    3_000
}
fn default_backoff_base_ms() -> u64 {
    1_000
}
fn default_jitter_min_ms() -> u64 {
    1_000
}
fn default_jitter_max_ms() -> u64 {
    4_000
}
fn default_browser_wait_secs() -> u64 {
    12
}
fn default_patient_load_secs() -> u64 {
    45
}
fn default_image_cap_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_images_per_listing() -> usize {
    3
}
fn default_true() -> bool {
    true
}
