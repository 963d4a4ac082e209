//! Core data types shared across the search pipeline.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Final status of one consulted site within a search call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    /// At least one fetch succeeded and was parsed.
    Success,
    /// Every strategy ended in an anti-bot verdict.
    Blocked,
    /// Network failure, dead parse, or the deadline cut the site off.
    Error,
}

/// Price extracted from listing markup or snippet text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    /// ISO-ish currency code ("USD", "EUR", ...).
    pub currency: String,
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

/// A candidate product image attached to a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub url: String,
    pub is_valid: bool,
    pub width: u32,
    pub height: u32,
    /// Decoded format name ("jpeg", "png", ...), if the image decoded.
    pub format: Option<String>,
    /// Plausibility score in [0,1]. Zero for invalid images.
    pub score: f64,
}

impl ImageInfo {
    /// An image URL seen in markup but not yet probed.
    pub fn unchecked(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_valid: false,
            width: 0,
            height: 0,
            format: None,
            score: 0.0,
        }
    }

    /// Terminal record for a URL that failed probing or decoding.
    pub fn invalid(url: impl Into<String>) -> Self {
        Self::unchecked(url)
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(f64::from(self.width) / f64::from(self.height))
    }
}

/// One parsed supplier listing, before and after scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub price: Option<Price>,
    /// Absolute URL of the listing page.
    pub link: String,
    /// Registry id of the originating site ("ebay", "web-search", ...).
    pub site: String,
    pub images: Vec<ImageInfo>,
    pub brand: Option<String>,
    pub part_number: Option<String>,
    pub condition: Option<String>,
    pub shipping: Option<String>,
    /// Relevance against the query, in [0,1]. Zero until scored.
    pub relevance: f64,
    /// Best image plausibility score, in [0,1]. Zero until validated.
    pub image_score: f64,
}

impl Listing {
    pub fn new(title: impl Into<String>, link: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price: None,
            link: link.into(),
            site: site.into(),
            images: Vec::new(),
            brand: None,
            part_number: None,
            condition: None,
            shipping: None,
            relevance: 0.0,
            image_score: 0.0,
        }
    }

    /// Case- and whitespace-insensitive key used for deduplication.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    pub fn has_price(&self) -> bool {
        self.price.is_some()
    }

    pub fn has_image(&self) -> bool {
        self.images.iter().any(|i| i.is_valid)
    }
}

/// Lower-case and collapse all whitespace runs to single spaces.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Which fetch strategy produced an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategyKind {
    Http,
    Browser,
}

impl fmt::Display for FetchStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Browser => write!(f, "browser"),
        }
    }
}

/// Outcome of a single fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Blocked,
    Error,
}

/// Record of one fetch attempt against one site. Created per attempt, used
/// for logging and backoff decisions, then discarded.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub site: String,
    pub strategy: FetchStrategyKind,
    /// Zero-based attempt index within the strategy.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
}

/// The single search contract input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Upper bound on sites that contribute results.
    pub max_sites: usize,
    /// Upper bound on returned listings.
    pub max_results: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_sites: 5,
            max_results: 20,
        }
    }
}

/// The single search contract output: ranked listings plus per-site
/// diagnostics. Always produced, even when everything failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub listings: Vec<Listing>,
    pub site_status: HashMap<String, SiteStatus>,
    pub elapsed: Duration,
}
