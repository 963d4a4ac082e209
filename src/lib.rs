//! partscout - resilient supplier-listing search for part sourcing.
//!
//! Locates live supplier/pricing listings for a named component across
//! heterogeneous, frequently bot-hostile storefronts and returns a bounded,
//! ranked listing set to the calling pipeline. The crate covers strategy
//! escalation between plain HTTP fetches and full browser automation,
//! anti-bot classification, selector-driven extraction, image plausibility
//! checks, relevance scoring, and cross-source deduplication.

pub mod antibot;
pub mod config;
pub mod error;
pub mod imaging;
pub mod models;
pub mod parse;
pub mod rank;
pub mod registry;
pub mod scoring;
pub mod scrapers;
pub mod search;
pub mod websearch;

pub use config::{DedupePolicy, SearchConfig};
pub use error::{FetchError, ImageError, ParseError, WebSearchError};
pub use models::{FetchAttempt, ImageInfo, Listing, Price, SearchRequest, SearchResults, SiteStatus};
pub use registry::{SiteConfig, SiteRegistry};
pub use scrapers::{BrowserFetcher, FetchSpec, FetchedPage, HttpFetcher, PageFetcher};
pub use search::SearchEngine;
