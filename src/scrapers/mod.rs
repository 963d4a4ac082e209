//! Page-fetch strategies for listing sites.
//!
//! Two implementations sit behind the [`PageFetcher`] trait: a plain HTTP
//! fetcher with rotating browser headers, and a full browser renderer for
//! sites that defeat it. The engine escalates between them without knowing
//! which is which.

pub mod browser;
mod http;
pub mod politeness;
mod user_agent;

pub use browser::{BrowserFetcher, BrowserSettings};
pub use http::HttpFetcher;
pub use politeness::PolitenessGate;
pub use user_agent::{random_header_set, HeaderSet, HEADER_SETS};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::FetchStrategyKind;

/// Per-request instructions shared by both strategies.
#[derive(Debug, Clone, Default)]
pub struct FetchSpec {
    pub url: String,
    /// Selectors whose appearance signals real content. The browser polls
    /// this chain (then generic fallbacks) before capturing the page; the
    /// HTTP fetcher ignores it.
    pub wait_selectors: Vec<String>,
    /// Known-hard site: allow the longer page-load budget.
    pub patient: bool,
}

impl FetchSpec {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// A fetched page plus the transport facts the classifier cares about.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub html: String,
    pub elapsed: Duration,
}

/// Strategy interface. Implementations must be shareable across concurrent
/// per-site pipelines; any exclusive state is their own responsibility.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, spec: &FetchSpec) -> Result<FetchedPage, FetchError>;

    /// Which strategy this is, for attempt records and logs.
    fn kind(&self) -> FetchStrategyKind;
}
