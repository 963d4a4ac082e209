//! Error taxonomy for the search pipeline.
//!
//! Per-site and per-listing failures never escalate past the engine; the
//! variants here exist so callers of the individual components can tell a
//! retryable transport problem from a block verdict or a dead parse.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single page-fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, TLS, mid-body reset).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The attempt ran past its budget.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Anti-bot classification came back positive for the page.
    #[error("page classified as blocked: {0}")]
    Blocked(String),

    /// Server answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// Body too small to be a real result page.
    #[error("response body implausibly short ({0} bytes)")]
    ShortBody(usize),

    /// Browser session could not be launched or died mid-fetch.
    #[error("browser session unavailable: {0}")]
    Browser(String),
}

impl FetchError {
    /// Whether retrying the same strategy can plausibly succeed.
    /// Blocks are not retryable here - they escalate instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::ShortBody(_) => true,
            Self::Status(code) => *code >= 500 || *code == 429,
            Self::Blocked(_) | Self::Browser(_) => false,
        }
    }

    /// Whether the failure looks like bot countermeasures rather than a
    /// plain outage, which is what decides strategy escalation.
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Blocked(_)) || matches!(self, Self::Status(403) | Self::Status(429))
    }
}

/// Failure while turning a page into listings. Not retried: the same HTML
/// will fail the same way.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

/// Failure while probing or decoding a candidate image. Always degrades the
/// listing instead of propagating.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("probe returned status {0}")]
    Status(u16),

    #[error("content-type '{0}' is not an image")]
    NotAnImage(String),

    #[error("image exceeds size cap ({size} > {cap} bytes)")]
    TooLarge { size: u64, cap: u64 },

    #[error("empty response body")]
    Empty,

    #[error("undecodable image data: {0}")]
    Undecodable(String),
}

/// Failure of the external web-search source. Disables the source for the
/// remainder of the call; never fails the search.
#[derive(Debug, Error)]
pub enum WebSearchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search endpoint returned {0}")]
    Status(u16),

    #[error("failed to parse search results: {0}")]
    Parse(String),
}
