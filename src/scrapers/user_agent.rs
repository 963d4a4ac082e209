//! Rotating browser identities for plain HTTP fetches.
//!
//! Each set pairs a real browser user agent with matching Accept headers so
//! the request profile is internally consistent. Agents current as of
//! mid 2026.

use rand::Rng;

/// One coherent browser header profile.
#[derive(Debug, Clone, Copy)]
pub struct HeaderSet {
    pub user_agent: &'static str,
    pub accept: &'static str,
    pub accept_language: &'static str,
}

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

pub const HEADER_SETS: &[HeaderSet] = &[
    // Chrome on Windows
    HeaderSet {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9",
    },
    HeaderSet {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.8",
    },
    // Chrome on Mac
    HeaderSet {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9",
    },
    // Firefox on Windows
    HeaderSet {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:140.0) Gecko/20100101 Firefox/140.0",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        accept_language: "en-US,en;q=0.5",
    },
    // Firefox on Mac
    HeaderSet {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:140.0) Gecko/20100101 Firefox/140.0",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        accept_language: "en-US,en;q=0.5",
    },
    // Safari on Mac
    HeaderSet {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.5 Safari/605.1.15",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-US,en;q=0.9",
    },
    // Edge on Windows
    HeaderSet {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36 Edg/138.0.0.0",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9",
    },
];

/// Pick a header set at random for the next request.
pub fn random_header_set() -> &'static HeaderSet {
    let idx = rand::rng().random_range(0..HEADER_SETS.len());
    &HEADER_SETS[idx]
}
