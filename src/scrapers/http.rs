//! Plain HTTP fetcher with rotating browser headers.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header;
use reqwest::Client;
use tracing::debug;

use super::user_agent::random_header_set;
use super::{FetchSpec, FetchedPage, PageFetcher};
use crate::error::FetchError;
use crate::models::FetchStrategyKind;

/// Bodies below this size are treated as failed fetches; no real result
/// page is this small.
const MIN_BODY_BYTES: usize = 512;

/// Stateless lightweight fetcher. Cheap to clone and share; carries no
/// session state beyond reqwest's cookie jar.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    min_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            timeout,
            min_body_bytes: MIN_BODY_BYTES,
        }
    }

    /// Lower the short-body floor (test fixtures are small).
    pub fn with_min_body_bytes(mut self, min_body_bytes: usize) -> Self {
        self.min_body_bytes = min_body_bytes;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, spec: &FetchSpec) -> Result<FetchedPage, FetchError> {
        let headers = random_header_set();
        let start = Instant::now();

        let response = self
            .client
            .get(&spec.url)
            .header(header::USER_AGENT, headers.user_agent)
            .header(header::ACCEPT, headers.accept)
            .header(header::ACCEPT_LANGUAGE, headers.accept_language)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::Network(e)
                }
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        if !response.status().is_success() {
            return Err(FetchError::Status(status));
        }

        let html = response.text().await.map_err(FetchError::Network)?;
        let elapsed = start.elapsed();
        debug!(url = %spec.url, status, bytes = html.len(), ?elapsed, "http fetch");

        if html.len() < self.min_body_bytes {
            return Err(FetchError::ShortBody(html.len()));
        }

        Ok(FetchedPage {
            url: spec.url.clone(),
            final_url,
            status,
            html,
            elapsed,
        })
    }

    fn kind(&self) -> FetchStrategyKind {
        FetchStrategyKind::Http
    }
}
