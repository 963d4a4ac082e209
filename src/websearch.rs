//! Secondary listing source backed by DuckDuckGo's HTML search endpoint.
//!
//! Feeds the same ranking pipeline as the site scrapers: snippets run
//! through the shared price/brand/part-number extraction and come out as
//! ordinary listings under the `web-search` source id. Any failure flips
//! the source off for the remainder of the call; the search never fails
//! because of the augmenter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::error::WebSearchError;
use crate::models::Listing;
use crate::parse::{price, title_is_listing, vocab};
use crate::scrapers::random_header_set;

/// DuckDuckGo HTML (non-JS) search endpoint.
const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Result anchors in the HTML endpoint's markup.
const RESULT_SELECTOR: &str = "a.result__a";

/// Snippet anchors, parallel to the result anchors.
const SNIPPET_SELECTOR: &str = "a.result__snippet";

/// Source id stamped on augmented listings.
pub const SOURCE_ID: &str = "web-search";

/// Optional candidate source driven by a generic web search.
pub struct WebSearchSource {
    client: Client,
    endpoint: String,
    disabled: AtomicBool,
}

impl WebSearchSource {
    pub fn new(timeout: Duration) -> Self {
        Self::with_endpoint(timeout, SEARCH_ENDPOINT)
    }

    /// Point the source at a different endpoint (tests use a mock server).
    pub fn with_endpoint(timeout: Duration, endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
            disabled: AtomicBool::new(false),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Search and convert results to listings. Never errors: a failed call
    /// disables the source and returns nothing.
    pub async fn search(&self, query: &str) -> Vec<Listing> {
        if self.is_disabled() {
            return Vec::new();
        }
        match self.try_search(query).await {
            Ok(listings) => listings,
            Err(err) => {
                warn!(%err, "web search failed, disabling augmenter for this call");
                self.disabled.store(true, Ordering::Relaxed);
                Vec::new()
            }
        }
    }

    async fn try_search(&self, query: &str) -> Result<Vec<Listing>, WebSearchError> {
        debug!(%query, "web search");
        let headers = random_header_set();

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::USER_AGENT, headers.user_agent)
            .form(&[("q", query), ("kl", "us-en")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebSearchError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        parse_results(&html)
    }
}

fn parse_results(html: &str) -> Result<Vec<Listing>, WebSearchError> {
    let document = Html::parse_document(html);
    let result_selector = Selector::parse(RESULT_SELECTOR)
        .map_err(|e| WebSearchError::Parse(format!("selector: {e:?}")))?;
    let snippet_selector = Selector::parse(SNIPPET_SELECTOR)
        .map_err(|e| WebSearchError::Parse(format!("selector: {e:?}")))?;

    let snippets: Vec<String> = document
        .select(&snippet_selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect();

    let mut listings = Vec::new();
    for (index, element) in document.select(&result_selector).enumerate() {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(link) = unwrap_redirect(href) else {
            continue;
        };
        let title = element.text().collect::<String>().trim().to_string();
        if !title_is_listing(&title) {
            continue;
        }

        let snippet = snippets.get(index).map(String::as_str).unwrap_or("");
        let mut listing = Listing::new(title.clone(), link, SOURCE_ID);
        listing.price = price::extract(snippet).or_else(|| price::extract(&title));
        listing.brand =
            vocab::find_brand_in(&title).or_else(|| vocab::find_brand_in(snippet));
        listing.part_number =
            vocab::find_part_number(&title).or_else(|| vocab::find_part_number(snippet));
        listings.push(listing);
    }

    debug!(count = listings.len(), "parsed web search results");
    Ok(listings)
}

/// DuckDuckGo sometimes returns direct URLs and sometimes wraps them in a
/// `/l/?uddg=<encoded>` redirect.
fn unwrap_redirect(href: &str) -> Option<String> {
    if let Some(pos) = href.find("uddg=") {
        let encoded = &href[pos + 5..];
        let end = encoded.find('&').unwrap_or(encoded.len());
        return urlencoding::decode(&encoded[..end])
            .ok()
            .map(|s| s.into_owned());
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    if href.starts_with("//") {
        return Some(format!("https:{href}"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ddg_page() -> &'static str {
        r#"<html><body>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fshop.test%2Fbrake-pads&rut=abc">
              Brembo Front Brake Pad Set P85020N
            </a>
            <a class="result__snippet" href="#">Premium ceramic pads. $54.99 with free shipping.</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://other.test/pads">Budget brake pads for most sedans</a>
            <a class="result__snippet" href="#">From 19,99 € at Other Test.</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://ads.test/x">Sponsored</a>
          </div>
        </body></html>"#
    }

    #[test]
    fn redirect_urls_are_unwrapped() {
        assert_eq!(
            unwrap_redirect("//duckduckgo.com/l/?uddg=https%3A%2F%2Fshop.test%2Fx&rut=1"),
            Some("https://shop.test/x".to_string())
        );
        assert_eq!(
            unwrap_redirect("https://direct.test/x"),
            Some("https://direct.test/x".to_string())
        );
        assert_eq!(
            unwrap_redirect("//bare.test/x"),
            Some("https://bare.test/x".to_string())
        );
        assert_eq!(unwrap_redirect("/relative"), None);
    }

    #[test]
    fn snippets_enrich_parsed_results() {
        let listings = parse_results(ddg_page()).unwrap();
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.site, SOURCE_ID);
        assert_eq!(first.link, "https://shop.test/brake-pads");
        assert_eq!(first.price.as_ref().unwrap().amount, 54.99);
        assert_eq!(first.brand.as_deref(), Some("Brembo"));
        assert_eq!(first.part_number.as_deref(), Some("P85020N"));

        let second = &listings[1];
        assert_eq!(second.price.as_ref().unwrap().currency, "EUR");
    }

    #[tokio::test]
    async fn failure_disables_source_without_erroring() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = WebSearchSource::with_endpoint(Duration::from_secs(5), server.uri());
        assert!(source.search("front brake pad").await.is_empty());
        assert!(source.is_disabled());

        // Once disabled, no further requests go out.
        server.reset().await;
        assert!(source.search("front brake pad").await.is_empty());
    }

    #[tokio::test]
    async fn successful_search_produces_listings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("front+brake+pad"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ddg_page()))
            .mount(&server)
            .await;

        let source = WebSearchSource::with_endpoint(Duration::from_secs(5), server.uri());
        let listings = source.search("front brake pad").await;
        assert_eq!(listings.len(), 2);
        assert!(!source.is_disabled());
    }
}
