//! Integration tests for the search engine contract.
//!
//! Uses `wiremock` to stand up local listing sites so no real network
//! traffic is made, plus fake fetch strategies where the browser path is
//! exercised. Scenarios cover the healthy/blocked site mix, strategy
//! escalation, the aggregate deadline, and the augmenter feed.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use partscout::models::FetchStrategyKind;
use partscout::registry::{SelectorRules, SiteConfig};
use partscout::{
    FetchError, FetchSpec, FetchedPage, PageFetcher, SearchConfig, SearchEngine, SearchRequest,
    SiteRegistry, SiteStatus,
};

/// Test config: production shape, millisecond timing.
fn fast_config() -> SearchConfig {
    SearchConfig {
        deadline_secs: 30,
        fetch_timeout_secs: 5,
        max_attempts: 3,
        pool_size: 4,
        politeness_min_ms: 0,
        politeness_max_ms: 1,
        backoff_base_ms: 5,
        jitter_min_ms: 0,
        jitter_max_ms: 1,
        augment: false,
        ..SearchConfig::default()
    }
}

fn test_site(id: &str, base: &str, search_path: &str) -> SiteConfig {
    SiteConfig {
        id: id.into(),
        name: id.into(),
        base_url: base.into(),
        search_url: format!("{base}{search_path}?q={{query}}"),
        tier: Default::default(),
        retry: Default::default(),
        selectors: SelectorRules {
            listing: vec!["div.result".into()],
            title: vec!["h2.title".into()],
            price: vec!["span.price".into()],
            link: vec!["a.link".into()],
            image: vec!["img.photo".into()],
            brand: vec![],
            condition: vec![],
            part_number: vec![],
            shipping: vec![],
        },
        content_markers: vec!["result".into()],
    }
}

/// Pad page bodies past the anti-bot short-body floor.
fn pad(html: String) -> String {
    format!("{html}<!-- {} -->", "chrome ".repeat(512))
}

fn result_page(items: usize, image_base: &str) -> String {
    let mut body = String::from("<html><body>");
    for n in 0..items {
        body.push_str(&format!(
            r#"<div class="result">
                 <h2 class="title">Bosch BP{n}100 Front Brake Pad Set variant {n}</h2>
                 <span class="price">${}9.99</span>
                 <a class="link" href="/item/{n}">view</a>
                 <img class="photo" src="{image_base}/img/{n}.png">
               </div>"#,
            n + 1
        ));
    }
    body.push_str("</body></html>");
    pad(body)
}

fn blocked_page() -> String {
    pad("<html><body><h1>Access Denied</h1><p>Please verify you are human to continue.</p></body></html>".to_string())
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_fn(320, 320, |x, y| {
        image::Rgb([(x % 255) as u8, (y % 255) as u8, 64])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// Canned fetch strategy for escalation tests.
struct FakeFetcher {
    kind: FetchStrategyKind,
    html: String,
    calls: Arc<AtomicUsize>,
}

impl FakeFetcher {
    fn new(kind: FetchStrategyKind, html: String) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Self {
                kind,
                html,
                calls: Arc::clone(&calls),
            }),
            calls,
        )
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, spec: &FetchSpec) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedPage {
            url: spec.url.clone(),
            final_url: spec.url.clone(),
            status: 200,
            html: self.html.clone(),
            elapsed: Duration::from_millis(1),
        })
    }

    fn kind(&self) -> FetchStrategyKind {
        self.kind
    }
}

/// Browser stand-in that always fails, for scenarios where escalation must
/// not rescue a site.
struct UnavailableBrowser;

#[async_trait]
impl PageFetcher for UnavailableBrowser {
    async fn fetch(&self, _spec: &FetchSpec) -> Result<FetchedPage, FetchError> {
        Err(FetchError::Browser("no browser in tests".into()))
    }

    fn kind(&self) -> FetchStrategyKind {
        FetchStrategyKind::Browser
    }
}

fn engine_with_http(registry: SiteRegistry, config: SearchConfig) -> SearchEngine {
    SearchEngine::with_fetchers(
        Arc::new(registry),
        config,
        Arc::new(partscout::HttpFetcher::new(Duration::from_secs(5))),
        Arc::new(UnavailableBrowser),
    )
}

// ---------------------------------------------------------------------------
// Scenario: one healthy site, two sites blocked on every attempt
// ---------------------------------------------------------------------------

#[tokio::test]
async fn healthy_site_survives_blocked_neighbors() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/good/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(result_page(5, &base)))
        .mount(&server)
        .await;
    for blocked in ["/blocked-a/search", "/blocked-b/search"] {
        Mock::given(method("GET"))
            .and(path(blocked))
            .respond_with(ResponseTemplate::new(200).set_body_string(blocked_page()))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/img/.*\.png$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png_bytes())
                .insert_header("content-type", "image/png"),
        )
        .mount(&server)
        .await;

    let mut registry = SiteRegistry::empty();
    registry.insert(test_site("good-site", &base, "/good/search"));
    registry.insert(test_site("blocked-a", &base, "/blocked-a/search"));
    registry.insert(test_site("blocked-b", &base, "/blocked-b/search"));

    let engine = engine_with_http(registry, fast_config());
    let request = SearchRequest {
        query: "front brake pad".into(),
        max_sites: 3,
        max_results: 20,
    };
    let results = engine.search(&request).await;

    assert!(!results.listings.is_empty());
    assert!(results.listings.len() <= 20);
    assert!(results.listings.iter().all(|l| l.site == "good-site"));
    assert_eq!(results.site_status["good-site"], SiteStatus::Success);
    assert_eq!(results.site_status["blocked-a"], SiteStatus::Blocked);
    assert_eq!(results.site_status["blocked-b"], SiteStatus::Blocked);

    // Listings made it through enrichment: scored, priced, imaged.
    let top = &results.listings[0];
    assert!(top.relevance > 0.0);
    assert!(top.has_price());
    assert!(top.has_image());
    assert!(top.image_score > 0.0);
}

// ---------------------------------------------------------------------------
// Escalation: persistent blocks must reach the browser strategy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blocked_http_escalates_to_browser_at_least_once() {
    let (light, light_calls) =
        FakeFetcher::new(FetchStrategyKind::Http, blocked_page());
    let (browser, browser_calls) =
        FakeFetcher::new(FetchStrategyKind::Browser, result_page(3, "https://img.test"));

    let mut registry = SiteRegistry::empty();
    registry.insert(test_site("fortress", "https://fortress.test", "/search"));

    let mut config = fast_config();
    config.images_per_listing = 0;
    let engine = SearchEngine::with_fetchers(Arc::new(registry), config, light, browser);

    let request = SearchRequest {
        query: "front brake pad".into(),
        max_sites: 1,
        max_results: 20,
    };
    let results = engine.search(&request).await;

    assert_eq!(light_calls.load(Ordering::SeqCst), 3, "full HTTP ladder ran");
    assert!(
        browser_calls.load(Ordering::SeqCst) >= 1,
        "browser attempted after repeated blocks"
    );
    assert_eq!(results.site_status["fortress"], SiteStatus::Success);
    assert!(!results.listings.is_empty());
}

#[tokio::test]
async fn fully_blocked_site_is_marked_blocked() {
    let (light, _) = FakeFetcher::new(FetchStrategyKind::Http, blocked_page());
    let (browser, browser_calls) =
        FakeFetcher::new(FetchStrategyKind::Browser, blocked_page());

    let mut registry = SiteRegistry::empty();
    registry.insert(test_site("fortress", "https://fortress.test", "/search"));

    let engine = SearchEngine::with_fetchers(Arc::new(registry), fast_config(), light, browser);
    let results = engine
        .search(&SearchRequest::new("front brake pad"))
        .await;

    assert!(browser_calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(results.site_status["fortress"], SiteStatus::Blocked);
    assert!(results.listings.is_empty());
}

// ---------------------------------------------------------------------------
// Aggregate deadline: slow sites produce partial results, not errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deadline_returns_partial_results_without_error() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(result_page(2, &base))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let mut registry = SiteRegistry::empty();
    registry.insert(test_site("slow-a", &base, "/a/search"));
    registry.insert(test_site("slow-b", &base, "/b/search"));

    let mut config = fast_config();
    config.deadline_secs = 1;
    config.fetch_timeout_secs = 20;
    let engine = engine_with_http(registry, config);

    let started = std::time::Instant::now();
    let results = engine
        .search(&SearchRequest {
            query: "front brake pad".into(),
            max_sites: 2,
            max_results: 20,
        })
        .await;
    let wall = started.elapsed();

    assert!(wall < Duration::from_secs(4), "returned in {wall:?}");
    assert!(results.listings.is_empty());
    assert_eq!(results.site_status.len(), 2);
    assert!(results
        .site_status
        .values()
        .all(|s| *s == SiteStatus::Error));
}

// ---------------------------------------------------------------------------
// Bounding and ranking over a large result page
// ---------------------------------------------------------------------------

#[tokio::test]
async fn results_are_bounded_and_rank_consistent() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/good/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(result_page(30, &base)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/img/.*\.png$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut registry = SiteRegistry::empty();
    registry.insert(test_site("good-site", &base, "/good/search"));

    let engine = engine_with_http(registry, fast_config());
    let results = engine
        .search(&SearchRequest {
            query: "front brake pad".into(),
            max_sites: 1,
            max_results: 10,
        })
        .await;

    assert!(!results.listings.is_empty());
    assert!(results.listings.len() <= 10);

    // Dead images degraded the listings instead of dropping them.
    assert!(results.listings.iter().all(|l| !l.has_image()));

    // No listing ranks below another that beats it on every dimension.
    for (i, a) in results.listings.iter().enumerate() {
        for b in &results.listings[i + 1..] {
            let strictly_better = b.relevance > a.relevance
                && b.has_price() > a.has_price()
                && b.has_image() > a.has_image();
            assert!(!strictly_better);
        }
    }
}

// ---------------------------------------------------------------------------
// Augmenter: feeds the same pipeline, never fails the search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn augmenter_contributes_listings_from_search_snippets() {
    let server = MockServer::start().await;
    let ddg_page = pad(r#"<html><body>
      <a class="result__a" href="https://shop.test/pads">Brembo Front Brake Pad Set P85020N</a>
      <a class="result__snippet" href="#">Ceramic pads. $54.99 in stock.</a>
    </body></html>"#
        .to_string());
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ddg_page))
        .mount(&server)
        .await;

    let mut config = fast_config();
    config.augment = true;
    config.web_search_endpoint = Some(server.uri());

    let engine = engine_with_http(SiteRegistry::empty(), config);
    let results = engine
        .search(&SearchRequest::new("front brake pad"))
        .await;

    assert_eq!(results.listings.len(), 1);
    let listing = &results.listings[0];
    assert_eq!(listing.site, "web-search");
    assert!(listing.relevance > 0.0);
    assert_eq!(listing.price.as_ref().unwrap().amount, 54.99);
}

#[tokio::test]
async fn augmenter_failure_never_fails_the_search() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut config = fast_config();
    config.augment = true;
    config.web_search_endpoint = Some(server.uri());

    let engine = engine_with_http(SiteRegistry::empty(), config);
    let results = engine
        .search(&SearchRequest::new("front brake pad"))
        .await;

    assert!(results.listings.is_empty());
    assert!(results.site_status.is_empty());
}
