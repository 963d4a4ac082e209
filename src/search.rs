//! Search orchestration: site selection, strategy escalation, concurrency,
//! and the aggregate deadline.
//!
//! One [`SearchEngine::search`] call fans out over a shuffled site
//! selection, runs each site's fetch-classify-parse pipeline under a
//! bounded pool, escalates from plain HTTP to the browser when a site
//! fights back, and folds everything that finished before the deadline
//! into one ranked result. Per-site failure is diagnostic data, never an
//! error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::antibot::BotDetector;
use crate::config::SearchConfig;
use crate::error::FetchError;
use crate::imaging::ImageValidator;
use crate::models::{
    AttemptOutcome, FetchAttempt, FetchStrategyKind, Listing, SearchRequest, SearchResults,
    SiteStatus,
};
use crate::parse;
use crate::rank;
use crate::registry::{DifficultyTier, RetryStrategy, SiteConfig, SiteRegistry};
use crate::scoring::{self, QueryTerms};
use crate::scrapers::{
    BrowserFetcher, BrowserSettings, FetchSpec, FetchedPage, HttpFetcher, PageFetcher,
    PolitenessGate,
};
use crate::websearch::WebSearchSource;

/// Upper bound on raw listings taken from one page before enrichment.
const MAX_LISTINGS_PER_SITE: usize = 25;

/// The resilient scraping and ranking engine.
pub struct SearchEngine {
    registry: Arc<SiteRegistry>,
    config: SearchConfig,
    light: Arc<dyn PageFetcher>,
    browser: Arc<dyn PageFetcher>,
    detector: BotDetector,
    validator: ImageValidator,
    gate: PolitenessGate,
}

impl SearchEngine {
    pub fn new(registry: Arc<SiteRegistry>, config: SearchConfig) -> Self {
        let light = Arc::new(HttpFetcher::new(config.fetch_timeout()));
        let browser = Arc::new(BrowserFetcher::new(BrowserSettings {
            wait_timeout: Duration::from_secs(config.browser_wait_secs),
            patient_load_timeout: Duration::from_secs(config.patient_load_secs),
            ..Default::default()
        }));
        Self::with_fetchers(registry, config, light, browser)
    }

    /// Build the engine around explicit fetch strategies. This is the seam
    /// the integration tests use to stand in for the browser.
    pub fn with_fetchers(
        registry: Arc<SiteRegistry>,
        config: SearchConfig,
        light: Arc<dyn PageFetcher>,
        browser: Arc<dyn PageFetcher>,
    ) -> Self {
        let (min_delay, max_delay) = config.politeness_window();
        let validator = ImageValidator::new(Duration::from_secs(10), config.image_cap_bytes);
        Self {
            registry,
            config,
            light,
            browser,
            detector: BotDetector::new(),
            validator,
            gate: PolitenessGate::new(min_delay, max_delay),
        }
    }

    /// Replace the anti-bot detector (small fixture pages in tests).
    pub fn with_detector(mut self, detector: BotDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Run one search. Always returns a result; the deadline bounds the
    /// whole call and partial completion is reported per site.
    pub async fn search(&self, request: &SearchRequest) -> SearchResults {
        let started = Instant::now();
        let deadline = started + self.config.deadline();
        let terms = Arc::new(QueryTerms::new(&request.query));

        // Over-select to tolerate per-site failure; shuffle for diversity.
        let mut sites: Vec<SiteConfig> = self.registry.sites().to_vec();
        sites.shuffle(&mut rand::rng());
        sites.truncate(request.max_sites.saturating_mul(2).max(request.max_sites));
        let launched: Vec<String> = sites.iter().map(|s| s.id.clone()).collect();
        info!(
            query = %request.query,
            sites = sites.len(),
            "starting listing search"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.pool_size.max(1)));
        let (tx, mut rx) = mpsc::channel::<(String, SiteStatus, Vec<Listing>)>(sites.len().max(1));
        let mut tasks = JoinSet::new();

        for site in sites {
            let job = SiteJob {
                url: site.search_url_for(&request.query),
                site,
                light: Arc::clone(&self.light),
                browser: Arc::clone(&self.browser),
                detector: self.detector.clone(),
                validator: self.validator.clone(),
                gate: self.gate.clone(),
                config: self.config.clone(),
                terms: Arc::clone(&terms),
            };
            let tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let id = job.site.id.clone();
                let (status, listings) = job.run().await;
                let _ = tx.send((id, status, listings)).await;
            });
        }
        drop(tx);

        let augment_future = self.augmented_listings(&request.query, &terms, deadline);
        let harvest_future = harvest(&mut rx, request.max_sites, deadline);
        let (harvested, augmented) = tokio::join!(harvest_future, augment_future);
        tasks.abort_all();

        let Harvested {
            mut site_status,
            mut groups,
            deadline_hit,
        } = harvested;

        // Sites that never reported before the deadline are incomplete, not
        // silently absent.
        if deadline_hit {
            for id in launched {
                site_status.entry(id).or_insert(SiteStatus::Error);
            }
        }

        // Completion order is racy; a fixed group order keeps the final
        // ranking deterministic for identical inputs.
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        let mut ordered: Vec<Vec<Listing>> = groups.into_iter().map(|(_, l)| l).collect();
        ordered.push(augmented);

        let listings = rank::merge(ordered, self.config.dedupe, request.max_results);
        info!(
            listings = listings.len(),
            sites_ok = site_status
                .values()
                .filter(|s| **s == SiteStatus::Success)
                .count(),
            elapsed = ?started.elapsed(),
            "listing search finished"
        );

        SearchResults {
            query: request.query.clone(),
            listings,
            site_status,
            elapsed: started.elapsed(),
        }
    }

    /// Run the optional web-search augmenter under the same deadline.
    async fn augmented_listings(
        &self,
        query: &str,
        terms: &Arc<QueryTerms>,
        deadline: Instant,
    ) -> Vec<Listing> {
        if !self.config.augment {
            return Vec::new();
        }
        let source = match &self.config.web_search_endpoint {
            Some(endpoint) => {
                WebSearchSource::with_endpoint(self.config.fetch_timeout(), endpoint.clone())
            }
            None => WebSearchSource::new(self.config.fetch_timeout()),
        };
        let mut listings = match timeout_at(deadline, source.search(query)).await {
            Ok(listings) => listings,
            Err(_) => Vec::new(),
        };
        for listing in &mut listings {
            listing.relevance = scoring::score(listing, terms);
        }
        listings
    }
}

struct Harvested {
    site_status: HashMap<String, SiteStatus>,
    groups: Vec<(String, Vec<Listing>)>,
    deadline_hit: bool,
}

/// Collect per-site reports until every task finished, enough sites
/// succeeded, or the deadline expired.
async fn harvest(
    rx: &mut mpsc::Receiver<(String, SiteStatus, Vec<Listing>)>,
    max_sites: usize,
    deadline: Instant,
) -> Harvested {
    let mut site_status = HashMap::new();
    let mut groups = Vec::new();
    let mut successes = 0usize;
    let mut deadline_hit = false;

    loop {
        match timeout_at(deadline, rx.recv()).await {
            Ok(Some((id, status, listings))) => {
                if status == SiteStatus::Success {
                    successes += 1;
                }
                debug!(site = %id, ?status, listings = listings.len(), "site finished");
                site_status.insert(id.clone(), status);
                if !listings.is_empty() {
                    groups.push((id, listings));
                }
                if successes >= max_sites {
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => {
                warn!("aggregate deadline reached, returning partial results");
                deadline_hit = true;
                break;
            }
        }
    }

    Harvested {
        site_status,
        groups,
        deadline_hit,
    }
}

/// Everything one site's pipeline needs, owned so it can run as a task.
struct SiteJob {
    site: SiteConfig,
    url: String,
    light: Arc<dyn PageFetcher>,
    browser: Arc<dyn PageFetcher>,
    detector: BotDetector,
    validator: ImageValidator,
    gate: PolitenessGate,
    config: SearchConfig,
    terms: Arc<QueryTerms>,
}

impl SiteJob {
    /// The escalation ladder: up to `max_attempts` plain fetches with
    /// jittered exponential backoff, then exactly one browser attempt.
    async fn run(self) -> (SiteStatus, Vec<Listing>) {
        let mut saw_block = false;

        let http_attempts = match self.site.retry {
            RetryStrategy::BrowserFirst => 0,
            _ => self.config.max_attempts,
        };

        for attempt in 0..http_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry_backoff(attempt - 1)).await;
            }
            match self.attempt(self.light.as_ref(), attempt).await {
                Ok(page) => return self.finish(page).await,
                Err(err) => {
                    saw_block |= err.is_block();
                    if !err.is_retryable() && !err.is_block() {
                        // 404s and friends will not improve with retries.
                        break;
                    }
                }
            }
        }

        if http_attempts > 0 {
            warn!(site = %self.site.id, "escalating to browser fetch");
        }
        match self.attempt(self.browser.as_ref(), 0).await {
            Ok(page) => self.finish(page).await,
            Err(err) => {
                let status = if err.is_block() || saw_block {
                    SiteStatus::Blocked
                } else {
                    SiteStatus::Error
                };
                debug!(site = %self.site.id, %err, ?status, "site failed all strategies");
                (status, Vec::new())
            }
        }
    }

    fn retry_backoff(&self, exponent: u32) -> Duration {
        // Patient sites double the ladder on top of the standard curve.
        let exponent = match self.site.retry {
            RetryStrategy::Patient => exponent + 1,
            _ => exponent,
        };
        let jitter = if self.config.jitter_max_ms > self.config.jitter_min_ms {
            rand::rng().random_range(self.config.jitter_min_ms..=self.config.jitter_max_ms)
        } else {
            self.config.jitter_min_ms
        };
        self.config.backoff(exponent, jitter)
    }

    fn attempt_budget(&self, kind: FetchStrategyKind) -> Duration {
        match kind {
            FetchStrategyKind::Http => self.config.fetch_timeout(),
            // The browser needs room for page load plus the selector wait.
            FetchStrategyKind::Browser => Duration::from_secs(
                self.config.patient_load_secs + self.config.browser_wait_secs,
            ),
        }
    }

    /// One fetch attempt: politeness gate, bounded fetch, classification.
    async fn attempt(
        &self,
        fetcher: &dyn PageFetcher,
        attempt: u32,
    ) -> Result<FetchedPage, FetchError> {
        let domain = self.gate.acquire(&self.url).await;
        let spec = FetchSpec {
            url: self.url.clone(),
            wait_selectors: self.site.selectors.listing.clone(),
            patient: self.site.tier == DifficultyTier::Hard,
        };

        let budget = self.attempt_budget(fetcher.kind());
        let started = Instant::now();
        let result = match timeout_at(started + budget, fetcher.fetch(&spec)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(budget)),
        };

        let result = result.and_then(|page| {
            let verdict = self.detector.classify(&page.html, &self.site.content_markers);
            if verdict.blocked {
                Err(FetchError::Blocked(
                    verdict.reason.unwrap_or_else(|| "unspecified".into()),
                ))
            } else {
                Ok(page)
            }
        });

        let record = FetchAttempt {
            site: self.site.id.clone(),
            strategy: fetcher.kind(),
            attempt,
            outcome: match &result {
                Ok(_) => AttemptOutcome::Success,
                Err(err) if err.is_block() => AttemptOutcome::Blocked,
                Err(_) => AttemptOutcome::Error,
            },
            elapsed: started.elapsed(),
        };
        self.log_attempt(&record, result.as_ref().err());

        if let Some(domain) = domain {
            match &result {
                Ok(_) => self.gate.report_success(&domain).await,
                Err(err) if err.is_block() => self.gate.report_block(&domain).await,
                Err(_) => {}
            }
        }

        result
    }

    fn log_attempt(&self, record: &FetchAttempt, error: Option<&FetchError>) {
        match record.outcome {
            AttemptOutcome::Success => debug!(
                site = %record.site,
                strategy = %record.strategy,
                attempt = record.attempt,
                elapsed = ?record.elapsed,
                "fetch attempt succeeded"
            ),
            _ => warn!(
                site = %record.site,
                strategy = %record.strategy,
                attempt = record.attempt,
                elapsed = ?record.elapsed,
                error = %error.map(ToString::to_string).unwrap_or_default(),
                "fetch attempt failed"
            ),
        }
    }

    /// Parse off the async threads, then score and image-check the batch.
    async fn finish(&self, page: FetchedPage) -> (SiteStatus, Vec<Listing>) {
        let site = self.site.clone();
        let html = page.html;
        let parsed = tokio::task::spawn_blocking(move || parse::parse(&html, &site)).await;

        let mut listings = match parsed {
            Ok(Ok(listings)) => listings,
            Ok(Err(err)) => {
                warn!(site = %self.site.id, %err, "parse failed, zero listings");
                return (SiteStatus::Error, Vec::new());
            }
            Err(err) => {
                warn!(site = %self.site.id, %err, "parse task panicked");
                return (SiteStatus::Error, Vec::new());
            }
        };
        listings.truncate(MAX_LISTINGS_PER_SITE);

        let enriched = futures::future::join_all(
            listings.into_iter().map(|listing| self.enrich(listing)),
        )
        .await;

        (SiteStatus::Success, enriched)
    }

    /// Score relevance and validate the leading images of one listing.
    async fn enrich(&self, mut listing: Listing) -> Listing {
        listing.relevance = scoring::score(&listing, &self.terms);

        let probe_count = listing.images.len().min(self.config.images_per_listing);
        if probe_count > 0 {
            let validated = futures::future::join_all(
                listing.images[..probe_count]
                    .iter()
                    .map(|image| self.validator.validate(&image.url)),
            )
            .await;
            for (slot, info) in listing.images.iter_mut().zip(validated) {
                *slot = info;
            }
        }
        listing.image_score = listing
            .images
            .iter()
            .map(|i| i.score)
            .fold(0.0, f64::max);

        listing
    }
}
