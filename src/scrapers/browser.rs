//! Browser-based fetcher for anti-bot protected sites.
//!
//! Drives chromiumoxide (CDP) with stealth-oriented launch flags. The
//! browser session is an exclusively-owned resource: exactly one fetch
//! checks it out at a time, cookies and web storage are cleared between
//! fetches, and a dead CDP connection is rebuilt in place instead of
//! failing the process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Generic content selectors tried after the site's own wait chain.
#[cfg(feature = "browser")]
const FALLBACK_WAIT_SELECTORS: &[&str] = &[
    "main",
    "#content",
    "[class*='result']",
    "[class*='product']",
    "[id*='search']",
];

/// Launch and wait budgets for the browser strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run without a visible window (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Budget for the content-selector wait loop.
    #[serde(default = "default_wait")]
    pub wait_timeout: Duration,

    /// Page-load budget for ordinary sites.
    #[serde(default = "default_load")]
    pub load_timeout: Duration,

    /// Page-load budget for known-hard sites.
    #[serde(default = "default_patient_load")]
    pub patient_load_timeout: Duration,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

fn default_headless() -> bool {
    true
}
fn default_wait() -> Duration {
    Duration::from_secs(12)
}
fn default_load() -> Duration {
    Duration::from_secs(30)
}
fn default_patient_load() -> Duration {
    Duration::from_secs(45)
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            wait_timeout: default_wait(),
            load_timeout: default_load(),
            patient_load_timeout: default_patient_load(),
            chrome_args: Vec::new(),
        }
    }
}

#[cfg(feature = "browser")]
pub use enabled::BrowserFetcher;

#[cfg(feature = "browser")]
mod enabled {
    use std::time::Instant;

    use async_trait::async_trait;
    use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
    use chromiumoxide::page::Page;
    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use super::*;
    use crate::error::FetchError;
    use crate::models::FetchStrategyKind;
    use crate::scrapers::{FetchSpec, FetchedPage, PageFetcher};

    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    struct BrowserSession {
        browser: Browser,
        handler: JoinHandle<()>,
    }

    impl BrowserSession {
        fn teardown(self) {
            self.handler.abort();
            drop(self.browser);
        }
    }

    /// Browser strategy. One session, checked out per fetch.
    pub struct BrowserFetcher {
        settings: BrowserSettings,
        session: Mutex<Option<BrowserSession>>,
    }

    impl BrowserFetcher {
        pub fn new(settings: BrowserSettings) -> Self {
            Self {
                settings,
                session: Mutex::new(None),
            }
        }

        fn find_chrome() -> Result<std::path::PathBuf, FetchError> {
            for path in CHROME_PATHS {
                let p = std::path::Path::new(path);
                if p.exists() {
                    return Ok(p.to_path_buf());
                }
            }

            for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
                if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                    if output.status.success() {
                        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                        if !path.is_empty() {
                            return Ok(std::path::PathBuf::from(path));
                        }
                    }
                }
            }

            Err(FetchError::Browser(
                "Chrome/Chromium executable not found".to_string(),
            ))
        }

        async fn launch(&self) -> Result<BrowserSession, FetchError> {
            let chrome_path = Self::find_chrome()?;
            info!(headless = self.settings.headless, "launching browser");

            let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
            if !self.settings.headless {
                builder = builder.with_head();
            }

            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-infobars")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--disable-background-networking")
                .arg("--disable-sync")
                .arg("--metrics-recording-only")
                .arg("--no-sandbox")
                .arg("--disable-gpu")
                .arg("--disable-software-rasterizer");

            for arg in &self.settings.chrome_args {
                builder = builder.arg(arg);
            }

            let config = builder
                .build()
                .map_err(|e| FetchError::Browser(format!("browser config: {e}")))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| FetchError::Browser(format!("launch failed: {e}")))?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            Ok(BrowserSession { browser, handler })
        }

        /// Poll the wait chain until something matches or the budget runs
        /// out. A miss is not fatal: the page is captured anyway and the
        /// anti-bot classifier gets the final word.
        async fn wait_for_content(&self, page: &Page, wait_selectors: &[String]) {
            let deadline = Instant::now() + self.settings.wait_timeout;
            let poll = Duration::from_millis(250);

            loop {
                for sel in wait_selectors
                    .iter()
                    .map(String::as_str)
                    .chain(FALLBACK_WAIT_SELECTORS.iter().copied())
                {
                    if page.find_element(sel).await.is_ok() {
                        debug!(selector = sel, "content selector matched");
                        return;
                    }
                }

                if Instant::now() >= deadline {
                    warn!("no content selector matched within wait budget");
                    return;
                }
                tokio::time::sleep(poll).await;
            }
        }

        async fn fetch_on_session(
            &self,
            session: &BrowserSession,
            spec: &FetchSpec,
        ) -> Result<FetchedPage, FetchError> {
            let load_budget = if spec.patient {
                self.settings.patient_load_timeout
            } else {
                self.settings.load_timeout
            };
            let start = Instant::now();

            let page = session
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| FetchError::Browser(format!("new page: {e}")))?;

            // Fresh identity per fetch: cookies first (works from any page),
            // web storage after navigation since it is origin-scoped.
            let _ = page.execute(ClearBrowserCookiesParams::default()).await;

            let navigate = async {
                page.goto(spec.url.as_str())
                    .await
                    .map_err(|e| FetchError::Browser(format!("goto: {e}")))?;
                page.wait_for_navigation()
                    .await
                    .map_err(|e| FetchError::Browser(format!("navigation: {e}")))?;
                Ok::<(), FetchError>(())
            };
            tokio::time::timeout(load_budget, navigate)
                .await
                .map_err(|_| FetchError::Timeout(load_budget))??;

            self.wait_for_content(&page, &spec.wait_selectors).await;

            let html = page
                .content()
                .await
                .map_err(|e| FetchError::Browser(format!("content: {e}")))?;
            let final_url = page
                .url()
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| spec.url.clone());

            let _ = page
                .evaluate("localStorage.clear(); sessionStorage.clear();")
                .await;
            let _ = page.close().await;

            Ok(FetchedPage {
                url: spec.url.clone(),
                final_url,
                // CDP does not surface the document status cheaply; a page
                // that rendered counts as delivered and the classifier
                // judges the content.
                status: 200,
                html,
                elapsed: start.elapsed(),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for BrowserFetcher {
        async fn fetch(&self, spec: &FetchSpec) -> Result<FetchedPage, FetchError> {
            // Scoped checkout: the guard spans the whole fetch, so one
            // in-flight fetch owns the session at a time and release is
            // guaranteed on every exit path.
            let mut guard = self.session.lock().await;

            if guard.is_none() {
                *guard = Some(self.launch().await?);
            }

            let session = guard.as_ref().expect("session populated above");
            match self.fetch_on_session(session, spec).await {
                Ok(page) => Ok(page),
                Err(FetchError::Browser(reason)) => {
                    // CDP trouble usually means the session died underneath
                    // us. Rebuild once and retry on the fresh session.
                    warn!(%reason, "browser session lost, reinitializing");
                    if let Some(dead) = guard.take() {
                        dead.teardown();
                    }
                    *guard = Some(self.launch().await?);
                    let session = guard.as_ref().expect("session relaunched above");
                    self.fetch_on_session(session, spec).await
                }
                Err(other) => Err(other),
            }
        }

        fn kind(&self) -> FetchStrategyKind {
            FetchStrategyKind::Browser
        }
    }
}

#[cfg(not(feature = "browser"))]
pub use disabled::BrowserFetcher;

#[cfg(not(feature = "browser"))]
mod disabled {
    use async_trait::async_trait;

    use super::BrowserSettings;
    use crate::error::FetchError;
    use crate::models::FetchStrategyKind;
    use crate::scrapers::{FetchSpec, FetchedPage, PageFetcher};

    /// Stub for builds without the `browser` feature.
    pub struct BrowserFetcher;

    impl BrowserFetcher {
        pub fn new(_settings: BrowserSettings) -> Self {
            Self
        }
    }

    #[async_trait]
    impl PageFetcher for BrowserFetcher {
        async fn fetch(&self, _spec: &FetchSpec) -> Result<FetchedPage, FetchError> {
            Err(FetchError::Browser(
                "browser support not compiled; rebuild with --features browser".to_string(),
            ))
        }

        fn kind(&self) -> FetchStrategyKind {
            FetchStrategyKind::Browser
        }
    }
}
