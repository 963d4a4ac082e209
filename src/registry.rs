//! Declarative per-site scraping configuration.
//!
//! Every behavioral difference between sites lives in data here - URL
//! templates, selector fallback chains, difficulty tier, retry strategy.
//! The engine never branches on a site id.

use serde::{Deserialize, Serialize};

/// How hostile a site is to automated fetching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    /// Plain HTTP usually works.
    #[default]
    Easy,
    /// Heavy bot countermeasures; browser rendering often required and page
    /// loads get the patient timeout.
    Hard,
}

/// Per-site retry behavior tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Full HTTP attempt ladder, then one browser escalation.
    #[default]
    Standard,
    /// Same ladder with doubled backoff between attempts.
    Patient,
    /// Skip plain HTTP entirely; the site only ever renders via browser.
    BrowserFirst,
}

/// Ordered CSS selector fallback chains, one per extracted field. Evaluated
/// in priority order; the first selector that yields content wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorRules {
    /// Repeated container, one match per listing.
    pub listing: Vec<String>,
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub price: Vec<String>,
    #[serde(default)]
    pub link: Vec<String>,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub brand: Vec<String>,
    #[serde(default)]
    pub condition: Vec<String>,
    #[serde(default)]
    pub part_number: Vec<String>,
    #[serde(default)]
    pub shipping: Vec<String>,
}

/// Static configuration for one listing site. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Stable id used in status maps and logs.
    pub id: String,
    pub name: String,
    /// Base used to absolutize relative listing/image links.
    pub base_url: String,
    /// Search URL template with a `{query}` placeholder.
    pub search_url: String,
    #[serde(default)]
    pub tier: DifficultyTier,
    #[serde(default)]
    pub retry: RetryStrategy,
    pub selectors: SelectorRules,
    /// Substrings expected somewhere in real result markup. Their absence
    /// on a nominally successful fetch reads as a block page.
    #[serde(default)]
    pub content_markers: Vec<String>,
}

impl SiteConfig {
    /// Fill the search template for a query, percent-encoding it.
    pub fn search_url_for(&self, query: &str) -> String {
        self.search_url
            .replace("{query}", &urlencoding::encode(query))
    }
}

/// Read-only collection of site configs, loaded at process start.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: Vec<SiteConfig>,
}

impl SiteRegistry {
    /// Registry holding the builtin site set.
    pub fn builtin() -> Self {
        Self {
            sites: builtin_sites(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn sites(&self) -> &[SiteConfig] {
        &self.sites
    }

    pub fn get(&self, id: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Add a site, replacing any existing config with the same id.
    pub fn insert(&mut self, site: SiteConfig) {
        self.sites.retain(|s| s.id != site.id);
        self.sites.push(site);
    }

    /// Extend the registry from a JSON array of site configs.
    pub fn extend_from_json(&mut self, json: &str) -> Result<usize, serde_json::Error> {
        let sites: Vec<SiteConfig> = serde_json::from_str(json)?;
        let count = sites.len();
        for site in sites {
            self.insert(site);
        }
        Ok(count)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Builtin parts-supplier sites. Selector chains start with the current
/// markup and fall back to older or more generic shapes.
fn builtin_sites() -> Vec<SiteConfig> {
    vec![
        SiteConfig {
            id: "ebay".into(),
            name: "eBay".into(),
            base_url: "https://www.ebay.com".into(),
            search_url: "https://www.ebay.com/sch/i.html?_nkw={query}".into(),
            tier: DifficultyTier::Easy,
            retry: RetryStrategy::Standard,
            selectors: SelectorRules {
                listing: strings(&["li.s-item", "div.s-item__wrapper", "li.sresult"]),
                title: strings(&["div.s-item__title span", "div.s-item__title", "h3.lvtitle"]),
                price: strings(&["span.s-item__price", "li.lvprice span"]),
                link: strings(&["a.s-item__link", "h3.lvtitle a"]),
                image: strings(&["div.s-item__image-wrapper img", "img.s-item__image-img", "img.img"]),
                brand: vec![],
                condition: strings(&["span.SECONDARY_INFO", "div.s-item__subtitle"]),
                part_number: vec![],
                shipping: strings(&["span.s-item__shipping", "span.s-item__logisticsCost"]),
            },
            content_markers: strings(&["s-item", "srp-results"]),
        },
        SiteConfig {
            id: "rockauto".into(),
            name: "RockAuto".into(),
            base_url: "https://www.rockauto.com".into(),
            search_url: "https://www.rockauto.com/en/partsearch/?partnum={query}".into(),
            tier: DifficultyTier::Easy,
            retry: RetryStrategy::Patient,
            selectors: SelectorRules {
                listing: strings(&["tbody.listing-inner", "tr.listing-row"]),
                title: strings(&["span.listing-final-partnumber", "td.listing-text-row span"]),
                price: strings(&["span.listing-price", "td.listing-price-cell"]),
                link: strings(&["a.listing-final-partnumber", "a.ra-btn-moreinfo"]),
                image: strings(&["img.listing-inline-image", "td.listing-image-cell img"]),
                brand: strings(&["span.listing-final-manufacturer"]),
                condition: vec![],
                part_number: strings(&["span.listing-final-partnumber"]),
                shipping: vec![],
            },
            content_markers: strings(&["listing-inner", "partsearch"]),
        },
        SiteConfig {
            id: "autozone".into(),
            name: "AutoZone".into(),
            base_url: "https://www.autozone.com".into(),
            search_url: "https://www.autozone.com/searchresult?searchText={query}".into(),
            tier: DifficultyTier::Hard,
            retry: RetryStrategy::BrowserFirst,
            selectors: SelectorRules {
                listing: strings(&[
                    "div[data-testid='product-card']",
                    "div.product-card",
                    "li.product-grid-item",
                ]),
                title: strings(&[
                    "div[data-testid='product-title']",
                    "a.product-title",
                    "h2.product-name",
                ]),
                price: strings(&[
                    "div[data-testid='product-price']",
                    "span.price-main",
                    "div.price",
                ]),
                link: strings(&["a[data-testid='product-link']", "a.product-title", "a"]),
                image: strings(&["img[data-testid='product-image']", "img.product-image", "img"]),
                brand: strings(&["span[data-testid='product-brand']", "span.brand-name"]),
                condition: vec![],
                part_number: strings(&["span[data-testid='part-number']", "span.part-number"]),
                shipping: strings(&["div[data-testid='fulfillment']", "span.shipping-label"]),
            },
            content_markers: strings(&["product-card", "searchresult"]),
        },
        SiteConfig {
            id: "oreilly".into(),
            name: "O'Reilly Auto Parts".into(),
            base_url: "https://www.oreillyauto.com".into(),
            search_url: "https://www.oreillyauto.com/search?q={query}".into(),
            tier: DifficultyTier::Hard,
            retry: RetryStrategy::Standard,
            selectors: SelectorRules {
                listing: strings(&["article.product", "div.product-item", "li.product-listing"]),
                title: strings(&["h2.product__title", "a.product-title-link", "h3"]),
                price: strings(&["span.pricing_price", "div.product-pricing span.price"]),
                link: strings(&["a.product__link", "a.product-title-link", "a"]),
                image: strings(&["img.product__image", "div.product-image img", "img"]),
                brand: strings(&["span.product__brand", "div.brand"]),
                condition: vec![],
                part_number: strings(&["span.product__line-number", "span.part-no"]),
                shipping: strings(&["div.availability", "span.pickup-label"]),
            },
            content_markers: strings(&["product", "search-results"]),
        },
        SiteConfig {
            id: "advance-auto".into(),
            name: "Advance Auto Parts".into(),
            base_url: "https://shop.advanceautoparts.com".into(),
            search_url: "https://shop.advanceautoparts.com/web/SearchResults?searchTerm={query}"
                .into(),
            tier: DifficultyTier::Hard,
            retry: RetryStrategy::Patient,
            selectors: SelectorRules {
                listing: strings(&[
                    "div[data-qa='search-result-card']",
                    "div.search-result-item",
                    "li.product-tile",
                ]),
                title: strings(&["h3[data-qa='product-title']", "a.product-name", "h3"]),
                price: strings(&["div[data-qa='price']", "span.instant-price", "div.price"]),
                link: strings(&["a[data-qa='product-link']", "a.product-name", "a"]),
                image: strings(&["img[data-qa='product-image']", "img.product-img", "img"]),
                brand: strings(&["span[data-qa='brand']", "span.product-brand"]),
                condition: vec![],
                part_number: strings(&["span[data-qa='part-number']"]),
                shipping: strings(&["div[data-qa='fulfillment-options']"]),
            },
            content_markers: strings(&["search-result", "product"]),
        },
        SiteConfig {
            id: "partsgeek".into(),
            name: "PartsGeek".into(),
            base_url: "https://www.partsgeek.com".into(),
            search_url: "https://www.partsgeek.com/catalog/?find={query}".into(),
            tier: DifficultyTier::Easy,
            retry: RetryStrategy::Standard,
            selectors: SelectorRules {
                listing: strings(&["div.catalog-listing", "div.resultrow", "tr.partrow"]),
                title: strings(&["div.catalog-title a", "span.parttitle", "b"]),
                price: strings(&["span.catalog-price", "span.partprice", "span.price"]),
                link: strings(&["div.catalog-title a", "a.partlink", "a"]),
                image: strings(&["img.catalog-image", "img.partimg", "img"]),
                brand: strings(&["span.catalog-brand", "span.mfr"]),
                condition: strings(&["span.catalog-condition"]),
                part_number: strings(&["span.catalog-sku", "span.partno"]),
                shipping: strings(&["span.catalog-shipping"]),
            },
            content_markers: strings(&["catalog", "resultrow"]),
        },
        SiteConfig {
            id: "summit-racing".into(),
            name: "Summit Racing".into(),
            base_url: "https://www.summitracing.com".into(),
            search_url: "https://www.summitracing.com/search/?SearchTerm={query}".into(),
            tier: DifficultyTier::Easy,
            retry: RetryStrategy::Standard,
            selectors: SelectorRules {
                listing: strings(&["div.search-result-item", "article.product-summary", "li.item"]),
                title: strings(&["a.product-link span", "h2.product-title", "a.item-title"]),
                price: strings(&["span.price-current", "div.pricing span.price"]),
                link: strings(&["a.product-link", "a.item-title", "a"]),
                image: strings(&["img.product-photo", "img.item-photo", "img"]),
                brand: strings(&["span.product-brand", "span.mfr-name"]),
                condition: vec![],
                part_number: strings(&["span.part-number", "span.item-partnum"]),
                shipping: strings(&["span.shipping-estimate"]),
            },
            content_markers: strings(&["search-result", "product"]),
        },
    ]
}
