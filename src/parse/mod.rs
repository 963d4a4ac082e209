//! Selector-driven extraction of listings from result pages.
//!
//! All per-site knowledge comes in through [`SiteConfig`]; extraction walks
//! each field's selector chain in priority order and the first selector
//! that yields content wins. Identical HTML plus identical config always
//! produces the identical listing list.

pub mod price;
pub mod vocab;

use scraper::{ElementRef, Html, Selector};
use tracing::trace;
use url::Url;

use crate::error::ParseError;
use crate::models::{ImageInfo, Listing};
use crate::registry::SiteConfig;

/// Titles shorter than this are site chrome, not listings.
const MIN_TITLE_LEN: usize = 10;

/// Boilerplate strings that show up as pseudo-listings (ads, navigation).
const BOILERPLATE_TITLES: &[&str] = &[
    "see more",
    "shop now",
    "learn more",
    "view details",
    "view all",
    "sponsored",
    "advertisement",
    "sign in",
    "more like this",
    "shop by category",
];

/// Whether a title string is a real listing title rather than chrome.
pub fn title_is_listing(title: &str) -> bool {
    let trimmed = title.trim();
    if trimmed.chars().count() < MIN_TITLE_LEN {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    !BOILERPLATE_TITLES.iter().any(|b| lowered.starts_with(b) || lowered == *b)
}

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::Selector {
        selector: selector.to_string(),
        message: format!("{e:?}"),
    })
}

/// First non-empty text produced by a selector chain, in priority order.
fn first_text(element: ElementRef<'_>, chain: &[String]) -> Option<String> {
    for selector in chain {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        for found in element.select(&sel) {
            let text = found.text().collect::<String>();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// First non-empty attribute produced by a selector chain. Falls back to the
/// container element itself when it carries the attribute (eBay-style
/// anchor containers).
fn first_attr(element: ElementRef<'_>, chain: &[String], attrs: &[&str]) -> Option<String> {
    for selector in chain {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        for found in element.select(&sel) {
            for attr in attrs {
                if let Some(value) = found.value().attr(attr) {
                    if !value.trim().is_empty() {
                        return Some(value.trim().to_string());
                    }
                }
            }
        }
    }
    for attr in attrs {
        if let Some(value) = element.value().attr(attr) {
            if !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

/// Resolve a possibly-relative link against the site base.
fn absolutize(base_url: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    Url::parse(base_url)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

fn extract_listing(element: ElementRef<'_>, site: &SiteConfig) -> Option<Listing> {
    let title = first_text(element, &site.selectors.title)?;
    if !title_is_listing(&title) {
        trace!(site = %site.id, %title, "dropping boilerplate title");
        return None;
    }

    let href = first_attr(element, &site.selectors.link, &["href"])?;
    let link = absolutize(&site.base_url, &href)?;

    let mut listing = Listing::new(title.clone(), link, site.id.clone());

    listing.price = first_text(element, &site.selectors.price)
        .as_deref()
        .and_then(price::extract);

    listing.images = collect_images(element, site);

    listing.brand = first_text(element, &site.selectors.brand)
        .as_deref()
        .and_then(vocab::match_brand)
        .or_else(|| vocab::find_brand_in(&title));

    listing.part_number = first_text(element, &site.selectors.part_number)
        .as_deref()
        .and_then(vocab::find_part_number)
        .or_else(|| vocab::find_part_number(&title));

    listing.condition = first_text(element, &site.selectors.condition);
    listing.shipping = first_text(element, &site.selectors.shipping);

    Some(listing)
}

/// Every distinct image URL the chain yields, in document order. Lazy-load
/// attributes are consulted before `src`.
fn collect_images(element: ElementRef<'_>, site: &SiteConfig) -> Vec<ImageInfo> {
    let mut images = Vec::new();
    for selector in &site.selectors.image {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        for found in element.select(&sel) {
            let src = ["data-src", "data-lazy-src", "src"]
                .iter()
                .find_map(|a| found.value().attr(a))
                .map(str::trim)
                .filter(|s| !s.is_empty());
            if let Some(src) = src {
                if let Some(url) = absolutize(&site.base_url, src) {
                    if !images.iter().any(|i: &ImageInfo| i.url == url) {
                        images.push(ImageInfo::unchecked(url));
                    }
                }
            }
        }
        if !images.is_empty() {
            break;
        }
    }
    images
}

/// Parse one result page into unscored listings.
///
/// Deterministic: listings come back in document order, and repeated calls
/// with the same inputs produce the same output. A selector chain that
/// fails to compile is a [`ParseError`]; an empty page is simply an empty
/// vector.
pub fn parse(html: &str, site: &SiteConfig) -> Result<Vec<Listing>, ParseError> {
    let document = Html::parse_document(html);
    let mut listings = Vec::new();

    for container_selector in &site.selectors.listing {
        let sel = compile(container_selector)?;
        let containers: Vec<_> = document.select(&sel).collect();
        if containers.is_empty() {
            continue;
        }
        for container in containers {
            if let Some(listing) = extract_listing(container, site) {
                listings.push(listing);
            }
        }
        // First matching chain wins; later chains are older markup shapes.
        break;
    }

    Ok(listings)
}
