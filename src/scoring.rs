//! Relevance scoring of listings against the search query.
//!
//! Pure and additive: a base score for any minimally valid title, bonuses
//! for query-term and vocabulary matches, a penalty for short or generic
//! titles, all clamped into [0,1].

use crate::models::Listing;
use crate::parse::vocab;

const BASE_SCORE: f64 = 0.25;
const TERM_MATCH_WEIGHT: f64 = 0.40;
const BRAND_BONUS: f64 = 0.10;
const CATEGORY_BONUS: f64 = 0.10;
const PART_NUMBER_BONUS: f64 = 0.05;
const LONG_TITLE_BONUS: f64 = 0.05;
const SHORT_TITLE_PENALTY: f64 = 0.15;

/// Lower-cased query tokens, computed once per search call.
#[derive(Debug, Clone)]
pub struct QueryTerms {
    terms: Vec<String>,
}

impl QueryTerms {
    pub fn new(query: &str) -> Self {
        Self {
            terms: query
                .split_whitespace()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Fraction of query terms present in the text, in [0,1].
    fn match_fraction(&self, lowered_text: &str) -> f64 {
        if self.terms.is_empty() {
            return 0.0;
        }
        let matched = self
            .terms
            .iter()
            .filter(|t| lowered_text.contains(t.as_str()))
            .count();
        matched as f64 / self.terms.len() as f64
    }
}

/// Score one listing against the query. Deterministic; never panics.
pub fn score(listing: &Listing, query: &QueryTerms) -> f64 {
    let title = listing.title.trim();
    if title.is_empty() {
        return 0.0;
    }

    let lowered = title.to_lowercase();
    let words = title.split_whitespace().count();

    let mut value = BASE_SCORE;
    value += TERM_MATCH_WEIGHT * query.match_fraction(&lowered);

    if listing.brand.is_some() || vocab::find_brand_in(title).is_some() {
        value += BRAND_BONUS;
    }
    if vocab::CATEGORY_TERMS.iter().any(|t| lowered.contains(t)) {
        value += CATEGORY_BONUS;
    }
    if listing
        .part_number
        .as_deref()
        .is_some_and(vocab::is_part_number)
    {
        value += PART_NUMBER_BONUS;
    }

    if words >= 4 && title.chars().count() >= 20 {
        value += LONG_TITLE_BONUS;
    } else if words < 3 || title.chars().count() < 15 {
        value -= SHORT_TITLE_PENALTY;
    }

    value.clamp(0.0, 1.0)
}
