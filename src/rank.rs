//! Merging, deduplication, and final ranking of listings.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::DedupePolicy;
use crate::models::Listing;

fn dedup_key(listing: &Listing, policy: DedupePolicy) -> String {
    match policy {
        DedupePolicy::Title => listing.normalized_title(),
        DedupePolicy::TitlePerSite => {
            format!("{}\u{1f}{}", listing.normalized_title(), listing.site)
        }
    }
}

/// Sort key ordering: relevance desc, then has-price desc, then has-image
/// desc. Ties keep their pre-sort (first-seen) order - the sort is stable.
fn compare(a: &Listing, b: &Listing) -> Ordering {
    b.relevance
        .total_cmp(&a.relevance)
        .then_with(|| b.has_price().cmp(&a.has_price()))
        .then_with(|| b.has_image().cmp(&a.has_image()))
}

/// Merge listing groups (per-site batches first, augmented last), dedup by
/// the configured key keeping the higher-relevance copy in its first-seen
/// position, rank, and truncate.
pub fn merge(
    groups: Vec<Vec<Listing>>,
    policy: DedupePolicy,
    max_results: usize,
) -> Vec<Listing> {
    let mut merged: Vec<Listing> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for listing in groups.into_iter().flatten() {
        let key = dedup_key(&listing, policy);
        match index.get(&key) {
            Some(&at) => {
                if listing.relevance > merged[at].relevance {
                    merged[at] = listing;
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(listing);
            }
        }
    }

    merged.sort_by(compare);
    merged.truncate(max_results);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageInfo, Price};

    fn listing(title: &str, site: &str, relevance: f64) -> Listing {
        let mut l = Listing::new(title, format!("https://{site}.test/x"), site);
        l.relevance = relevance;
        l
    }

    fn priced(mut l: Listing, amount: f64) -> Listing {
        l.price = Some(Price {
            amount,
            currency: "USD".into(),
        });
        l
    }

    fn imaged(mut l: Listing) -> Listing {
        l.images.push(ImageInfo {
            is_valid: true,
            score: 0.8,
            ..ImageInfo::unchecked("https://img.test/1.jpg")
        });
        l
    }

    #[test]
    fn identical_titles_collapse_to_higher_relevance() {
        let a = listing("Front Brake  Pad Set", "ebay", 0.5);
        let b = listing("front brake pad set", "rockauto", 0.8);
        let merged = merge(vec![vec![a], vec![b]], DedupePolicy::Title, 20);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].site, "rockauto");
        assert_eq!(merged[0].relevance, 0.8);
    }

    #[test]
    fn per_site_policy_keeps_both_suppliers() {
        let a = listing("Front brake pad set", "ebay", 0.5);
        let b = listing("Front brake pad set", "rockauto", 0.8);
        let merged = merge(vec![vec![a], vec![b]], DedupePolicy::TitlePerSite, 20);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn no_listing_ranks_below_a_strictly_better_one() {
        let groups = vec![vec![
            listing("plain low relevance title here", "a", 0.2),
            imaged(priced(listing("rich high relevance title here", "b", 0.9), 10.0)),
            priced(listing("priced mid relevance title here", "c", 0.9), 5.0),
            listing("bare mid relevance title here", "d", 0.9),
        ]];
        let merged = merge(groups, DedupePolicy::Title, 20);

        for (i, a) in merged.iter().enumerate() {
            for b in &merged[i + 1..] {
                let strictly_better = b.relevance > a.relevance
                    && b.has_price() > a.has_price()
                    && b.has_image() > a.has_image();
                assert!(!strictly_better, "{} ranked below {}", b.title, a.title);
            }
        }
        assert_eq!(merged[0].site, "b");
        assert_eq!(merged[1].site, "c");
        assert_eq!(merged[2].site, "d");
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let merged = merge(
            vec![vec![
                listing("first equal listing title", "a", 0.5),
                listing("second equal listing title", "b", 0.5),
                listing("third equal listing title", "c", 0.5),
            ]],
            DedupePolicy::Title,
            20,
        );
        let sites: Vec<_> = merged.iter().map(|l| l.site.as_str()).collect();
        assert_eq!(sites, ["a", "b", "c"]);
    }

    #[test]
    fn results_are_truncated() {
        let groups = vec![(0..50)
            .map(|i| listing(&format!("unique listing number {i}"), "a", 0.5))
            .collect::<Vec<_>>()];
        let merged = merge(groups, DedupePolicy::Title, 20);
        assert_eq!(merged.len(), 20);
    }
}
