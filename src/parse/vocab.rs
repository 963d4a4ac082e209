//! Brand vocabulary and part-number heuristics.

/// Manufacturer names that show up across parts storefronts. Matched
/// case-insensitively against brand fields and titles.
pub const KNOWN_BRANDS: &[&str] = &[
    "ACDelco", "AISIN", "ATE", "Bilstein", "Bosch", "Brembo", "Cardone", "Centric", "Continental",
    "Dayco", "Delphi", "Denso", "Dorman", "Duralast", "EBC", "Febi", "Gates", "Hella", "KYB",
    "Mahle", "Mann", "Monroe", "Moog", "Mopar", "Motorcraft", "NGK", "NTK", "Pierburg", "Power Stop",
    "Raybestos", "Sachs", "SKF", "StopTech", "Timken", "TRW", "Valeo", "Wagner", "Wix", "Zimmermann",
];

/// Category terms used for relevance scoring.
pub const CATEGORY_TERMS: &[&str] = &[
    "alternator", "assembly", "axle", "bearing", "belt", "brake", "bulb", "caliper", "clutch",
    "compressor", "filter", "gasket", "genuine", "hose", "injector", "kit", "oem", "pad", "plug",
    "pump", "radiator", "rotor", "sensor", "shock", "spark", "strut", "thermostat", "valve",
];

/// Match a dedicated brand field against the vocabulary.
pub fn match_brand(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    KNOWN_BRANDS
        .iter()
        .find(|b| lowered == b.to_lowercase() || lowered.contains(&b.to_lowercase()))
        .map(|b| (*b).to_string())
}

/// Scan free text (usually the title) for a known brand.
pub fn find_brand_in(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    KNOWN_BRANDS
        .iter()
        .find(|b| lowered.contains(&b.to_lowercase()))
        .map(|b| (*b).to_string())
}

/// Whether a token looks like a manufacturer part number: alphanumeric with
/// optional dashes, 5-20 chars, mixing digits with letters or dash groups.
pub fn is_part_number(token: &str) -> bool {
    let len = token.chars().count();
    if !(5..=20).contains(&len) {
        return false;
    }
    if !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return false;
    }
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let has_alpha = token.chars().any(|c| c.is_ascii_alphabetic());
    let has_dash = token.contains('-');
    if !has_digit {
        return false;
    }
    // All-digit tokens are usually quantities or zip codes unless long and
    // dash-grouped.
    has_alpha || (has_dash && len >= 7)
}

/// Pull the first part-number-like token out of free text.
pub fn find_part_number(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-'))
        .find(|t| is_part_number(t))
        .map(|t| t.to_uppercase())
}
