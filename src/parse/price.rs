//! Price extraction from listing text.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Price;

/// Currency marker before the amount ("$249.99", "USD 1,299.00").
fn leading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\$|€|£|USD|EUR|GBP|CAD)\s*([0-9][0-9.,]*)").expect("leading price regex")
    })
}

/// Currency marker after the amount ("29,99 €", "19 GBP").
fn trailing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)([0-9][0-9.,]*)\s*(\$|€|£|USD|EUR|GBP|CAD)").expect("trailing price regex")
    })
}

fn canonical_currency(marker: &str) -> String {
    match marker {
        "$" => "USD".to_string(),
        "€" => "EUR".to_string(),
        "£" => "GBP".to_string(),
        other => other.to_uppercase(),
    }
}

/// Parse an amount that may use either '.' or ',' as decimal separator and
/// the other as a thousands separator.
fn parse_amount(raw: &str) -> Option<f64> {
    let raw = raw.trim_matches(|c| c == '.' || c == ',');
    if raw.is_empty() {
        return None;
    }

    let dots = raw.matches('.').count();
    let commas = raw.matches(',').count();

    let normalized = match (dots, commas) {
        (0, 0) => raw.to_string(),
        // Both present: the last separator is the decimal point.
        (_, _) if dots > 0 && commas > 0 => {
            if raw.rfind('.') > raw.rfind(',') {
                raw.replace(',', "")
            } else {
                raw.replace('.', "").replace(',', ".")
            }
        }
        // Single separator kind: decimal if it splits off exactly two
        // digits, thousands grouping otherwise.
        _ => {
            let sep = if dots > 0 { '.' } else { ',' };
            let tail_len = raw.len() - raw.rfind(sep).unwrap_or(0) - 1;
            let single = dots + commas == 1;
            if single && (tail_len == 2 || tail_len == 1) {
                raw.replace(',', ".")
            } else {
                raw.replace(sep, "")
            }
        }
    };

    normalized.parse::<f64>().ok().filter(|v| *v > 0.0)
}

/// Extract the first plausible price from free text.
pub fn extract(text: &str) -> Option<Price> {
    if let Some(caps) = leading_re().captures(text) {
        if let Some(amount) = parse_amount(&caps[2]) {
            return Some(Price {
                amount,
                currency: canonical_currency(&caps[1]),
            });
        }
    }

    if let Some(caps) = trailing_re().captures(text) {
        if let Some(amount) = parse_amount(&caps[1]) {
            return Some(Price {
                amount,
                currency: canonical_currency(&caps[2]),
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(text: &str) -> Option<(f64, String)> {
        extract(text).map(|p| (p.amount, p.currency))
    }

    #[test]
    fn plain_dollar_prices() {
        assert_eq!(price("$249.99"), Some((249.99, "USD".into())));
        assert_eq!(price("Now only $ 12.49!"), Some((12.49, "USD".into())));
        assert_eq!(price("USD 1,299.00"), Some((1299.00, "USD".into())));
    }

    #[test]
    fn european_formats() {
        assert_eq!(price("1.299,00 €"), Some((1299.00, "EUR".into())));
        assert_eq!(price("29,99 €"), Some((29.99, "EUR".into())));
        assert_eq!(price("£19"), Some((19.0, "GBP".into())));
    }

    #[test]
    fn ranges_take_the_first_value() {
        assert_eq!(price("From $12.49 to $89.99"), Some((12.49, "USD".into())));
    }

    #[test]
    fn thousands_grouping_without_decimals() {
        assert_eq!(price("$1,299"), Some((1299.0, "USD".into())));
    }

    #[test]
    fn no_price_in_text() {
        assert_eq!(price("Call for availability"), None);
        assert_eq!(price(""), None);
        assert_eq!(price("$0.00"), None);
    }
}
