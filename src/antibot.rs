//! Heuristic detection of block and challenge pages.
//!
//! A "successful" fetch from a bot-hostile site frequently returns a
//! challenge interstitial with HTTP 200. The detector reads the body the way
//! the rest of the pipeline would and decides whether parsing it is worth
//! anything, and whether the fetch strategy should escalate.

/// Phrases that only ever appear on block/captcha/verification pages.
const BLOCK_PHRASES: &[&str] = &[
    "verify you are human",
    "verify that you are human",
    "are you a robot",
    "i am not a robot",
    "complete the captcha",
    "solve the captcha",
    "access denied",
    "access to this page has been denied",
    "request blocked",
    "you have been blocked",
    "just a moment...",
    "attention required",
    "pardon our interruption",
    "unusual traffic from your computer network",
    "enable javascript and cookies to continue",
    "checking your browser before accessing",
    "ddos protection by",
    "security check to access",
];

/// Bodies smaller than this cannot plausibly be a rendered result page.
const DEFAULT_MIN_BODY_LEN: usize = 2_048;

/// Verdict for one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotVerdict {
    pub blocked: bool,
    /// Which heuristic fired, for logs and escalation decisions.
    pub reason: Option<String>,
}

impl BotVerdict {
    fn clean() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    fn blocked(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
        }
    }
}

/// Classifies fetched pages as blocked/unblocked.
#[derive(Debug, Clone)]
pub struct BotDetector {
    min_body_len: usize,
}

impl BotDetector {
    pub fn new() -> Self {
        Self {
            min_body_len: DEFAULT_MIN_BODY_LEN,
        }
    }

    /// Lower the body-length floor (API responses, test fixtures).
    pub fn with_min_body_len(mut self, min_body_len: usize) -> Self {
        self.min_body_len = min_body_len;
        self
    }

    /// Classify a page body. `markers` are site-specific substrings expected
    /// in real result markup; pass an empty slice to skip that heuristic.
    pub fn classify(&self, html: &str, markers: &[String]) -> BotVerdict {
        if html.len() < self.min_body_len {
            return BotVerdict::blocked(format!(
                "body too short ({} < {} bytes)",
                html.len(),
                self.min_body_len
            ));
        }

        let lowered = html.to_lowercase();
        for phrase in BLOCK_PHRASES {
            if lowered.contains(phrase) {
                return BotVerdict::blocked(format!("challenge phrase: \"{phrase}\""));
            }
        }

        if !markers.is_empty() {
            let any_marker = markers
                .iter()
                .any(|m| !m.is_empty() && lowered.contains(&m.to_lowercase()));
            if !any_marker {
                return BotVerdict::blocked("expected content markers missing");
            }
        }

        BotVerdict::clean()
    }
}

impl Default for BotDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(body: &str) -> String {
        // Real pages carry kilobytes of chrome; pad fixtures past the floor.
        format!("{body}{}", " ".repeat(4_096))
    }

    #[test]
    fn short_body_is_blocked() {
        let detector = BotDetector::new();
        let verdict = detector.classify("<html></html>", &[]);
        assert!(verdict.blocked);
        assert!(verdict.reason.unwrap().contains("too short"));
    }

    #[test]
    fn challenge_phrases_are_blocked() {
        let detector = BotDetector::new();
        let html = padded("<html><body><h1>Access Denied</h1><p>Verify you are human.</p></body></html>");
        let verdict = detector.classify(&html, &[]);
        assert!(verdict.blocked);
        assert!(verdict.reason.unwrap().contains("challenge phrase"));
    }

    #[test]
    fn missing_markers_are_blocked() {
        let detector = BotDetector::new();
        let html = padded("<html><body><div>welcome to our storefront</div></body></html>");
        let markers = vec!["product-card".to_string()];
        let verdict = detector.classify(&html, &markers);
        assert!(verdict.blocked);
        assert_eq!(
            verdict.reason.as_deref(),
            Some("expected content markers missing")
        );
    }

    #[test]
    fn real_content_passes() {
        let detector = BotDetector::new();
        let html = padded("<html><body><div class=\"product-card\">Brake pads</div></body></html>");
        let markers = vec!["product-card".to_string()];
        assert_eq!(detector.classify(&html, &markers), BotVerdict::clean());
        assert_eq!(detector.classify(&html, &[]), BotVerdict::clean());
    }
}
