//! Fuzzy title matching
//!
//! Two titles refer to the same work when, after normalization, they are
//! equal, one contains the other, or their significant words overlap enough.
//! The overlap threshold and the stop-word list come from `[matching]` in
//! the configuration.

use crate::config::default_stop_words;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.8;

static DEFAULT_MATCHER: LazyLock<TitleMatcher> = LazyLock::new(TitleMatcher::default);

/// Lowercase, keep only `[a-z0-9 ]`, collapse whitespace
pub fn normalize_title(title: &str) -> String {
    let kept: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Significant words of a title under the default stop-word list
pub fn get_tokens(title: &str) -> HashSet<String> {
    DEFAULT_MATCHER.tokens(title)
}

/// Match two titles with the default threshold and stop words.
///
/// A title that normalizes to an empty string (no ASCII letters or digits,
/// e.g. Hangul or Hanzi) never matches through the substring or token tiers.
/// Such pairs match only when the raw titles are equal after trimming and
/// lowercasing, and a blank title matches nothing.
pub fn titles_match(a: &str, b: &str) -> bool {
    DEFAULT_MATCHER.matches(a, b)
}

#[derive(Debug, Clone)]
pub struct TitleMatcher {
    threshold: f64,
    stop_words: HashSet<String>,
}

impl Default for TitleMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_OVERLAP_THRESHOLD, default_stop_words())
    }
}

impl TitleMatcher {
    pub fn new(threshold: f64, stop_words: impl IntoIterator<Item = String>) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            log::warn!("Ignoring invalid overlap threshold {}", threshold);
            DEFAULT_OVERLAP_THRESHOLD
        };
        Self {
            threshold,
            stop_words: stop_words.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn tokens(&self, title: &str) -> HashSet<String> {
        normalize_title(title)
            .split(' ')
            .filter(|w| w.chars().count() > 1 && !self.stop_words.contains(*w))
            .map(str::to_string)
            .collect()
    }

    /// See [`titles_match`] for the tiers and the rule for titles with no ASCII content
    pub fn matches(&self, a: &str, b: &str) -> bool {
        let na = normalize_title(a);
        let nb = normalize_title(b);

        // titles with no ASCII letters or digits (e.g. Hangul) normalize to nothing
        if na.is_empty() || nb.is_empty() {
            let (ra, rb) = (a.trim(), b.trim());
            return !ra.is_empty() && ra.to_lowercase() == rb.to_lowercase();
        }

        if na == nb || na.contains(&nb) || nb.contains(&na) {
            return true;
        }

        let ta = self.tokens(&na);
        let tb = self.tokens(&nb);
        if ta.is_empty() || tb.is_empty() {
            return false;
        }
        let overlap = ta.intersection(&tb).count();
        overlap as f64 >= self.threshold * ta.len().min(tb.len()) as f64
    }
}
