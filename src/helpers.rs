//! Helper functions shared by the site adapters
//!
//! This module provides the small parsing utilities every adapter leans on:
//! - Chapter number extraction from free-form labels
//! - Relative time parsing ("3 days ago") for chapter freshness
//! - Resolving scraped hrefs against a source's base URL
//! - Title cleanup for scraped anchor text
//!
//! # Examples
//!
//! ```
//! use manhua_aggregator::helpers::{extract_chapter_number, resolve_url};
//!
//! assert_eq!(extract_chapter_number("Chapter 42"), Some(42.0));
//! assert_eq!(
//!     resolve_url("https://example.com", "/series/abc").as_deref(),
//!     Some("https://example.com/series/abc")
//! );
//! ```

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use reqwest::Url;
use std::sync::LazyLock;

static CHAPTER_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:chapter|ch\.?|ep\.?|episode)\s*(\d+(?:\.\d+)?)").expect("valid regex")
});

static TRAILING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*$").expect("valid regex"));

static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(second|minute|hour|day|week|month|year)s?\s+ago")
        .expect("valid regex")
});

static TRAILING_CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[-–|:]?\s*\b(?:chapter|ch\.|episode|ep\.)\s*\d+.*$").expect("valid regex")
});

/// Extract a chapter number from a label such as "Chapter 42.5", "Ep. 3" or a bare "42"
pub fn extract_chapter_number(text: &str) -> Option<f64> {
    if let Some(cap) = CHAPTER_LABEL_RE.captures(text) {
        if let Ok(n) = cap[1].parse::<f64>() {
            return Some(n);
        }
    }
    TRAILING_NUMBER_RE
        .captures(text.trim())
        .and_then(|cap| cap[1].parse::<f64>().ok())
}

/// Parse "2 hours ago" style strings relative to the current instant
pub fn parse_relative_time(text: &str) -> Option<DateTime<Utc>> {
    parse_relative_time_at(text, Utc::now())
}

/// Parse "2 hours ago" style strings relative to `now`, falling back to absolute dates
pub fn parse_relative_time_at(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Some(cap) = RELATIVE_TIME_RE.captures(text) {
        let n: i64 = cap[1].parse().ok()?;
        let unit = cap[2].to_lowercase();
        return match unit.as_str() {
            "second" => now.checked_sub_signed(Duration::try_seconds(n)?),
            "minute" => now.checked_sub_signed(Duration::try_minutes(n)?),
            "hour" => now.checked_sub_signed(Duration::try_hours(n)?),
            "day" => now.checked_sub_signed(Duration::try_days(n)?),
            "week" => now.checked_sub_signed(Duration::try_weeks(n)?),
            "month" => now.checked_sub_months(Months::new(u32::try_from(n).ok()?)),
            "year" => now.checked_sub_months(Months::new(u32::try_from(n.checked_mul(12)?).ok()?)),
            _ => None,
        };
    }
    parse_date(text)
}

/// Absolute date formats commonly printed next to chapter links
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%B %d %Y", "%d %B %Y", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Resolve an href scraped from `base_url` into an absolute http(s) URL
pub fn resolve_url(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(_) => Url::parse(base_url).ok()?.join(href).ok()?,
    };
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Hostname of a URL without a leading "www."
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.trim_start_matches("www.").to_string())
}

/// Collapse whitespace in scraped text
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean a scraped title: collapse whitespace and drop a trailing "Chapter N..." suffix
pub fn clean_title(title: &str) -> Option<String> {
    let cleaned = clean_text(title);
    let cleaned = TRAILING_CHAPTER_RE.replace(&cleaned, "").trim().to_string();
    if cleaned.chars().count() < 2 || cleaned.chars().all(|c| !c.is_alphanumeric()) {
        return None;
    }
    Some(cleaned)
}

/// Parse a chapter field that may be a number or a numeric string
pub fn parse_chapter_field(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|n| n.is_finite())
}
