//! Latest-chapter probe for HTML series pages

use super::{element_text, selector};
use crate::error::AdapterError;
use crate::helpers::{extract_chapter_number, parse_relative_time_at};
use crate::models::ChapterInfo;
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

static HREF_CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:chapter|episode|ch)[-_/](\d+)(?:[-.](\d+))?").expect("valid regex")
});

const DATE_SELECTORS: &str =
    ".chapter-release-date, .chapterdate, span.date, .date, span.time, .time";

const CONTAINER_TAGS: &[&str] = &["li", "tr", "div", "article"];

fn is_chapter_link(href: &str, text: &str) -> bool {
    let lower = href.to_lowercase();
    let looks_chapter = lower.contains("/chapter")
        || lower.contains("-chapter-")
        || lower.contains("/episode")
        || lower.contains("episode_no=")
        || lower.contains("/ch-");
    let is_navigation = lower.contains("/page/") || lower.contains("/tag/") || lower.contains("/genre/");
    (looks_chapter || text.to_lowercase().starts_with("chapter")) && !is_navigation
}

fn has_chapter_label(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["chapter", "ch.", "ch ", "episode", "ep."].iter().any(|l| lower.contains(l))
}

fn chapter_from_href(href: &str) -> Option<f64> {
    let cap = HREF_CHAPTER_RE.captures(href)?;
    let whole = &cap[1];
    match cap.get(2) {
        Some(frac) => format!("{}.{}", whole, frac.as_str()).parse().ok(),
        None => whole.parse().ok(),
    }
}

/// Nearest list-like ancestor of a chapter link
fn container_of(anchor: ElementRef<'_>) -> Option<ElementRef<'_>> {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(3)
        .find(|el| CONTAINER_TAGS.contains(&el.value().name()))
}

fn date_near(anchor: ElementRef<'_>, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, AdapterError> {
    let dates = selector(DATE_SELECTORS)?;
    let time = selector("time[datetime]")?;
    let scopes = std::iter::once(anchor).chain(container_of(anchor));

    for scope in scopes {
        if let Some(parsed) = scope
            .select(&time)
            .filter_map(|t| t.value().attr("datetime"))
            .find_map(|raw| parse_relative_time_at(raw, now))
        {
            return Ok(Some(parsed));
        }
        if let Some(parsed) = scope
            .select(&dates)
            .map(element_text)
            .find_map(|text| parse_relative_time_at(&text, now))
        {
            return Ok(Some(parsed));
        }
    }

    // bare "3 days ago" text in the row
    Ok(container_of(anchor).and_then(|c| parse_relative_time_at(&element_text(c), now)))
}

/// Highest chapter linked from a series page, with the date printed next to it
pub fn parse_latest_chapter(html: &str, series_url: &str) -> Result<ChapterInfo, AdapterError> {
    parse_latest_chapter_at(html, series_url, Utc::now())
}

pub fn parse_latest_chapter_at(
    html: &str,
    series_url: &str,
    now: DateTime<Utc>,
) -> Result<ChapterInfo, AdapterError> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    let mut best: Option<(f64, ElementRef<'_>)> = None;
    for a in document.select(&anchors) {
        let href = a.value().attr("href").unwrap_or_default();
        let text = element_text(a);
        if !is_chapter_link(href, &text) {
            continue;
        }
        // anchor text without a label is often a date, so only trust labelled numbers
        let number = extract_chapter_number(&text)
            .filter(|_| has_chapter_label(&text))
            .or_else(|| chapter_from_href(href));
        if let Some(n) = number {
            if best.map(|(b, _)| n > b).unwrap_or(true) {
                best = Some((n, a));
            }
        }
    }

    let Some((chapter, anchor)) = best else {
        log::debug!("No chapter links found on {}", series_url);
        return Ok(ChapterInfo::default());
    };

    Ok(ChapterInfo {
        chapter: Some(chapter),
        updated_at: date_near(anchor, now)?,
    })
}
