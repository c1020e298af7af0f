//! WordPress manga themes (Madara, MangaStream and their forks)
//!
//! Both theme families render results as cards; the selector lists below
//! cover the layouts seen across sites running them.

use super::{
    chapter_probe, element_text, first_text, image_url, rank_results, selector, AdapterContext,
    SiteAdapter,
};
use crate::error::AdapterError;
use crate::helpers::{clean_title, extract_chapter_number, resolve_url};
use crate::models::{ChapterInfo, DiscoveryCategory, DiscoveryResult, SearchResult};
use crate::registry::SourceDefinition;
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

const CARD_SELECTORS: &[&str] = &[
    "div.page-item-detail",     // Madara listing
    "div.c-tabs-item__content", // Madara search results
    "div.listupd div.bs",       // MangaStream listing
    "div.bsx",                  // MangaStream cards
    "div.utao div.uta",         // MangaStream update list
    "article.bs",
    "div.manga-item",
    "div.series-item",
    "div.post-item",
];

const TITLE_SELECTORS: &[&str] = &[
    "div.post-title h3 a",
    "div.post-title a",
    ".post-title",
    "div.tt",
    "h3 a",
    "h4 a",
    "h3",
    "h2",
    ".series-title",
];

const CHAPTER_SELECTORS: &[&str] = &[
    "span.chapter a",
    ".chapter-item .chapter a",
    ".list-chapter .chapter-item a",
    "div.epxs",
    ".latest-chap a",
    ".chapter-link",
    ".chapter",
];

const STATUS_SELECTORS: &[&str] = &[
    ".mg_status .summary-content",
    ".status",
    ".mstat",
];

static SERIES_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:series|comic|comics|manga|manhua|manhwa|webtoon)/[^/?#]+").expect("valid regex")
});

/// Compiled selector lists for card extraction
struct CardSelectors {
    cards: Selector,
    anchors: Selector,
    images: Selector,
    titles: Vec<Selector>,
    chapters: Vec<Selector>,
    statuses: Vec<Selector>,
}

impl CardSelectors {
    fn new() -> Result<Self, AdapterError> {
        let compile = |list: &[&str]| list.iter().map(|css| selector(css)).collect::<Result<Vec<_>, _>>();
        Ok(Self {
            cards: selector(&CARD_SELECTORS.join(", "))?,
            anchors: selector("a[href]")?,
            images: selector("img")?,
            titles: compile(TITLE_SELECTORS)?,
            chapters: compile(CHAPTER_SELECTORS)?,
            statuses: compile(STATUS_SELECTORS)?,
        })
    }
}

fn is_series_href(href: &str) -> bool {
    let lower = href.to_lowercase();
    SERIES_HREF_RE.is_match(&lower) && !lower.contains("/chapter") && !lower.contains("-chapter-")
}

fn extract_card(
    card: ElementRef<'_>,
    sels: &CardSelectors,
    source: &SourceDefinition,
) -> Option<SearchResult> {
    let anchor = card
        .select(&sels.anchors)
        .find(|a| a.value().attr("href").map(is_series_href).unwrap_or(false))?;
    let url = resolve_url(&source.base_url, anchor.value().attr("href")?)?;

    let title = first_text(card, &sels.titles)
        .and_then(|t| clean_title(&t))
        .or_else(|| clean_title(&element_text(anchor)))
        .or_else(|| anchor.value().attr("title").and_then(clean_title))?;

    let mut result = SearchResult::new(source, title, url);
    result.cover_url = card
        .select(&sels.images)
        .find_map(|img| image_url(img, &source.base_url));
    result.latest_chapter = first_text(card, &sels.chapters).and_then(|t| extract_chapter_number(&t));
    result.status = first_text(card, &sels.statuses);
    Some(result)
}

/// Extract series cards from a search or listing page
pub fn parse_cards(
    html: &str,
    source: &SourceDefinition,
    max_results: usize,
) -> Result<Vec<SearchResult>, AdapterError> {
    let sels = CardSelectors::new()?;
    let document = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for card in document.select(&sels.cards) {
        if out.len() >= max_results {
            break;
        }
        if let Some(result) = extract_card(card, &sels, source) {
            if seen.insert(result.url.clone()) {
                out.push(result);
            }
        }
    }

    log::debug!("{}: extracted {} cards", source.name, out.len());
    Ok(out)
}

pub struct WpMangaAdapter {
    ctx: AdapterContext,
}

impl WpMangaAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SiteAdapter for WpMangaAdapter {
    async fn search(
        &self,
        source: &SourceDefinition,
        query: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let html = self.ctx.fetch_page(&source.search_url(query)).await?;
        parse_cards(&html, source, self.ctx.max_results)
    }

    async fn discover(
        &self,
        source: &SourceDefinition,
        category: DiscoveryCategory,
    ) -> Result<Vec<DiscoveryResult>, AdapterError> {
        let Some(url) = self.ctx.discovery_url(source, category) else {
            return Ok(Vec::new());
        };
        let html = self.ctx.fetch_page(url).await?;
        Ok(rank_results(parse_cards(&html, source, self.ctx.max_results)?, category))
    }

    async fn latest_chapter(&self, series_url: &str) -> Result<ChapterInfo, AdapterError> {
        let html = self.ctx.fetch_page(series_url).await?;
        chapter_probe::parse_latest_chapter(&html, series_url)
    }
}
