use super::{element_text, image_url, rank_results, selector, AdapterContext, SiteAdapter};
use crate::error::AdapterError;
use crate::helpers::{clean_title, extract_chapter_number, resolve_url};
use crate::models::{ChapterInfo, DiscoveryCategory, DiscoveryResult, SearchResult};
use crate::registry::SourceDefinition;
use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Listing pages are walked in document order up to this many entries
const LISTING_CAP: usize = 20;

/// Asura appends a rotating hash to series slugs
static SLUG_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-[0-9a-f]{8}$").expect("valid regex"));

static TRAILING_RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\d+(?:\.\d+)?\s*$").expect("valid regex"));

static CHAPTER_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"chapter/(\d+(?:\.\d+)?)").expect("valid regex"));

/// Series slug without the hash suffix, or `None` for chapter or nested links
fn stable_slug(href: &str) -> Option<String> {
    if href.contains("/chapter/") {
        return None;
    }
    let slug = href.split("series/").nth(1)?.trim_end_matches('/');
    if slug.is_empty() || slug.contains('/') || slug.contains('?') {
        return None;
    }
    Some(SLUG_HASH_RE.replace(slug, "").into_owned())
}

fn title_from_text(raw: &str) -> Option<String> {
    let head = raw.split("Chapter").next().unwrap_or(raw);
    let head = head.replace("MANHWA", "").replace("MANHUA", "").replace("MANGA", "");
    clean_title(&TRAILING_RATING_RE.replace(head.trim(), ""))
}

/// Extract series cards from a search or listing page
pub fn parse_series(
    html: &str,
    source: &SourceDefinition,
    max_results: usize,
) -> Result<Vec<SearchResult>, AdapterError> {
    let links = selector("a[href*='series/']")?;
    let title_span = selector("span.block")?;
    let spans = selector("span, p")?;
    let images = selector("img")?;

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for link in document.select(&links) {
        if out.len() >= max_results {
            break;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(slug) = stable_slug(href) else {
            continue;
        };
        if seen.contains(&slug) {
            continue;
        }

        let title = link
            .select(&title_span)
            .map(element_text)
            .find_map(|t| clean_title(&t))
            .or_else(|| title_from_text(&element_text(link)));
        let (Some(title), Some(url)) = (title, resolve_url(&source.base_url, href)) else {
            continue;
        };

        let mut result = SearchResult::new(source, title, url);
        result.cover_url = link.select(&images).find_map(|img| image_url(img, &source.base_url));
        result.latest_chapter = link
            .select(&spans)
            .map(element_text)
            .filter(|t| t.starts_with("Chapter"))
            .find_map(|t| extract_chapter_number(&t));

        seen.insert(slug);
        out.push(result);
    }

    log::debug!("AsuraScans: found {} series", out.len());
    Ok(out)
}

/// Highest chapter linked from a series page
pub fn parse_series_page(html: &str) -> ChapterInfo {
    let chapter = CHAPTER_HREF_RE
        .captures_iter(html)
        .filter_map(|cap| cap[1].parse::<f64>().ok())
        .fold(None, |best: Option<f64>, n| Some(best.map_or(n, |b| b.max(n))));
    ChapterInfo {
        chapter,
        updated_at: None,
    }
}

pub struct AsuraScansAdapter {
    ctx: AdapterContext,
}

impl AsuraScansAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SiteAdapter for AsuraScansAdapter {
    async fn search(
        &self,
        source: &SourceDefinition,
        query: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let html = self.ctx.fetch_page(&source.search_url(query)).await?;
        parse_series(&html, source, self.ctx.max_results)
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
        let series = parse_series(&html, source, LISTING_CAP)?;
        Ok(rank_results(series, category))
    }

    async fn latest_chapter(&self, series_url: &str) -> Result<ChapterInfo, AdapterError> {
        let html = self.ctx.fetch_page(series_url).await?;
        // chapter rows carry dates the generic probe understands; fall back to raw hrefs
        let info = super::chapter_probe::parse_latest_chapter(&html, series_url)?;
        if info.chapter.is_some() {
            return Ok(info);
        }
        Ok(parse_series_page(&html))
    }
}
