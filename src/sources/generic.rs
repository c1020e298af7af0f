//! Anchor heuristics for sites with no known template
//!
//! Instead of selecting cards, every link that looks like a series page is
//! taken as a hit and the surrounding markup is searched for a cover and a
//! chapter label.

use super::{chapter_probe, element_text, image_url, rank_results, selector, AdapterContext, SiteAdapter};
use crate::error::AdapterError;
use crate::helpers::{clean_title, extract_chapter_number, resolve_url};
use crate::models::{ChapterInfo, DiscoveryCategory, DiscoveryResult, SearchResult};
use crate::registry::SourceDefinition;
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

static LOOSE_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:series|manga|manhua|manhwa|comic|comics|title|book)/[^/?#]+").expect("valid regex")
});

const NAVIGATION_MARKERS: &[&str] = &[
    "login", "register", "signup", "/page/", "page=", "/genre", "/tag/", "/search", "/chapter",
    "-chapter-", "/author/",
];

const CONTAINER_TAGS: &[&str] = &["div", "li", "article", "tr", "section"];

const MAX_CONTAINER_DEPTH: usize = 5;

fn is_candidate_href(href: &str) -> bool {
    let lower = href.to_lowercase();
    LOOSE_HREF_RE.is_match(&lower) && !NAVIGATION_MARKERS.iter().any(|m| lower.contains(m))
}

struct LinkSelectors {
    anchors: Selector,
    images: Selector,
    chapter_labels: Selector,
}

impl LinkSelectors {
    fn new() -> Result<Self, AdapterError> {
        Ok(Self {
            anchors: selector("a[href]")?,
            images: selector("img")?,
            chapter_labels: selector("[class*='chap'], [class*='latest']")?,
        })
    }
}

/// Block ancestors of `anchor`, innermost first, that hold no link to a different series
fn card_scopes<'a>(
    anchor: ElementRef<'a>,
    url: &str,
    source: &SourceDefinition,
    anchors: &Selector,
) -> Vec<ElementRef<'a>> {
    let links_elsewhere = |el: &ElementRef<'_>| {
        el.select(anchors)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| is_candidate_href(href))
            .filter_map(|href| resolve_url(&source.base_url, href))
            .any(|other| other != url)
    };
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(MAX_CONTAINER_DEPTH)
        .filter(|el| CONTAINER_TAGS.contains(&el.value().name()))
        .take_while(|el| !links_elsewhere(el))
        .collect()
}

fn link_title(anchor: ElementRef<'_>, images: &Selector) -> Option<String> {
    anchor
        .value()
        .attr("title")
        .and_then(clean_title)
        .or_else(|| clean_title(&element_text(anchor)))
        .or_else(|| {
            anchor
                .select(images)
                .find_map(|img| img.value().attr("alt"))
                .and_then(clean_title)
        })
}

fn chapter_near(container: ElementRef<'_>, sels: &LinkSelectors) -> Option<f64> {
    container
        .select(&sels.chapter_labels)
        .chain(container.select(&sels.anchors))
        .map(element_text)
        .filter(|text| text.to_lowercase().contains("ch"))
        .find_map(|text| extract_chapter_number(&text))
}

/// Extract series links from an arbitrary page
pub fn parse_links(
    html: &str,
    source: &SourceDefinition,
    max_results: usize,
) -> Result<Vec<SearchResult>, AdapterError> {
    let sels = LinkSelectors::new()?;
    let document = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for anchor in document.select(&sels.anchors) {
        if out.len() >= max_results {
            break;
        }
        let Some(href) = anchor.value().attr("href").filter(|h| is_candidate_href(h)) else {
            continue;
        };
        let Some(url) = resolve_url(&source.base_url, href) else {
            continue;
        };
        if seen.contains(&url) {
            continue;
        }
        // image-only links are common; a later text link to the same series supplies the title
        let Some(title) = link_title(anchor, &sels.images) else {
            continue;
        };

        let scopes = card_scopes(anchor, &url, source, &sels.anchors);
        let mut result = SearchResult::new(source, title, url.clone());
        result.cover_url = anchor
            .select(&sels.images)
            .chain(scopes.iter().flat_map(|scope| scope.select(&sels.images)))
            .find_map(|img| image_url(img, &source.base_url));
        result.latest_chapter = scopes.iter().find_map(|&scope| chapter_near(scope, &sels));

        seen.insert(url);
        out.push(result);
    }

    log::debug!("{}: extracted {} links", source.name, out.len());
    Ok(out)
}

pub struct GenericAdapter {
    ctx: AdapterContext,
}

impl GenericAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SiteAdapter for GenericAdapter {
    async fn search(
        &self,
        source: &SourceDefinition,
        query: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let html = self.ctx.fetch_page(&source.search_url(query)).await?;
        parse_links(&html, source, self.ctx.max_results)
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
        Ok(rank_results(parse_links(&html, source, self.ctx.max_results)?, category))
    }

    async fn latest_chapter(&self, series_url: &str) -> Result<ChapterInfo, AdapterError> {
        let html = self.ctx.fetch_page(series_url).await?;
        chapter_probe::parse_latest_chapter(&html, series_url)
    }
}
