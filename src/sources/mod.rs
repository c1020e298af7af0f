//! Site adapters
//!
//! Every adapter turns a fetched page into normalized [`SearchResult`] or
//! [`DiscoveryResult`] records. Fetching is async; parsing is done by plain
//! functions over the fetched body so no parsed document is held across an
//! await point.

use crate::config::Config;
use crate::error::AdapterError;
use crate::helpers::resolve_url;
use crate::http_client::Fetcher;
use crate::matching::TitleMatcher;
use crate::models::{ChapterInfo, DiscoveryCategory, DiscoveryResult, SearchResult};
use crate::registry::{AdapterKind, BespokeSite, SourceDefinition};
use async_trait::async_trait;
use scraper::{ElementRef, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub mod asurascans;
pub mod chapter_probe;
pub mod flamecomics;
pub mod generic;
pub mod mangadex;
pub mod webtoon;
pub mod wp_manga;

/// Extraction logic for one family of sites
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    async fn search(
        &self,
        source: &SourceDefinition,
        query: &str,
    ) -> Result<Vec<SearchResult>, AdapterError>;

    async fn discover(
        &self,
        source: &SourceDefinition,
        category: DiscoveryCategory,
    ) -> Result<Vec<DiscoveryResult>, AdapterError> {
        log::debug!("{} has no discovery support for {}", source.id, category);
        Ok(Vec::new())
    }

    /// Most recent chapter listed on a series page
    async fn latest_chapter(&self, series_url: &str) -> Result<ChapterInfo, AdapterError>;
}

/// Shared fetch settings handed to every adapter
#[derive(Clone)]
pub struct AdapterContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub timeout: Duration,
    pub direct_timeout: Duration,
    pub max_results: usize,
    /// Title matching for sites whose search pages ignore the query
    pub matcher: TitleMatcher,
}

impl AdapterContext {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::from_config(fetcher, &Config::default())
    }

    pub fn from_config(fetcher: Arc<dyn Fetcher>, config: &Config) -> Self {
        Self {
            fetcher,
            timeout: config.proxy.timeout(),
            direct_timeout: config.proxy.direct_timeout(),
            max_results: config.aggregator.max_results,
            matcher: config.matching.create_matcher(),
        }
    }

    /// Fetch a third-party page through the relay chain
    pub async fn fetch_page(&self, url: &str) -> Result<String, AdapterError> {
        Ok(self.fetcher.fetch_text(url, self.timeout).await?)
    }

    fn discovery_url<'a>(
        &self,
        source: &'a SourceDefinition,
        category: DiscoveryCategory,
    ) -> Option<&'a str> {
        let url = source.discovery_url(category);
        if url.is_none() {
            log::debug!("{} does not list {}", source.id, category);
        }
        url
    }
}

/// Adapter lookup keyed by the kind resolved in the registry
pub type AdapterMap = HashMap<AdapterKind, Arc<dyn SiteAdapter>>;

/// The adapters for every built-in kind
pub fn default_adapters(ctx: &AdapterContext) -> AdapterMap {
    let mut map: AdapterMap = HashMap::new();
    map.insert(AdapterKind::StructuredApi, Arc::new(mangadex::MangaDexAdapter::new(ctx.clone())));
    map.insert(AdapterKind::TemplatedHtml, Arc::new(wp_manga::WpMangaAdapter::new(ctx.clone())));
    map.insert(AdapterKind::LooseHtml, Arc::new(generic::GenericAdapter::new(ctx.clone())));
    map.insert(
        AdapterKind::Bespoke(BespokeSite::AsuraScans),
        Arc::new(asurascans::AsuraScansAdapter::new(ctx.clone())),
    );
    map.insert(
        AdapterKind::Bespoke(BespokeSite::FlameComics),
        Arc::new(flamecomics::FlameComicsAdapter::new(ctx.clone())),
    );
    map.insert(
        AdapterKind::Bespoke(BespokeSite::Webtoons),
        Arc::new(webtoon::WebtoonAdapter::new(ctx.clone())),
    );
    map
}

pub(crate) fn selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|e| AdapterError::Selector(format!("{}: {}", css, e)))
}

/// Whitespace-collapsed text content of an element
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    crate::helpers::clean_text(&element.text().collect::<String>())
}

/// First non-empty text among `selectors` inside `scope`
pub(crate) fn first_text(scope: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        scope
            .select(sel)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// Lazy-load aware image URL, resolved against `base_url`
pub(crate) fn image_url(img: ElementRef<'_>, base_url: &str) -> Option<String> {
    let el = img.value();
    let raw = ["data-src", "data-lazy-src", "src"]
        .iter()
        .find_map(|attr| el.attr(attr).map(str::trim).filter(|v| !v.is_empty()))?;
    resolve_url(base_url, raw)
}

/// Assign 1-based ranks in document order when the listing is ranked
pub(crate) fn rank_results(
    results: Vec<SearchResult>,
    category: DiscoveryCategory,
) -> Vec<DiscoveryResult> {
    results
        .into_iter()
        .enumerate()
        .map(|(idx, result)| {
            let rank = category.is_ranked().then(|| idx as u32 + 1);
            DiscoveryResult::ranked(result, rank)
        })
        .collect()
}
