use super::{chapter_probe, element_text, first_text, image_url, selector, AdapterContext, SiteAdapter};
use crate::error::AdapterError;
use crate::helpers::{clean_title, resolve_url};
use crate::models::{ChapterInfo, SearchResult};
use crate::registry::SourceDefinition;
use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::LazyLock;

static TITLE_NO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]title_no=(\d+)").expect("valid regex"));

/// Webtoons search results; originals and canvas cards both link with `title_no`
pub fn parse_search_page(
    html: &str,
    source: &SourceDefinition,
    max_results: usize,
) -> Result<Vec<SearchResult>, AdapterError> {
    let links = selector("a[href*='title_no=']")?;
    let titles = [selector(".subj")?, selector(".title")?, selector("strong")?];
    let images = selector("img")?;

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for link in document.select(&links) {
        if out.len() >= max_results {
            break;
        }
        let Some(href) = link.value().attr("href").filter(|h| !h.contains("episode_no=")) else {
            continue;
        };
        let Some(title_no) = TITLE_NO_RE.captures(href).map(|c| c[1].to_string()) else {
            continue;
        };
        if seen.contains(&title_no) {
            continue;
        }

        let title = first_text(link, &titles)
            .and_then(|t| clean_title(&t))
            .or_else(|| link.value().attr("title").and_then(clean_title))
            .or_else(|| clean_title(&element_text(link)));
        let (Some(title), Some(url)) = (title, resolve_url(&source.base_url, href)) else {
            continue;
        };

        let mut result = SearchResult::new(source, title, url);
        result.cover_url = link.select(&images).find_map(|img| image_url(img, &source.base_url));
        seen.insert(title_no);
        out.push(result);
    }

    log::debug!("Webtoons: found {} titles", out.len());
    Ok(out)
}

pub struct WebtoonAdapter {
    ctx: AdapterContext,
}

impl WebtoonAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SiteAdapter for WebtoonAdapter {
    async fn search(
        &self,
        source: &SourceDefinition,
        query: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let html = self.ctx.fetch_page(&source.search_url(query)).await?;
        parse_search_page(&html, source, self.ctx.max_results)
    }

    async fn latest_chapter(&self, series_url: &str) -> Result<ChapterInfo, AdapterError> {
        let html = self.ctx.fetch_page(series_url).await?;
        chapter_probe::parse_latest_chapter(&html, series_url)
    }
}
