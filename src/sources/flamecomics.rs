use super::{chapter_probe, element_text, image_url, selector, AdapterContext, SiteAdapter};
use crate::error::AdapterError;
use crate::helpers::{clean_title, parse_chapter_field, resolve_url};
use crate::matching::TitleMatcher;
use crate::models::{ChapterInfo, SearchResult};
use crate::registry::SourceDefinition;
use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;

const CDN_URL: &str = "https://cdn.flamecomics.xyz/uploads/images/series";

static NEXT_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script id="__NEXT_DATA__" type="application/json">(.+?)</script>"#).expect("valid regex")
});

static SERIES_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/series/(\d+)/?$").expect("valid regex"));

#[derive(Deserialize, Debug)]
struct NextData {
    props: NextProps,
}

#[derive(Deserialize, Debug)]
struct NextProps {
    #[serde(rename = "pageProps")]
    page_props: PageProps,
}

#[derive(Deserialize, Debug)]
struct PageProps {
    #[serde(rename = "latestEntries", default)]
    latest_entries: Option<LatestEntries>,

    #[serde(default)]
    series: Option<SeriesField>,

    #[serde(default)]
    chapters: Option<Vec<ChapterData>>,
}

/// Browse pages carry a list; series pages carry one object
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum SeriesField {
    Many(Vec<SeriesData>),
    One(SeriesData),
}

#[derive(Deserialize, Debug)]
struct LatestEntries {
    blocks: Vec<Block>,
}

#[derive(Deserialize, Debug)]
struct Block {
    series: Vec<SeriesData>,
}

#[derive(Deserialize, Debug)]
struct SeriesData {
    series_id: u32,
    title: String,

    #[serde(default)]
    cover: Option<String>,

    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChapterData {
    chapter: String,
}

fn extract_next_data(html: &str) -> Option<NextData> {
    let json = NEXT_DATA_RE.captures(html)?.get(1)?.as_str();
    match serde_json::from_str(json) {
        Ok(data) => Some(data),
        Err(e) => {
            log::warn!("FlameComics: unreadable __NEXT_DATA__: {}", e);
            None
        }
    }
}

fn cover_url(series: &SeriesData) -> Option<String> {
    series.cover.as_ref().filter(|c| !c.is_empty()).map(|c| {
        if c.starts_with("http") {
            c.clone()
        } else {
            format!("{}/{}/{}", CDN_URL, series.series_id, c)
        }
    })
}

fn results_from_next_data(
    data: NextData,
    source: &SourceDefinition,
    query: &str,
    matcher: &TitleMatcher,
) -> Vec<SearchResult> {
    let props = data.props.page_props;
    let mut all: Vec<SeriesData> = props
        .latest_entries
        .map(|latest| latest.blocks.into_iter().flat_map(|b| b.series).collect())
        .unwrap_or_default();
    match props.series {
        Some(SeriesField::Many(list)) => all.extend(list),
        Some(SeriesField::One(one)) => all.push(one),
        None => {}
    }

    let mut seen = HashSet::new();
    all.into_iter()
        .filter(|s| seen.insert(s.series_id))
        // the browse payload is not filtered server side
        .filter(|s| query.trim().is_empty() || matcher.matches(query, &s.title))
        .filter_map(|s| {
            let title = clean_title(&s.title)?;
            let mut result = SearchResult::new(
                source,
                title,
                format!("{}/series/{}", source.base_url.trim_end_matches('/'), s.series_id),
            );
            result.cover_url = cover_url(&s);
            result.status = s.status;
            Some(result)
        })
        .collect()
}

fn results_from_links(
    html: &str,
    source: &SourceDefinition,
) -> Result<Vec<SearchResult>, AdapterError> {
    let links = selector("a[href*='/series/']")?;
    let images = selector("img")?;
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for link in document.select(&links) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(id) = SERIES_ID_RE.captures(href).map(|c| c[1].to_string()) else {
            continue;
        };
        if seen.contains(&id) {
            continue;
        }
        let title = clean_title(&element_text(link)).or_else(|| {
            link.select(&images)
                .find_map(|img| img.value().attr("alt"))
                .and_then(clean_title)
        });
        let (Some(title), Some(url)) = (title, resolve_url(&source.base_url, href)) else {
            continue;
        };
        let mut result = SearchResult::new(source, title, url);
        result.cover_url = link.select(&images).find_map(|img| image_url(img, &source.base_url));
        seen.insert(id);
        out.push(result);
    }
    Ok(out)
}

/// Extract series from a Flame Comics page, preferring the embedded Next.js payload
pub fn parse_search_page(
    html: &str,
    source: &SourceDefinition,
    query: &str,
    matcher: &TitleMatcher,
    max_results: usize,
) -> Result<Vec<SearchResult>, AdapterError> {
    let mut results = match extract_next_data(html) {
        Some(data) => results_from_next_data(data, source, query, matcher),
        None => results_from_links(html, source)?,
    };
    results.truncate(max_results);
    log::debug!("FlameComics: found {} series", results.len());
    Ok(results)
}

/// Highest chapter listed in a series page payload
fn latest_from_next_data(html: &str) -> Option<f64> {
    extract_next_data(html)?
        .props
        .page_props
        .chapters?
        .iter()
        .filter_map(|c| parse_chapter_field(Some(c.chapter.as_str())))
        .reduce(f64::max)
}

pub struct FlameComicsAdapter {
    ctx: AdapterContext,
}

impl FlameComicsAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SiteAdapter for FlameComicsAdapter {
    async fn search(
        &self,
        source: &SourceDefinition,
        query: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let html = self.ctx.fetch_page(&source.search_url(query)).await?;
        parse_search_page(&html, source, query, &self.ctx.matcher, self.ctx.max_results)
    }

    async fn latest_chapter(&self, series_url: &str) -> Result<ChapterInfo, AdapterError> {
        let html = self.ctx.fetch_page(series_url).await?;
        match latest_from_next_data(&html) {
            Some(chapter) => Ok(ChapterInfo {
                chapter: Some(chapter),
                updated_at: None,
            }),
            None => chapter_probe::parse_latest_chapter(&html, series_url),
        }
    }
}
