use super::{AdapterContext, SiteAdapter};
use crate::error::AdapterError;
use crate::helpers::parse_chapter_field;
use crate::models::{ChapterInfo, DiscoveryCategory, DiscoveryResult, SearchResult};
use crate::registry::SourceDefinition;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const API_BASE_URL: &str = "https://api.mangadex.org";
const SITE_URL: &str = "https://mangadex.org";
const COVER_BASE_URL: &str = "https://uploads.mangadex.org/covers";

/// Title locales in order of preference
const TITLE_LOCALES: &[&str] = &["en", "ja-ro", "ko-ro", "zh-ro", "zh-hk", "ja", "ko", "zh"];

static MANGA_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/title/([0-9a-fA-F-]{36})").expect("valid regex"));

#[derive(Deserialize)]
struct MangaList {
    #[serde(default)]
    data: Vec<MangaData>,
}

#[derive(Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaAttributes {
    #[serde(default)]
    title: HashMap<String, String>,
    last_chapter: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    rel_type: String,
    attributes: Option<RelationshipAttributes>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationshipAttributes {
    file_name: Option<String>,
}

#[derive(Deserialize)]
struct ChapterList {
    #[serde(default)]
    data: Vec<ChapterData>,
}

#[derive(Deserialize)]
struct ChapterData {
    attributes: ChapterAttributes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterAttributes {
    chapter: Option<String>,
    publish_at: Option<String>,
    created_at: Option<String>,
}

fn preferred_title(titles: &HashMap<String, String>) -> String {
    TITLE_LOCALES
        .iter()
        .filter_map(|locale| titles.get(*locale))
        .map(|t| t.trim())
        .find(|t| !t.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

fn map_mangadex(source: &SourceDefinition, manga: MangaData) -> SearchResult {
    let cover_url = manga
        .relationships
        .iter()
        .filter(|r| r.rel_type == "cover_art")
        .find_map(|r| r.attributes.as_ref()?.file_name.as_deref())
        .map(|file| format!("{}/{}/{}.256.jpg", COVER_BASE_URL, manga.id, file));

    let mut result = SearchResult::new(
        source,
        preferred_title(&manga.attributes.title),
        format!("{}/title/{}", SITE_URL, manga.id),
    );
    result.cover_url = cover_url;
    result.latest_chapter = parse_chapter_field(manga.attributes.last_chapter.as_deref());
    result.status = manga.attributes.status;
    result
}

/// Map a `/manga` listing response onto search results
pub fn parse_manga_list(json: &str, source: &SourceDefinition) -> Result<Vec<SearchResult>, AdapterError> {
    let list: MangaList = serde_json::from_str(json)?;
    Ok(list.data.into_iter().map(|m| map_mangadex(source, m)).collect())
}

/// Map a single-entry `/chapter` response onto chapter info
pub fn parse_chapter_list(json: &str) -> Result<ChapterInfo, AdapterError> {
    let list: ChapterList = serde_json::from_str(json)?;
    let Some(latest) = list.data.into_iter().next() else {
        return Ok(ChapterInfo::default());
    };
    let attrs = latest.attributes;
    let updated_at = attrs
        .publish_at
        .as_deref()
        .or(attrs.created_at.as_deref())
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(ChapterInfo {
        chapter: parse_chapter_field(attrs.chapter.as_deref()),
        updated_at,
    })
}

/// MangaDex id from a `https://mangadex.org/title/{id}` link
pub fn manga_id_from_url(url: &str) -> Option<&str> {
    MANGA_ID_RE.captures(url).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// JSON API adapter; queries go straight to the API without relays
pub struct MangaDexAdapter {
    ctx: AdapterContext,
    api_base: String,
}

impl MangaDexAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self::with_api_base(ctx, API_BASE_URL)
    }

    pub fn with_api_base(ctx: AdapterContext, api_base: &str) -> Self {
        Self {
            ctx,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn chapter_query_url(&self, manga_id: &str) -> String {
        format!(
            "{}/chapter?manga={}&order[chapter]=desc&limit=1&translatedLanguage[]=en",
            self.api_base, manga_id
        )
    }
}

#[async_trait]
impl SiteAdapter for MangaDexAdapter {
    async fn search(
        &self,
        source: &SourceDefinition,
        query: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let body = self
            .ctx
            .fetcher
            .fetch_direct(&source.search_url(query), self.ctx.timeout)
            .await?;
        parse_manga_list(&body, source)
    }

    async fn discover(
        &self,
        source: &SourceDefinition,
        category: DiscoveryCategory,
    ) -> Result<Vec<DiscoveryResult>, AdapterError> {
        let Some(url) = self.ctx.discovery_url(source, category) else {
            return Ok(Vec::new());
        };
        let body = self.ctx.fetcher.fetch_direct(url, self.ctx.timeout).await?;
        let results = parse_manga_list(&body, source)?;
        Ok(super::rank_results(results, category))
    }

    async fn latest_chapter(&self, series_url: &str) -> Result<ChapterInfo, AdapterError> {
        let id = manga_id_from_url(series_url)
            .ok_or_else(|| AdapterError::Parse(format!("no MangaDex id in {}", series_url)))?;
        let body = self
            .ctx
            .fetcher
            .fetch_direct(&self.chapter_query_url(id), self.ctx.direct_timeout)
            .await?;
        parse_chapter_list(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AdapterKind;
    use chrono::TimeZone;

    fn source() -> SourceDefinition {
        SourceDefinition::new(
            "mangadex",
            "MangaDex",
            "https://mangadex.org",
            "https://api.mangadex.org/manga?title={query}",
            AdapterKind::StructuredApi,
        )
    }

    const SEARCH_RESPONSE: &str = r#"{
      "result": "ok",
      "response": "collection",
      "data": [
        {
          "id": "32d76d19-8a05-4db0-9fc2-e0b0648fe9d0",
          "type": "manga",
          "attributes": {
            "title": {"en": "Solo Leveling"},
            "altTitles": [{"ko": "나 혼자만 레벨업"}],
            "lastChapter": "200",
            "status": "completed"
          },
          "relationships": [
            {"id": "a1", "type": "author"},
            {"id": "c1", "type": "cover_art", "attributes": {"fileName": "cover.jpg"}}
          ]
        },
        {
          "id": "0b0c9b3f-5d5e-4b8a-9a41-8d1c0d3f1a22",
          "type": "manga",
          "attributes": {
            "title": {"ja-ro": "Ore dake Level Up na Ken", "en": ""},
            "lastChapter": "",
            "status": "ongoing"
          },
          "relationships": [{"id": "c2", "type": "cover_art"}]
        },
        {
          "id": "5f1e6c7a-0000-4000-8000-000000000000",
          "type": "manga",
          "attributes": {"title": {"fr": "Titre"}, "lastChapter": null, "status": null},
          "relationships": []
        }
      ]
    }"#;

    #[test]
    fn test_parse_search_response() {
        let results = parse_manga_list(SEARCH_RESPONSE, &source()).unwrap();
        assert_eq!(results.len(), 3);

        let first = &results[0];
        assert_eq!(first.title, "Solo Leveling");
        assert_eq!(first.url, "https://mangadex.org/title/32d76d19-8a05-4db0-9fc2-e0b0648fe9d0");
        assert_eq!(
            first.cover_url.as_deref(),
            Some("https://uploads.mangadex.org/covers/32d76d19-8a05-4db0-9fc2-e0b0648fe9d0/cover.jpg.256.jpg")
        );
        assert_eq!(first.latest_chapter, Some(200.0));
        assert_eq!(first.status.as_deref(), Some("completed"));

        // empty English title falls through to the romanized one
        assert_eq!(results[1].title, "Ore dake Level Up na Ken");
        assert!(results[1].cover_url.is_none());
        assert!(results[1].latest_chapter.is_none());

        assert_eq!(results[2].title, "Unknown");
        assert!(results[2].status.is_none());
    }

    #[test]
    fn test_parse_chapter_list() {
        let json = r#"{"data":[{"id":"x","attributes":{"chapter":"201.5",
            "publishAt":"2024-01-05T10:30:00+00:00","createdAt":"2024-01-04T00:00:00+00:00"}}]}"#;
        let info = parse_chapter_list(json).unwrap();
        assert_eq!(info.chapter, Some(201.5));
        assert_eq!(info.updated_at, Some(Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).unwrap()));

        let json = r#"{"data":[{"attributes":{"chapter":null,"createdAt":"2024-01-04T00:00:00+00:00"}}]}"#;
        let info = parse_chapter_list(json).unwrap();
        assert!(info.chapter.is_none());
        assert_eq!(info.updated_at, Some(Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap()));

        assert!(parse_chapter_list(r#"{"data":[]}"#).unwrap().is_empty());
        assert!(matches!(parse_chapter_list("<html>"), Err(AdapterError::Json(_))));
    }

    #[test]
    fn test_manga_id_from_url() {
        assert_eq!(
            manga_id_from_url("https://mangadex.org/title/32d76d19-8a05-4db0-9fc2-e0b0648fe9d0/solo-leveling"),
            Some("32d76d19-8a05-4db0-9fc2-e0b0648fe9d0")
        );
        assert_eq!(manga_id_from_url("https://mangadex.org/titles"), None);
    }
}
