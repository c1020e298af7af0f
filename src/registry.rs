//! Source registry
//!
//! Static per-site configuration: how to build search, discovery and chapter
//! URLs for every site, and which adapter family parses its pages. The table
//! is validated once when the registry is built; lookups afterwards are pure.

use crate::config::SourcesConfig;
use crate::error::RegistryError;
use crate::helpers::host_of;
use crate::models::DiscoveryCategory;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Sites with markup that no generic adapter handles
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BespokeSite {
    AsuraScans,
    FlameComics,
    Webtoons,
}

/// Which adapter family parses a source's pages
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// JSON API queried directly instead of through the relays
    StructuredApi,
    /// WordPress manga themes (Madara, MangaStream)
    TemplatedHtml,
    /// Anchor heuristics for sites without a known template
    LooseHtml,
    Bespoke(BespokeSite),
}

fn default_true() -> bool { true }

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SourceDefinition {
    pub id: String,
    pub name: String,
    pub base_url: String,
    /// Search URL template; `{query}` is replaced by the percent-encoded query
    #[serde(rename = "search_url")]
    pub search_template: String,
    #[serde(default)]
    pub discovery_urls: BTreeMap<DiscoveryCategory, String>,
    /// Chapter URL template with `{series}` and `{chapter}` placeholders
    #[serde(default, rename = "chapter_url")]
    pub chapter_template: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub adapter: AdapterKind,
}

impl SourceDefinition {
    pub fn new(id: &str, name: &str, base_url: &str, search_template: &str, adapter: AdapterKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            base_url: base_url.to_string(),
            search_template: search_template.to_string(),
            discovery_urls: BTreeMap::new(),
            chapter_template: None,
            enabled: true,
            adapter,
        }
    }

    pub fn with_discovery(mut self, category: DiscoveryCategory, url: &str) -> Self {
        self.discovery_urls.insert(category, url.to_string());
        self
    }

    pub fn with_chapter_url(mut self, template: &str) -> Self {
        self.chapter_template = Some(template.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn search_url(&self, query: &str) -> String {
        self.search_template
            .replace("{query}", &urlencoding::encode(query.trim()))
    }

    pub fn discovery_url(&self, category: DiscoveryCategory) -> Option<&str> {
        self.discovery_urls.get(&category).map(String::as_str)
    }

    pub fn supports_discovery(&self, category: DiscoveryCategory) -> bool {
        self.discovery_urls.contains_key(&category)
    }

    pub fn chapter_url(&self, series_url: &str, chapter: f64) -> Option<String> {
        let template = self.chapter_template.as_ref()?;
        let number = if chapter.fract() == 0.0 {
            format!("{}", chapter as i64)
        } else {
            chapter.to_string()
        };
        Some(
            template
                .replace("{series}", series_url.trim_end_matches('/'))
                .replace("{chapter}", &number),
        )
    }

    pub fn has_api(&self) -> bool {
        self.adapter == AdapterKind::StructuredApi
    }

    pub fn host(&self) -> Option<String> {
        host_of(&self.base_url)
    }
}

/// Validated table of source definitions
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceDefinition>,
    by_id: HashMap<String, usize>,
}

impl SourceRegistry {
    /// Build a registry, rejecting duplicate ids, unparseable base URLs and
    /// enabled sources that share a hostname
    pub fn new(sources: Vec<SourceDefinition>) -> Result<Self, RegistryError> {
        let mut by_id = HashMap::new();
        let mut hosts: HashMap<String, String> = HashMap::new();

        for (idx, def) in sources.iter().enumerate() {
            if by_id.insert(def.id.clone(), idx).is_some() {
                return Err(RegistryError::DuplicateId(def.id.clone()));
            }
            let host = def.host().ok_or_else(|| RegistryError::InvalidBaseUrl {
                id: def.id.clone(),
                base_url: def.base_url.clone(),
            })?;
            if !def.enabled {
                continue;
            }
            if let Some(first) = hosts.insert(host.clone(), def.id.clone()) {
                return Err(RegistryError::DuplicateHost {
                    host,
                    first,
                    second: def.id.clone(),
                });
            }
        }

        Ok(Self { sources, by_id })
    }

    /// The built-in source table
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(builtin_sources())
    }

    /// Built-in table with configuration overrides applied
    pub fn from_config(config: &SourcesConfig) -> Result<Self, RegistryError> {
        let disabled: HashSet<&str> = config.disabled.iter().map(String::as_str).collect();
        let mut sources = builtin_sources();
        for def in sources.iter_mut() {
            if disabled.contains(def.id.as_str()) {
                def.enabled = false;
            }
        }
        sources.extend(config.extra.iter().cloned());
        Self::new(sources)
    }

    pub fn all(&self) -> &[SourceDefinition] {
        &self.sources
    }

    pub fn get_source_by_id(&self, id: &str) -> Option<&SourceDefinition> {
        self.by_id.get(id).map(|&idx| &self.sources[idx])
    }

    /// Source whose base URL shares the hostname of `url`; enabled sources win
    pub fn get_source_by_url(&self, url: &str) -> Option<&SourceDefinition> {
        let host = host_of(url)?;
        let matches_host = |def: &&SourceDefinition| def.host().as_deref() == Some(host.as_str());
        self.sources
            .iter()
            .filter(|def| def.enabled)
            .find(matches_host)
            .or_else(|| self.sources.iter().find(matches_host))
    }

    pub fn get_enabled_sources(&self) -> Vec<&SourceDefinition> {
        self.sources.iter().filter(|def| def.enabled).collect()
    }

    pub fn get_sources_with_discovery(&self, category: DiscoveryCategory) -> Vec<&SourceDefinition> {
        self.sources
            .iter()
            .filter(|def| def.enabled && def.supports_discovery(category))
            .collect()
    }

    /// Enabled definitions for `ids`, in the order given; unknown or disabled ids are skipped
    pub fn resolve_enabled(&self, ids: &[String]) -> Vec<&SourceDefinition> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| match self.get_source_by_id(id) {
                Some(def) if def.enabled => Some(def),
                Some(_) => {
                    log::debug!("Skipping disabled source {}", id);
                    None
                }
                None => {
                    log::debug!("Skipping unknown source {}", id);
                    None
                }
            })
            .collect()
    }
}

fn madara(id: &str, name: &str, base: &str) -> SourceDefinition {
    SourceDefinition::new(id, name, base, &format!("{}/?s={{query}}&post_type=wp-manga", base), AdapterKind::TemplatedHtml)
        .with_discovery(DiscoveryCategory::Popular, &format!("{}/manga/?m_orderby=views", base))
        .with_discovery(DiscoveryCategory::Latest, &format!("{}/manga/?m_orderby=latest", base))
        .with_discovery(DiscoveryCategory::Trending, &format!("{}/manga/?m_orderby=trending", base))
        .with_chapter_url("{series}/chapter-{chapter}/")
}

fn mangastream(id: &str, name: &str, base: &str) -> SourceDefinition {
    SourceDefinition::new(id, name, base, &format!("{}/?s={{query}}", base), AdapterKind::TemplatedHtml)
        .with_discovery(DiscoveryCategory::Popular, &format!("{}/manga/?order=popular", base))
        .with_discovery(DiscoveryCategory::Latest, &format!("{}/manga/?order=update", base))
}

fn loose(id: &str, name: &str, base: &str, search_path: &str) -> SourceDefinition {
    SourceDefinition::new(id, name, base, &format!("{}{}", base, search_path), AdapterKind::LooseHtml)
}

/// Sites known to the aggregator out of the box
pub fn builtin_sources() -> Vec<SourceDefinition> {
    vec![
        SourceDefinition::new(
            "mangadex",
            "MangaDex",
            "https://mangadex.org",
            "https://api.mangadex.org/manga?title={query}&limit=15&includes[]=cover_art&order[relevance]=desc",
            AdapterKind::StructuredApi,
        )
        .with_discovery(
            DiscoveryCategory::Popular,
            "https://api.mangadex.org/manga?limit=20&includes[]=cover_art&order[followedCount]=desc&hasAvailableChapters=true",
        )
        .with_discovery(
            DiscoveryCategory::Latest,
            "https://api.mangadex.org/manga?limit=20&includes[]=cover_art&order[latestUploadedChapter]=desc&hasAvailableChapters=true",
        ),
        SourceDefinition::new(
            "asurascans",
            "Asura Scans",
            "https://asuracomic.net",
            "https://asuracomic.net/series?page=1&name={query}",
            AdapterKind::Bespoke(BespokeSite::AsuraScans),
        )
        .with_discovery(DiscoveryCategory::Popular, "https://asuracomic.net/series?page=1&order=rating")
        .with_discovery(DiscoveryCategory::Latest, "https://asuracomic.net/series?page=1&order=update")
        .with_chapter_url("{series}/chapter/{chapter}"),
        SourceDefinition::new(
            "flamecomics",
            "Flame Comics",
            "https://flamecomics.xyz",
            "https://flamecomics.xyz/browse?search={query}",
            AdapterKind::Bespoke(BespokeSite::FlameComics),
        ),
        SourceDefinition::new(
            "webtoons",
            "Webtoons",
            "https://www.webtoons.com",
            "https://www.webtoons.com/en/search?keyword={query}",
            AdapterKind::Bespoke(BespokeSite::Webtoons),
        ),
        madara("manhuaus", "Manhuaus", "https://manhuaus.com"),
        madara("manhuaplus", "ManhuaPlus", "https://manhuaplus.com"),
        madara("resetscans", "Reset Scans", "https://reset-scans.org"),
        madara("mangaread", "MangaRead", "https://www.mangaread.org"),
        madara("manhuafast", "ManhuaFast", "https://manhuafast.com"),
        mangastream("drakecomic", "Drake Comic", "https://drakecomic.org"),
        mangastream("rizzcomic", "Rizz Comic", "https://rizzcomic.com"),
        mangastream("thunderscans", "Thunder Scans", "https://en-thunderscans.com"),
        mangastream("madarascans", "Madara Scans", "https://madarascans.com"),
        mangastream("kenscans", "Ken Scans", "https://kencomics.com"),
        loose("mangabuddy", "MangaBuddy", "https://mangabuddy.com", "/search?q={query}"),
        loose("mgeko", "MGeko", "https://www.mgeko.cc", "/search/?search={query}"),
        loose("mangapark", "MangaPark", "https://mangapark.net", "/search?word={query}"),
        loose("mangakatana", "MangaKatana", "https://mangakatana.com", "/?search={query}&search_by=book_name"),
        loose("manganato", "Manganato", "https://manganato.com", "/search/story/{query}").disabled(),
    ]
}
