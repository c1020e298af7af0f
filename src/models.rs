use crate::registry::SourceDefinition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Listing pages a source can expose for discovery
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryCategory {
    Popular,
    Latest,
    Trending,
}

impl DiscoveryCategory {
    pub const ALL: [DiscoveryCategory; 3] = [
        DiscoveryCategory::Popular,
        DiscoveryCategory::Latest,
        DiscoveryCategory::Trending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryCategory::Popular => "popular",
            DiscoveryCategory::Latest => "latest",
            DiscoveryCategory::Trending => "trending",
        }
    }

    /// Whether a listing for this category is ordered by rank
    pub fn is_ranked(&self) -> bool {
        !matches!(self, DiscoveryCategory::Latest)
    }
}

impl fmt::Display for DiscoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "popular" => Ok(DiscoveryCategory::Popular),
            "latest" => Ok(DiscoveryCategory::Latest),
            "trending" => Ok(DiscoveryCategory::Trending),
            other => Err(format!("unknown discovery category: {}", other)),
        }
    }
}

/// One series hit from a single source
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResult {
    pub source_id: String,
    pub source_name: String,
    pub title: String,
    /// Absolute link to the series page
    pub url: String,
    pub cover_url: Option<String>,
    pub latest_chapter: Option<f64>,
    pub status: Option<String>,
}

impl SearchResult {
    pub fn new(source: &SourceDefinition, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            title: title.into(),
            url: url.into(),
            cover_url: None,
            latest_chapter: None,
            status: None,
        }
    }
}

/// A search hit taken from a listing page, with its position when the listing is ranked
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DiscoveryResult {
    #[serde(flatten)]
    pub result: SearchResult,
    pub rank: Option<u32>,
}

impl DiscoveryResult {
    pub fn ranked(result: SearchResult, rank: Option<u32>) -> Self {
        Self { result, rank }
    }
}

/// Most recent chapter seen on a series page
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ChapterInfo {
    pub chapter: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ChapterInfo {
    pub fn is_empty(&self) -> bool {
        self.chapter.is_none() && self.updated_at.is_none()
    }
}

/// What happened when one source was queried
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SourceOutcome<T> {
    Ok(Vec<T>),
    Failed(String),
    TimedOut,
}

impl<T> SourceOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, SourceOutcome::Ok(_))
    }

    pub fn into_results(self) -> Vec<T> {
        match self {
            SourceOutcome::Ok(results) => results,
            _ => Vec::new(),
        }
    }
}

/// Per-source outcome of one fan-out call
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SourceReport<T> {
    pub source_id: String,
    pub source_name: String,
    pub elapsed_ms: u64,
    pub outcome: SourceOutcome<T>,
}

/// Flatten reports to a plain list, keeping source order
pub fn flatten_reports<T>(reports: Vec<SourceReport<T>>) -> Vec<T> {
    reports
        .into_iter()
        .flat_map(|r| r.outcome.into_results())
        .collect()
}
