//! Attaching search hits to tracked series
//!
//! A hit picked by the user (the anchor) pulls in every hit from the wider
//! pool with a matching title, at most one per source site. The result either
//! joins an already tracked entry with a matching title or starts a new one.

use crate::matching::TitleMatcher;
use crate::models::{ChapterInfo, SearchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// One site's copy of a tracked series
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrackedSource {
    pub source_id: String,
    pub source_name: String,
    pub url: String,
    pub latest_chapter: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl From<&SearchResult> for TrackedSource {
    fn from(result: &SearchResult) -> Self {
        Self {
            source_id: result.source_id.clone(),
            source_name: result.source_name.clone(),
            url: result.url.clone(),
            latest_chapter: result.latest_chapter,
            updated_at: None,
            last_checked: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrackedEntry {
    pub id: Uuid,
    pub title: String,
    pub cover_url: Option<String>,
    pub sources: Vec<TrackedSource>,
}

impl TrackedEntry {
    /// Highest chapter known across all attached sources
    pub fn latest_chapter(&self) -> Option<f64> {
        self.sources
            .iter()
            .filter_map(|s| s.latest_chapter)
            .reduce(f64::max)
    }

    fn has_url(&self, url: &str) -> bool {
        self.sources.iter().any(|s| s.url == url)
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    Created { id: Uuid, sources: usize },
    Merged { id: Uuid, added: usize },
}

/// Pool members matching the anchor's title, anchor first, at most one per source id
pub fn select_merge_candidates<'a>(
    anchor: &'a SearchResult,
    pool: &'a [SearchResult],
    matcher: &TitleMatcher,
) -> Vec<&'a SearchResult> {
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(anchor.source_id.as_str());

    let mut selected = vec![anchor];
    for candidate in pool {
        if seen.contains(candidate.source_id.as_str()) {
            continue;
        }
        if matcher.matches(&anchor.title, &candidate.title) {
            seen.insert(candidate.source_id.as_str());
            selected.push(candidate);
        }
    }
    selected
}

/// In-memory set of tracked series
#[derive(Debug, Default)]
pub struct Collection {
    entries: Vec<TrackedEntry>,
    matcher: TitleMatcher,
}

impl Collection {
    pub fn new(matcher: TitleMatcher) -> Self {
        Self {
            entries: Vec::new(),
            matcher,
        }
    }

    pub fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    pub fn get(&self, id: Uuid) -> Option<&TrackedEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Every source link across all entries
    pub fn tracked_sources(&self) -> Vec<TrackedSource> {
        self.entries.iter().flat_map(|e| e.sources.iter().cloned()).collect()
    }

    /// Attach `anchor` and its matches from `pool`
    pub fn attach(&mut self, anchor: &SearchResult, pool: &[SearchResult]) -> MergeOutcome {
        let candidates = select_merge_candidates(anchor, pool, &self.matcher);

        let matcher = &self.matcher;
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| matcher.matches(&e.title, &anchor.title))
        {
            let mut added = 0;
            for candidate in candidates {
                if entry.has_url(&candidate.url) {
                    continue;
                }
                entry.sources.push(TrackedSource::from(candidate));
                added += 1;
            }
            if entry.cover_url.is_none() {
                entry.cover_url = anchor.cover_url.clone();
            }
            log::info!("Merged {} new source(s) into \"{}\"", added, entry.title);
            return MergeOutcome::Merged { id: entry.id, added };
        }

        let cover_url = candidates.iter().find_map(|c| c.cover_url.clone());
        let entry = TrackedEntry {
            id: Uuid::new_v4(),
            title: anchor.title.clone(),
            cover_url,
            sources: candidates.iter().map(|&c| TrackedSource::from(c)).collect(),
        };
        let outcome = MergeOutcome::Created {
            id: entry.id,
            sources: entry.sources.len(),
        };
        log::info!("Tracking \"{}\" from {} source(s)", entry.title, entry.sources.len());
        self.entries.push(entry);
        outcome
    }

    /// Write probed chapter info back onto tracked sources with the same URL.
    /// Returns the number of sources whose latest chapter moved forward.
    pub fn apply_updates(&mut self, updates: &[(TrackedSource, ChapterInfo)]) -> usize {
        let now = Utc::now();
        let mut advanced = 0;
        for (probed, info) in updates {
            for source in self
                .entries
                .iter_mut()
                .flat_map(|e| e.sources.iter_mut())
                .filter(|s| s.url == probed.url)
            {
                source.last_checked = Some(now);
                if let Some(chapter) = info.chapter {
                    if source.latest_chapter.map_or(true, |old| chapter > old) {
                        advanced += 1;
                    }
                    source.latest_chapter = Some(chapter);
                }
                if info.updated_at.is_some() {
                    source.updated_at = info.updated_at;
                }
            }
        }
        advanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source: &str, title: &str, url: &str) -> SearchResult {
        SearchResult {
            source_id: source.to_string(),
            source_name: source.to_uppercase(),
            title: title.to_string(),
            url: url.to_string(),
            cover_url: None,
            latest_chapter: None,
            status: None,
        }
    }

    #[test]
    fn test_candidates_one_per_source_anchor_first() {
        let anchor = hit("a", "Solo Leveling", "https://a.example/1");
        let pool = vec![
            anchor.clone(),
            hit("b", "Solo Leveling (Official)", "https://b.example/1"),
            hit("b", "Solo Leveling Raw", "https://b.example/2"),
            hit("c", "Martial Peak", "https://c.example/1"),
            hit("a", "Solo Leveling: Ragnarok", "https://a.example/2"),
            hit("d", "SOLO LEVELING", "https://d.example/1"),
        ];
        let selected = select_merge_candidates(&anchor, &pool, &TitleMatcher::default());
        let urls: Vec<_> = selected.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example/1", "https://b.example/1", "https://d.example/1"]);
    }

    #[test]
    fn test_dedup_bound_holds() {
        let anchor = hit("s0", "Tower of God", "https://s0.example/x");
        let pool: Vec<_> = (0..30)
            .map(|i| hit(&format!("s{}", i % 4), "Tower of God", &format!("https://s.example/{i}")))
            .collect();
        let selected = select_merge_candidates(&anchor, &pool, &TitleMatcher::default());
        let ids: HashSet<_> = selected.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(selected.len(), 4);
        assert_eq!(ids.len(), selected.len());
    }

    #[test]
    fn test_attach_creates_then_merges() {
        let mut collection = Collection::default();
        let mut anchor = hit("a", "Solo Leveling", "https://a.example/1");
        let mut other = hit("b", "Solo Leveling (Official)", "https://b.example/1");
        other.cover_url = Some("https://b.example/cover.jpg".into());
        let pool = vec![anchor.clone(), other.clone()];

        let outcome = collection.attach(&anchor, &pool);
        assert!(matches!(outcome, MergeOutcome::Created { sources: 2, .. }));
        let entry = &collection.entries()[0];
        assert_eq!(entry.title, "Solo Leveling");
        // cover backfilled from the first candidate carrying one
        assert_eq!(entry.cover_url.as_deref(), Some("https://b.example/cover.jpg"));

        // same hits again: nothing new
        let outcome = collection.attach(&anchor, &pool);
        assert!(matches!(outcome, MergeOutcome::Merged { added: 0, .. }));

        anchor.url = "https://a.example/moved".into();
        let outcome = collection.attach(&anchor, &[]);
        assert!(matches!(outcome, MergeOutcome::Merged { added: 1, .. }));
        assert_eq!(collection.entries().len(), 1);
        assert_eq!(collection.entries()[0].sources.len(), 3);

        let unrelated = hit("c", "Martial Peak", "https://c.example/1");
        assert!(matches!(collection.attach(&unrelated, &pool), MergeOutcome::Created { sources: 1, .. }));
        assert_eq!(collection.entries().len(), 2);
    }

    #[test]
    fn test_apply_updates() {
        let mut collection = Collection::default();
        let mut anchor = hit("a", "Solo Leveling", "https://a.example/1");
        anchor.latest_chapter = Some(199.0);
        collection.attach(&anchor, &[]);

        let tracked = collection.tracked_sources();
        let info = ChapterInfo {
            chapter: Some(200.0),
            updated_at: None,
        };
        assert_eq!(collection.apply_updates(&[(tracked[0].clone(), info)]), 1);
        let source = &collection.entries()[0].sources[0];
        assert_eq!(source.latest_chapter, Some(200.0));
        assert!(source.last_checked.is_some());
        assert_eq!(collection.entries()[0].latest_chapter(), Some(200.0));

        // an empty probe only touches last_checked
        assert_eq!(collection.apply_updates(&[(tracked[0].clone(), ChapterInfo::default())]), 0);
        assert_eq!(collection.entries()[0].sources[0].latest_chapter, Some(200.0));
    }
}
