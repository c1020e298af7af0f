//! User preferences behind an injectable store

use crate::error::PreferenceError;
use crate::registry::SourceRegistry;
use std::collections::HashMap;
use std::sync::RwLock;

pub const SELECTED_SOURCES_KEY: &str = "selected_sources";

/// Key/value storage for JSON-encoded preferences
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<(), PreferenceError>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), PreferenceError> {
        self.values
            .write()
            .map_err(|e| PreferenceError::Storage(e.to_string()))?
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Source ids the user selected, limited to enabled sources.
/// Falls back to every enabled source when nothing usable is stored.
pub fn selected_sources(store: &dyn PreferenceStore, registry: &SourceRegistry) -> Vec<String> {
    let stored: Vec<String> = store
        .get(SELECTED_SOURCES_KEY)
        .and_then(|raw| match serde_json::from_str(&raw) {
            Ok(ids) => Some(ids),
            Err(e) => {
                log::warn!("Ignoring unreadable source selection: {}", e);
                None
            }
        })
        .unwrap_or_default();

    let resolved: Vec<String> = registry
        .resolve_enabled(&stored)
        .into_iter()
        .map(|def| def.id.clone())
        .collect();
    if !resolved.is_empty() {
        return resolved;
    }
    registry
        .get_enabled_sources()
        .into_iter()
        .map(|def| def.id.clone())
        .collect()
}

/// Store a source selection; unknown or disabled ids are dropped. Returns what was stored.
pub fn save_selected_sources(
    store: &dyn PreferenceStore,
    registry: &SourceRegistry,
    ids: &[String],
) -> Result<Vec<String>, PreferenceError> {
    let kept: Vec<String> = registry
        .resolve_enabled(ids)
        .into_iter()
        .map(|def| def.id.clone())
        .collect();
    let encoded = serde_json::to_string(&kept).map_err(|source| PreferenceError::Encode {
        key: SELECTED_SOURCES_KEY.to_string(),
        source,
    })?;
    store.set(SELECTED_SOURCES_KEY, encoded)?;
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults_to_all_enabled() {
        let registry = SourceRegistry::builtin().unwrap();
        let store = MemoryPreferenceStore::new();
        assert_eq!(selected_sources(&store, &registry).len(), 18);
    }

    #[test]
    fn test_roundtrip_drops_unknown_ids() {
        let registry = SourceRegistry::builtin().unwrap();
        let store = MemoryPreferenceStore::new();
        let saved = save_selected_sources(&store, &registry, &ids(&["webtoons", "nope", "mangadex"])).unwrap();
        assert_eq!(saved, ids(&["webtoons", "mangadex"]));
        assert_eq!(selected_sources(&store, &registry), ids(&["webtoons", "mangadex"]));
    }

    #[test]
    fn test_corrupt_value_falls_back() {
        let registry = SourceRegistry::builtin().unwrap();
        let store = MemoryPreferenceStore::new();
        store.set(SELECTED_SOURCES_KEY, "not json".to_string()).unwrap();
        assert_eq!(selected_sources(&store, &registry).len(), 18);
    }
}
