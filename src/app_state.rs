//! Application state for the Actix-web server
//!
//! `AppState` is wrapped in `web::Data` and shared by every handler. The
//! aggregator is immutable after startup; the tracked collection is the only
//! mutable piece and sits behind a `Mutex` that is never held across an await.

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::error::SetupError;
use crate::merge::Collection;
use crate::preferences::{MemoryPreferenceStore, PreferenceStore};
use std::sync::{Mutex, MutexGuard};

pub struct AppState {
    pub aggregator: Aggregator,
    /// Source selection and other user preferences
    pub preferences: Box<dyn PreferenceStore>,
    pub collection: Mutex<Collection>,
}

impl AppState {
    pub fn new(aggregator: Aggregator, preferences: Box<dyn PreferenceStore>, collection: Collection) -> Self {
        Self {
            aggregator,
            preferences,
            collection: Mutex::new(collection),
        }
    }

    /// Production wiring: relay fetcher, built-in adapters, in-memory preferences
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        Ok(Self::new(
            Aggregator::from_config(config)?,
            Box::new(MemoryPreferenceStore::new()),
            Collection::new(config.matching.create_matcher()),
        ))
    }

    pub fn collection(&self) -> MutexGuard<'_, Collection> {
        self.collection.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
