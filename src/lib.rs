// Library interface for manhua_aggregator
// The binary serves these components over HTTP; tests use them directly

pub mod aggregator;
pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod helpers;
pub mod http_client;
pub mod matching;
pub mod merge;
pub mod metrics;
pub mod models;
pub mod preferences;
pub mod registry;
pub mod sources;
