//! Fan-out across sources
//!
//! Each selected source gets one adapter call. Calls run concurrently, each
//! raced against the per-source timeout, and the outcomes come back in the
//! order the sources were requested regardless of which finished first. A
//! failing or slow source only ever costs its own results.

use crate::config::{AggregatorConfig, Config};
use crate::error::{AdapterError, SetupError};
use crate::merge::TrackedSource;
use crate::metrics::MetricsTracker;
use crate::models::{
    flatten_reports, ChapterInfo, DiscoveryCategory, DiscoveryResult, SearchResult, SourceOutcome,
    SourceReport,
};
use crate::registry::{AdapterKind, SourceDefinition, SourceRegistry};
use crate::sources::{default_adapters, AdapterContext, AdapterMap, SiteAdapter};
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

/// Run an adapter future, turning a panic inside it into an error message
async fn guarded<T>(fut: impl Future<Output = T>) -> Result<T, String> {
    AssertUnwindSafe(fut).catch_unwind().await.map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("adapter panicked: {}", detail)
}

pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    adapters: AdapterMap,
    metrics: MetricsTracker,
    source_timeout: Duration,
    batch_size: usize,
    batch_delay: Duration,
}

impl Aggregator {
    pub fn new(registry: SourceRegistry, adapters: AdapterMap, settings: &AggregatorConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            adapters,
            metrics: MetricsTracker::new(),
            source_timeout: settings.source_timeout(),
            batch_size: settings.update_batch_size.max(1),
            batch_delay: settings.update_batch_delay(),
        }
    }

    /// Registry, relay fetcher and adapters built from configuration
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        let registry = SourceRegistry::from_config(&config.sources)?;
        let fetcher = Arc::new(config.proxy.create_fetcher()?);
        let ctx = AdapterContext::from_config(fetcher, config);
        log::info!(
            "Aggregator ready: {} enabled sources, {} relays",
            registry.get_enabled_sources().len(),
            config.proxy.relays.len()
        );
        Ok(Self::new(registry, default_adapters(&ctx), &config.aggregator))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    fn adapter_for(&self, kind: AdapterKind) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    /// Run one adapter call under the per-source timeout and record the outcome
    async fn run_source<T, F, Fut>(&self, source: &SourceDefinition, call: F) -> SourceReport<T>
    where
        F: FnOnce(Arc<dyn SiteAdapter>) -> Fut,
        Fut: Future<Output = Result<Vec<T>, AdapterError>>,
    {
        let start = Instant::now();
        let outcome = match self.adapter_for(source.adapter) {
            None => {
                let reason = format!("no adapter registered for {:?}", source.adapter);
                self.metrics.record_failure(&source.id, reason.clone());
                SourceOutcome::Failed(reason)
            }
            Some(adapter) => match timeout(self.source_timeout, guarded(call(adapter))).await {
                Ok(Ok(Ok(results))) => {
                    self.metrics.record_success(&source.id, start.elapsed(), results.len());
                    SourceOutcome::Ok(results)
                }
                Ok(Ok(Err(e))) => {
                    self.metrics.record_failure(&source.id, e.to_string());
                    SourceOutcome::Failed(e.to_string())
                }
                Ok(Err(reason)) => {
                    log::error!("[{}] {}", source.id, reason);
                    self.metrics.record_failure(&source.id, reason.clone());
                    SourceOutcome::Failed(reason)
                }
                Err(_) => {
                    self.metrics.record_timeout(&source.id, self.source_timeout);
                    SourceOutcome::TimedOut
                }
            },
        };

        SourceReport {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            outcome,
        }
    }

    /// Search every requested source, reporting each one's outcome
    pub async fn search_with_report(
        &self,
        query: &str,
        source_ids: &[String],
    ) -> Vec<SourceReport<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            log::debug!("Ignoring blank search query");
            return Vec::new();
        }
        let sources = self.registry.resolve_enabled(source_ids);
        log::info!("Searching {} source(s) for \"{}\"", sources.len(), query);

        let calls = sources.into_iter().map(|source| {
            self.run_source(source, move |adapter| async move { adapter.search(source, query).await })
        });
        join_all(calls).await
    }

    /// Search every requested source and concatenate the hits in source order
    pub async fn search_multiple_sources(&self, query: &str, source_ids: &[String]) -> Vec<SearchResult> {
        flatten_reports(self.search_with_report(query, source_ids).await)
    }

    /// Fetch a listing from every requested source that offers `category`
    pub async fn discover_with_report(
        &self,
        category: DiscoveryCategory,
        source_ids: &[String],
    ) -> Vec<SourceReport<DiscoveryResult>> {
        let sources: Vec<_> = self
            .registry
            .resolve_enabled(source_ids)
            .into_iter()
            .filter(|source| source.supports_discovery(category))
            .collect();
        log::info!("Discovering {} from {} source(s)", category, sources.len());

        let calls = sources.into_iter().map(|source| {
            self.run_source(source, move |adapter| async move {
                adapter.discover(source, category).await
            })
        });
        join_all(calls).await
    }

    pub async fn discover_from_sources(
        &self,
        category: DiscoveryCategory,
        source_ids: &[String],
    ) -> Vec<DiscoveryResult> {
        flatten_reports(self.discover_with_report(category, source_ids).await)
    }

    /// Latest chapter of a series page; unknown hosts get the loose HTML probe.
    /// Any failure yields an empty `ChapterInfo`.
    pub async fn get_latest_chapter(&self, series_url: &str) -> ChapterInfo {
        let kind = self
            .registry
            .get_source_by_url(series_url)
            .map(|source| source.adapter)
            .unwrap_or(AdapterKind::LooseHtml);
        let Some(adapter) = self.adapter_for(kind) else {
            log::warn!("No adapter for {:?}, cannot probe {}", kind, series_url);
            return ChapterInfo::default();
        };

        match timeout(self.source_timeout, guarded(adapter.latest_chapter(series_url))).await {
            Ok(Ok(Ok(info))) => info,
            Ok(Ok(Err(e))) => {
                log::warn!("Chapter probe failed for {}: {}", series_url, e);
                ChapterInfo::default()
            }
            Ok(Err(reason)) => {
                log::error!("Chapter probe for {} failed: {}", series_url, reason);
                ChapterInfo::default()
            }
            Err(_) => {
                log::warn!("Chapter probe timed out for {}", series_url);
                ChapterInfo::default()
            }
        }
    }

    /// Probe every tracked source in fixed-size batches with a pause in between
    pub async fn check_updates(&self, tracked: &[TrackedSource]) -> Vec<(TrackedSource, ChapterInfo)> {
        let mut out = Vec::with_capacity(tracked.len());
        for (idx, batch) in tracked.chunks(self.batch_size).enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }
            log::debug!("Checking update batch {} ({} sources)", idx + 1, batch.len());
            let infos = join_all(batch.iter().map(|t| self.get_latest_chapter(&t.url))).await;
            out.extend(batch.iter().cloned().zip(infos));
        }

        let found = out.iter().filter(|(_, info)| info.chapter.is_some()).count();
        log::info!("Checked {} tracked source(s), {} reported a chapter", out.len(), found);
        out
    }
}
