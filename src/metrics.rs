//! Per-source health metrics
//!
//! Every fan-out call records how the source fared, along with its response time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceMetrics {
    pub source_id: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Successful requests that produced no results
    pub empty_results: u64,
    pub failed_requests: u64,
    pub timeout_count: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub average_response_time_ms: f64,
    pub total_response_time_ms: u64,
}

impl SourceMetrics {
    pub fn new(source_id: String) -> Self {
        Self {
            source_id,
            total_requests: 0,
            successful_requests: 0,
            empty_results: 0,
            failed_requests: 0,
            timeout_count: 0,
            last_success: None,
            last_failure: None,
            last_error: None,
            average_response_time_ms: 0.0,
            total_response_time_ms: 0,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }

    pub fn record_success(&mut self, response_time: Duration, result_count: usize) {
        self.total_requests += 1;
        self.successful_requests += 1;
        if result_count == 0 {
            self.empty_results += 1;
        }
        self.last_success = Some(Utc::now());

        self.total_response_time_ms += response_time.as_millis() as u64;
        self.average_response_time_ms =
            self.total_response_time_ms as f64 / self.successful_requests as f64;
    }

    pub fn record_failure(&mut self, error: String) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.last_failure = Some(Utc::now());
        self.last_error = Some(error);
    }

    pub fn record_timeout(&mut self) {
        self.record_failure("timed out".to_string());
        self.timeout_count += 1;
    }
}

/// Shared, thread-safe map of per-source metrics
#[derive(Clone, Default)]
pub struct MetricsTracker {
    metrics: Arc<Mutex<HashMap<String, SourceMetrics>>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SourceMetrics>> {
        // a panic while holding the lock leaves counters usable
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update<R>(&self, source_id: &str, f: impl FnOnce(&mut SourceMetrics) -> R) -> R {
        let mut metrics = self.lock();
        let entry = metrics
            .entry(source_id.to_string())
            .or_insert_with(|| SourceMetrics::new(source_id.to_string()));
        f(entry)
    }

    pub fn record_success(&self, source_id: &str, response_time: Duration, result_count: usize) {
        let rate = self.update(source_id, |m| {
            m.record_success(response_time, result_count);
            m.success_rate()
        });
        log::info!(
            "[{}] {} result(s) in {}ms - success rate {:.2}%",
            source_id,
            result_count,
            response_time.as_millis(),
            rate
        );
    }

    pub fn record_failure(&self, source_id: &str, error: String) {
        log::warn!("[{}] Failure - {}", source_id, error);
        self.update(source_id, |m| m.record_failure(error));
    }

    pub fn record_timeout(&self, source_id: &str, after: Duration) {
        log::warn!("[{}] Timed out after {}ms", source_id, after.as_millis());
        self.update(source_id, SourceMetrics::record_timeout);
    }

    pub fn get_metrics(&self, source_id: &str) -> Option<SourceMetrics> {
        self.lock().get(source_id).cloned()
    }

    /// All metrics, sorted by source id
    pub fn get_all_metrics(&self) -> Vec<SourceMetrics> {
        let mut all: Vec<_> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        all
    }

    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.get_all_metrics()).unwrap_or_else(|_| "[]".to_string())
    }
}
