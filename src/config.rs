use crate::registry::SourceDefinition;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    /// Relay prefixes tried in order; the percent-encoded target URL is appended
    #[serde(default = "default_relays")]
    pub relays: Vec<String>,

    /// Timeout for each relayed request in milliseconds
    #[serde(default = "default_proxy_timeout")]
    pub timeout_ms: u64,

    /// Timeout for direct (non-relayed) probes in milliseconds
    #[serde(default = "default_direct_timeout")]
    pub direct_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregatorConfig {
    /// Upper bound for a single source's search or discovery call
    #[serde(default = "default_source_timeout")]
    pub source_timeout_ms: u64,

    /// Number of chapter probes run concurrently by check-updates
    #[serde(default = "default_batch_size")]
    pub update_batch_size: usize,

    /// Pause between check-updates batches
    #[serde(default = "default_batch_delay")]
    pub update_batch_delay_ms: u64,

    /// Cap on results extracted from one HTML page
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    /// Share of the smaller token set that must overlap for two titles to match
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,

    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    /// Built-in source ids to switch off
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Additional source definitions appended to the built-in table
    #[serde(default)]
    pub extra: Vec<SourceDefinition>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_relays() -> Vec<String> {
    vec![
        "https://api.allorigins.win/raw?url=".to_string(),
        "https://corsproxy.io/?url=".to_string(),
    ]
}
fn default_proxy_timeout() -> u64 { 8000 }
fn default_direct_timeout() -> u64 { 5000 }
fn default_source_timeout() -> u64 { 10_000 }
fn default_batch_size() -> usize { 5 }
fn default_batch_delay() -> u64 { 100 }
fn default_max_results() -> usize { 20 }
fn default_overlap_threshold() -> f64 { 0.8 }
fn default_bind() -> String { "127.0.0.1:8080".to_string() }

pub fn default_stop_words() -> Vec<String> {
    [
        "the", "a", "an", "of", "and", "or", "in", "on", "at", "to", "for", "is", "raw",
        "manga", "manhua", "manhwa", "comic", "webtoon",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            relays: default_relays(),
            timeout_ms: default_proxy_timeout(),
            direct_timeout_ms: default_direct_timeout(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            source_timeout_ms: default_source_timeout(),
            update_batch_size: default_batch_size(),
            update_batch_delay_ms: default_batch_delay(),
            max_results: default_max_results(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: default_overlap_threshold(),
            stop_words: default_stop_words(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::warn!("Could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<Config>(content)
    }
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn direct_timeout(&self) -> Duration {
        Duration::from_millis(self.direct_timeout_ms)
    }

    /// Create the relay-chain fetcher from this configuration
    pub fn create_fetcher(&self) -> Result<crate::http_client::ProxyFetcher, reqwest::Error> {
        use crate::http_client::{HttpClientConfig, ProxyFetcher};

        let config = HttpClientConfig {
            relays: self.relays.clone(),
            timeout: self.timeout(),
            direct_timeout: self.direct_timeout(),
            ..HttpClientConfig::default()
        };

        ProxyFetcher::with_config(config)
    }
}

impl AggregatorConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    pub fn update_batch_delay(&self) -> Duration {
        Duration::from_millis(self.update_batch_delay_ms)
    }
}

impl MatchingConfig {
    pub fn create_matcher(&self) -> crate::matching::TitleMatcher {
        crate::matching::TitleMatcher::new(self.overlap_threshold, self.stop_words.iter().cloned())
    }
}
