use crate::error::FetchError;
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// User agents to rotate through to avoid bot detection
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const ACCEPT: &str = "text/html,application/json";

/// Fetches page bodies for the adapters
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch through the relay chain
    async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;

    /// Fetch the target directly, without relays
    async fn fetch_direct(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// Configuration for the relay-chain client
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub relays: Vec<String>,
    pub timeout: Duration,
    pub direct_timeout: Duration,
    pub enable_gzip: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            relays: vec![
                "https://api.allorigins.win/raw?url=".to_string(),
                "https://corsproxy.io/?url=".to_string(),
            ],
            timeout: Duration::from_millis(8000),
            direct_timeout: Duration::from_millis(5000),
            enable_gzip: true,
        }
    }
}

/// HTTP client that reaches third-party sites through a fallback chain of CORS relays
pub struct ProxyFetcher {
    client: Client,
    config: HttpClientConfig,
}

impl ProxyFetcher {
    /// Create a new fetcher with default configuration
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new fetcher with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new()
            .gzip(config.enable_gzip)
            .brotli(config.enable_gzip)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Get a random user agent from the pool
    fn random_user_agent() -> &'static str {
        let mut rng = rand::thread_rng();
        let index = rng.gen_range(0..USER_AGENTS.len());
        USER_AGENTS[index]
    }

    /// Relay request URL for `target`
    pub fn relay_url(relay: &str, target: &str) -> String {
        format!("{}{}", relay, urlencoding::encode(target))
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", Self::random_user_agent())
            .header("Accept", ACCEPT)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }

    /// Fetch `url` through each relay in order until one answers with a 2xx
    pub async fn fetch_with_proxy(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        if self.config.relays.is_empty() {
            return Err(FetchError::NoRelays);
        }

        let mut last_error = None;
        for (attempt, relay) in self.config.relays.iter().enumerate() {
            let relayed = Self::relay_url(relay, url);
            match self.get(&relayed, timeout).await {
                Ok(body) => {
                    log::debug!("Fetched {} via relay #{} ({})", url, attempt + 1, relay);
                    return Ok(body);
                }
                Err(e) => {
                    log::warn!(
                        "Relay {}/{} failed for {}: {}",
                        attempt + 1,
                        self.config.relays.len(),
                        url,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(FetchError::RelaysExhausted {
            url: url.to_string(),
            attempts: self.config.relays.len(),
            last: Box::new(last_error.unwrap_or(FetchError::NoRelays)),
        })
    }

    /// Direct GET bounded by `timeout`
    pub async fn fetch_with_timeout(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        self.get(url, timeout).await.map_err(|e| {
            log::warn!("Direct fetch failed for {}: {}", url, e);
            e
        })
    }
}

#[async_trait]
impl Fetcher for ProxyFetcher {
    async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        self.fetch_with_proxy(url, timeout).await
    }

    async fn fetch_direct(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        self.fetch_with_timeout(url, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetcher_creation() {
        let fetcher = ProxyFetcher::new();
        assert!(fetcher.is_ok());
        assert_eq!(fetcher.unwrap().config().relays.len(), 2);
    }

    #[test]
    fn test_random_user_agent() {
        let ua1 = ProxyFetcher::random_user_agent();
        let ua2 = ProxyFetcher::random_user_agent();
        assert!(USER_AGENTS.contains(&ua1));
        assert!(USER_AGENTS.contains(&ua2));
    }

    #[test]
    fn test_relay_url_encodes_target() {
        assert_eq!(
            ProxyFetcher::relay_url("https://relay.example/raw?url=", "https://site.com/?s=a b&x=1"),
            "https://relay.example/raw?url=https%3A%2F%2Fsite.com%2F%3Fs%3Da%20b%26x%3D1"
        );
    }

    #[tokio::test]
    async fn test_no_relays_configured() {
        let fetcher = ProxyFetcher::with_config(HttpClientConfig {
            relays: Vec::new(),
            ..HttpClientConfig::default()
        })
        .unwrap();
        let err = fetcher
            .fetch_with_proxy("https://site.com", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoRelays));
    }
}
