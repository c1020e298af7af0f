//! Error types shared across the fetch layer, the adapters and the registry.

/// Errors raised while fetching a page, either through the relay chain or directly
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("All {attempts} relays failed for {url} (last error: {last})")]
    RelaysExhausted {
        url: String,
        attempts: usize,
        #[source]
        last: Box<FetchError>,
    },

    #[error("No relay endpoints configured")]
    NoRelays,
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Request { source, .. } => source.is_timeout(),
            FetchError::RelaysExhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }
}

/// Errors raised inside a site adapter. They never leave the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors raised while validating a source table
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate source id \"{0}\"")]
    DuplicateId(String),

    #[error("Sources \"{first}\" and \"{second}\" share hostname {host}")]
    DuplicateHost {
        host: String,
        first: String,
        second: String,
    },

    #[error("Source \"{id}\" has an invalid base URL: {base_url}")]
    InvalidBaseUrl { id: String, base_url: String },
}

/// Errors raised by a preference store
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("Could not encode preference \"{key}\": {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Preference storage failed: {0}")]
    Storage(String),
}

/// Errors raised while wiring up the aggregator at startup
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Invalid source table: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
