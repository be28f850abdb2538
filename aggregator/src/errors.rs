use crate::config::ValidationError;
use hyper::StatusCode;
use thiserror::Error;

/// Result type alias for aggregator operations
pub type Result<T, E = AggregatorError> = std::result::Result<T, E>;

/// Request-level errors. Upstream failures never surface here, see [`FetchError`].
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Missing query parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("Invalid upstream URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Too many upstream URLs: {count} given, at most {max} allowed")]
    TooManyUrls { count: usize, max: usize },

    #[error("Response encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AggregatorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AggregatorError::MissingParameter(_)
            | AggregatorError::InvalidUrl { .. }
            | AggregatorError::TooManyUrls { .. } => StatusCode::BAD_REQUEST,
            AggregatorError::Encoding(_)
            | AggregatorError::InternalError(_)
            | AggregatorError::InvalidConfig(_)
            | AggregatorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failure of a single upstream fetch. Isolated to that upstream.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Upstream timeout for {url}")]
    Timeout { url: String },

    #[error("Upstream request failed for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream {url} answered {status}")]
    Status { url: String, status: StatusCode },

    #[error("Failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Response body from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("Malformed numbers payload from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Fetch permits closed before {url} could be fetched")]
    Closed { url: String },
}

impl FetchError {
    /// Low-cardinality outcome tag for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "timeout",
            FetchError::Network { .. } => "network",
            FetchError::Status { .. } => "status",
            FetchError::Body { .. } => "body",
            FetchError::TooLarge { .. } => "too_large",
            FetchError::Parse { .. } => "parse",
            FetchError::Closed { .. } => "closed",
        }
    }
}
