use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Reserve of {reserve_ms}ms must be smaller than the {timeout_ms}ms request timeout")]
    ReserveExceedsTimeout { reserve_ms: u64, timeout_ms: u64 },

    #[error(
        "Batch reserve of {batch_ms}ms must not be smaller than the incremental reserve of {incremental_ms}ms"
    )]
    BatchReserveBelowIncremental { batch_ms: u64, incremental_ms: u64 },

    #[error("Shutdown grace of {grace_ms}ms must cover the {timeout_ms}ms request timeout")]
    GraceBelowRequestTimeout { grace_ms: u64, timeout_ms: u64 },

    #[error("Fetch timeout cannot be 0")]
    ZeroFetchTimeout,

    #[error("Limit `{0}` cannot be 0")]
    ZeroLimit(&'static str),
}

/// How fetched number lists are combined into the response.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategyKind {
    /// Merge every list as it arrives.
    #[default]
    Incremental,
    /// Buffer every list and merge once at the end.
    Batch,
}

impl MergeStrategyKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MergeStrategyKind::Incremental => "incremental",
            MergeStrategyKind::Batch => "batch",
        }
    }
}

/// Aggregator configuration
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the public `/numbers` endpoint
    #[serde(default)]
    pub listener: Listener,
    /// Optional listener for `/health` and `/ready`
    pub admin_listener: Option<Listener>,
    #[serde(default)]
    pub strategy: MergeStrategyKind,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub limits: Limits,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if let Some(admin_listener) = &self.admin_listener {
            admin_listener.validate()?;
        }
        self.timeouts.validate()?;
        self.limits.validate()?;
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Timing budget of a single `/numbers` request.
///
/// The overall deadline is `request_timeout_ms` minus the reserve of the active
/// strategy. The batch reserve is larger because its single merge happens after
/// the deadline has fired.
///
/// `shutdown_grace_ms` bounds how long a stopping server waits for requests
/// that are still in flight.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Timeouts {
    pub request_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
    pub incremental_reserve_ms: u64,
    pub batch_reserve_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            request_timeout_ms: 500,
            fetch_timeout_ms: 500,
            incremental_reserve_ms: 15,
            batch_reserve_ms: 25,
            shutdown_grace_ms: 1_000,
        }
    }
}

impl Timeouts {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn reserve(&self, strategy: MergeStrategyKind) -> Duration {
        match strategy {
            MergeStrategyKind::Incremental => Duration::from_millis(self.incremental_reserve_ms),
            MergeStrategyKind::Batch => Duration::from_millis(self.batch_reserve_ms),
        }
    }

    /// Time after which the aggregator stops waiting for upstreams.
    pub fn overall_deadline(&self, strategy: MergeStrategyKind) -> Duration {
        Duration::from_millis(self.request_timeout_ms).saturating_sub(self.reserve(strategy))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.fetch_timeout_ms == 0 {
            return Err(ValidationError::ZeroFetchTimeout);
        }
        for reserve_ms in [self.incremental_reserve_ms, self.batch_reserve_ms] {
            if reserve_ms >= self.request_timeout_ms {
                return Err(ValidationError::ReserveExceedsTimeout {
                    reserve_ms,
                    timeout_ms: self.request_timeout_ms,
                });
            }
        }
        if self.batch_reserve_ms < self.incremental_reserve_ms {
            return Err(ValidationError::BatchReserveBelowIncremental {
                batch_ms: self.batch_reserve_ms,
                incremental_ms: self.incremental_reserve_ms,
            });
        }
        if self.shutdown_grace_ms < self.request_timeout_ms {
            return Err(ValidationError::GraceBelowRequestTimeout {
                grace_ms: self.shutdown_grace_ms,
                timeout_ms: self.request_timeout_ms,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of `u` values accepted in one request
    pub max_urls: usize,
    /// Upper bound on upstream fetches in flight across all requests
    pub max_concurrent_fetches: usize,
    /// Largest upstream response body read before the fetch is failed
    pub max_body_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_urls: 100,
            max_concurrent_fetches: 256,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Limits {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_urls == 0 {
            return Err(ValidationError::ZeroLimit("max_urls"));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ValidationError::ZeroLimit("max_concurrent_fetches"));
        }
        if self.max_body_bytes == 0 {
            return Err(ValidationError::ZeroLimit("max_body_bytes"));
        }
        Ok(())
    }
}
