//! Fan-out of upstream fetches and collection against one overall deadline.

use crate::config::{Limits, MergeStrategyKind, Timeouts};
use crate::errors::{FetchError, Result};
use crate::fetcher::Fetcher;
use crate::metrics_defs::{UPSTREAM_ABANDONED, UPSTREAM_FETCHES};
use crate::strategy::MergeStrategy;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, sleep_until};
use url::Url;

type FetchOutcome = (Url, std::result::Result<Vec<i64>, FetchError>);

/// Lifecycle of one aggregation.
///
/// `Running` moves to `Finalized` once every fetch has reported, or to
/// `Draining` when the deadline fires first. While draining, fetches that
/// already finished are still merged and the rest are aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionState {
    Running,
    Draining,
    Finalized,
}

/// Orchestrates concurrent upstream fetches for a request.
///
/// Fetches run one task each on a `JoinSet`. A process-wide semaphore bounds
/// how many of them are talking to upstreams at once. The deadline is armed
/// once per request, before anything is spawned.
#[derive(Clone)]
pub struct Aggregator {
    fetcher: Fetcher,
    permits: Arc<Semaphore>,
    timeouts: Timeouts,
}

impl Aggregator {
    pub fn new(fetcher: Fetcher, timeouts: Timeouts, limits: &Limits) -> Self {
        Self {
            fetcher,
            permits: Arc::new(Semaphore::new(limits.max_concurrent_fetches)),
            timeouts,
        }
    }

    /// Fetches every URL and merges whatever arrives before the deadline.
    ///
    /// Upstream failures are logged and left out of the result; they never
    /// fail the call. The only error is a failure to finalize the merge.
    pub async fn aggregate(&self, urls: Vec<Url>, kind: MergeStrategyKind) -> Result<Vec<i64>> {
        let deadline = Instant::now() + self.timeouts.overall_deadline(kind);
        let mut strategy = kind.build(urls.len());
        let mut join_set = self.spawn_fetches(urls);
        let mut failures = Vec::new();

        let mut state = CollectionState::Running;
        let deadline = sleep_until(deadline);
        tokio::pin!(deadline);

        while state == CollectionState::Running {
            tokio::select! {
                _ = &mut deadline => {
                    state = CollectionState::Draining;
                }
                joined = join_set.join_next() => {
                    match joined {
                        Some(joined) => record(joined, strategy.as_mut(), &mut failures).await,
                        None => state = CollectionState::Finalized,
                    }
                }
            }
        }

        if state == CollectionState::Draining {
            let abandoned = drain(&mut join_set, strategy.as_mut(), &mut failures).await;
            tracing::debug!(
                abandoned,
                strategy = strategy.name(),
                "deadline reached, aborted outstanding fetches"
            );
            state = CollectionState::Finalized;
        }
        debug_assert_eq!(state, CollectionState::Finalized);

        if !failures.is_empty() {
            tracing::warn!(
                failed = failures.len(),
                "upstream fetches failed: {}",
                failures.join("; ")
            );
        }

        strategy.finalize().await
    }

    fn spawn_fetches(&self, urls: Vec<Url>) -> JoinSet<FetchOutcome> {
        let mut join_set = JoinSet::new();

        for url in urls {
            let fetcher = self.fetcher.clone();
            let permits = self.permits.clone();

            join_set.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => fetcher.fetch(&url).await,
                    Err(_) => Err(FetchError::Closed {
                        url: url.to_string(),
                    }),
                };
                (url, result)
            });
        }

        join_set
    }
}

/// Feeds one finished fetch into the strategy or the failure list.
async fn record(
    joined: std::result::Result<FetchOutcome, JoinError>,
    strategy: &mut dyn MergeStrategy,
    failures: &mut Vec<String>,
) {
    match joined {
        Ok((url, Ok(numbers))) => {
            tracing::debug!(%url, count = numbers.len(), "upstream answered");
            shared::counter!(UPSTREAM_FETCHES, "outcome" => "ok").increment(1);
            strategy.accept(numbers).await;
        }
        Ok((_, Err(e))) => {
            tracing::debug!(error = %e, "upstream fetch failed");
            shared::counter!(UPSTREAM_FETCHES, "outcome" => e.kind()).increment(1);
            failures.push(e.to_string());
        }
        Err(e) => {
            tracing::error!("Fetch task failed: {e}");
            failures.push(format!("fetch task failed: {e}"));
        }
    }
}

/// Aborts every outstanding fetch, keeping results that had already finished.
///
/// Returns how many fetches were abandoned.
async fn drain(
    join_set: &mut JoinSet<FetchOutcome>,
    strategy: &mut dyn MergeStrategy,
    failures: &mut Vec<String>,
) -> usize {
    join_set.abort_all();

    let mut abandoned = 0;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Err(e) if e.is_cancelled() => abandoned += 1,
            joined => record(joined, strategy, failures).await,
        }
    }

    if abandoned > 0 {
        shared::counter!(UPSTREAM_ABANDONED).increment(abandoned as u64);
    }
    abandoned
}
