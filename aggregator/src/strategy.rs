//! Merge strategies driven by the aggregator.
//!
//! Both strategies produce the same result for the same set of accepted
//! lists. They differ only in when the merging work happens.

use crate::config::MergeStrategyKind;
use crate::errors::{AggregatorError, Result};
use crate::merger;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[async_trait]
pub trait MergeStrategy: Send {
    fn name(&self) -> &'static str;

    /// Hands one successfully fetched list to the strategy.
    async fn accept(&mut self, numbers: Vec<i64>);

    /// Consumes the strategy and returns the sorted, duplicate-free result.
    ///
    /// Every list accepted before this call is included.
    async fn finalize(self: Box<Self>) -> Result<Vec<i64>>;
}

impl MergeStrategyKind {
    /// Builds a fresh strategy for one request expecting `upstreams` lists.
    pub fn build(self, upstreams: usize) -> Box<dyn MergeStrategy> {
        match self {
            MergeStrategyKind::Incremental => Box::new(IncrementalMerge::new(upstreams)),
            MergeStrategyKind::Batch => Box::new(BatchMerge::with_capacity(upstreams)),
        }
    }
}

/// Merges every list as soon as it arrives.
///
/// The merged set is owned by a single worker task fed over a channel, so it
/// is never shared. Closing the channel lets the worker drain whatever is
/// still queued before it hands back the set.
pub struct IncrementalMerge {
    sender: mpsc::Sender<Vec<i64>>,
    worker: JoinHandle<Vec<i64>>,
}

impl IncrementalMerge {
    pub fn new(upstreams: usize) -> Self {
        // One slot per upstream, sends never wait on the worker
        let (sender, mut receiver) = mpsc::channel::<Vec<i64>>(upstreams.max(1));

        let worker = tokio::spawn(async move {
            let mut merged = Vec::new();
            while let Some(numbers) = receiver.recv().await {
                merged = merger::merge(merged, numbers);
            }
            merged
        });

        Self { sender, worker }
    }
}

#[async_trait]
impl MergeStrategy for IncrementalMerge {
    fn name(&self) -> &'static str {
        MergeStrategyKind::Incremental.as_str()
    }

    async fn accept(&mut self, numbers: Vec<i64>) {
        if self.sender.send(numbers).await.is_err() {
            tracing::error!("merge worker stopped before the request was finalized");
        }
    }

    async fn finalize(self: Box<Self>) -> Result<Vec<i64>> {
        let IncrementalMerge { sender, worker } = *self;
        drop(sender);

        worker
            .await
            .map_err(|e| AggregatorError::InternalError(format!("merge worker failed: {e}")))
    }
}

/// Buffers raw lists and merges them in one pass at the end.
#[derive(Default)]
pub struct BatchMerge {
    lists: Vec<Vec<i64>>,
}

impl BatchMerge {
    pub fn with_capacity(upstreams: usize) -> Self {
        Self {
            lists: Vec::with_capacity(upstreams),
        }
    }
}

#[async_trait]
impl MergeStrategy for BatchMerge {
    fn name(&self) -> &'static str {
        MergeStrategyKind::Batch.as_str()
    }

    async fn accept(&mut self, numbers: Vec<i64>) {
        self.lists.push(numbers);
    }

    async fn finalize(self: Box<Self>) -> Result<Vec<i64>> {
        Ok(merger::merge_all(self.lists))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(kind: MergeStrategyKind, lists: Vec<Vec<i64>>) -> Vec<i64> {
        let mut strategy = kind.build(lists.len());
        for numbers in lists {
            strategy.accept(numbers).await;
        }
        strategy.finalize().await.unwrap()
    }

    #[tokio::test]
    async fn test_strategies_agree() {
        let lists = vec![vec![3, 1, 2], vec![2, 4], vec![], vec![5, 5, 6], vec![-1]];

        let incremental = run(MergeStrategyKind::Incremental, lists.clone()).await;
        let batch = run(MergeStrategyKind::Batch, lists).await;

        assert_eq!(incremental, vec![-1, 1, 2, 3, 4, 5, 6]);
        assert_eq!(incremental, batch);
    }

    #[tokio::test]
    async fn test_finalize_without_input() {
        assert!(run(MergeStrategyKind::Incremental, vec![]).await.is_empty());
        assert!(run(MergeStrategyKind::Batch, vec![]).await.is_empty());
    }

    #[tokio::test]
    async fn test_incremental_drains_queued_lists() {
        // More lists than channel slots are accepted before finalizing
        let mut strategy = IncrementalMerge::new(1);
        for n in 0..20 {
            strategy.accept(vec![n % 7, n]).await;
        }
        let merged = Box::new(strategy).finalize().await.unwrap();
        assert_eq!(merged, (0..20).collect::<Vec<i64>>());
    }

    #[test]
    fn test_names() {
        assert_eq!(BatchMerge::default().name(), "batch");
    }
}
