// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use async_trait::async_trait;
use auto_impl::auto_impl;

use crate::{config::FetchConfig, errors::FeedError, events::CorrelatedRecord};

/// Records gathered by one fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectedRecords {
    pub events: Vec<CorrelatedRecord>,
    /// Lowest block covered by the fetch. The next fetch continues below it.
    pub last_checked_block: u64,
}

/// A strategy for gathering correlated records, newest first.
#[async_trait]
#[auto_impl(Arc)]
pub trait RecordSource: Send + Sync {
    fn name(&self) -> String;

    /// Gather at least `target` records at or below `start_block` (or the newest block when
    /// `None`), unless the source runs out first.
    async fn fetch_until_enough(
        &self,
        config: &FetchConfig,
        target: usize,
        start_block: Option<u64>,
    ) -> Result<CollectedRecords, FeedError>;
}

/// Tries the indexed source first and falls back to scanning the node.
///
/// There is no circuit breaker: every call tries the indexed source again.
#[derive(Clone, Default)]
pub struct FetchOrchestrator {
    indexed: Option<Arc<dyn RecordSource>>,
    fallback: Option<Arc<dyn RecordSource>>,
}

impl FetchOrchestrator {
    pub fn new(
        indexed: Option<Arc<dyn RecordSource>>,
        fallback: Option<Arc<dyn RecordSource>>,
    ) -> Self {
        Self { indexed, fallback }
    }

    async fn fetch_fallback(
        &self,
        config: &FetchConfig,
        target: usize,
        start_block: Option<u64>,
    ) -> Result<CollectedRecords, FeedError> {
        let fallback = self.fallback.as_ref().ok_or(FeedError::NoFetchSource)?;
        tracing::debug!("Fetching {target} records from {}", fallback.name());
        fallback.fetch_until_enough(config, target, start_block).await
    }
}

#[async_trait]
impl RecordSource for FetchOrchestrator {
    fn name(&self) -> String {
        let names: Vec<String> =
            self.indexed.iter().chain(self.fallback.iter()).map(|source| source.name()).collect();
        format!("orchestrator[{}]", names.join(", "))
    }

    async fn fetch_until_enough(
        &self,
        config: &FetchConfig,
        target: usize,
        start_block: Option<u64>,
    ) -> Result<CollectedRecords, FeedError> {
        let indexed = match &self.indexed {
            Some(indexed) if config.use_graphql => indexed,
            _ => return self.fetch_fallback(config, target, start_block).await,
        };

        match indexed.fetch_until_enough(config, target, start_block).await {
            Ok(collected) => {
                tracing::debug!(
                    "{} returned {} records down to block {}",
                    indexed.name(),
                    collected.events.len(),
                    collected.last_checked_block
                );
                Ok(collected)
            }
            Err(err) if self.fallback.is_some() => {
                tracing::warn!("{} failed, falling back: {err}", indexed.name());
                self.fetch_fallback(config, target, start_block).await
            }
            Err(err) => {
                tracing::error!("{} failed with no fallback: {err}", indexed.name());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{record, MockSource, SourceCall, CONTRACT};
    use tracing_test::traced_test;

    fn config() -> FetchConfig {
        FetchConfig::new("http://node", CONTRACT)
    }

    #[tokio::test]
    #[traced_test]
    async fn falls_back_once_with_identical_arguments() {
        let indexed = Arc::new(MockSource::failing("indexed"));
        let fallback = Arc::new(MockSource::new("rpc", vec![record(1, 1, 10)]));
        let orchestrator = FetchOrchestrator::new(Some(indexed.clone()), Some(fallback.clone()));

        let config = config().with_pagination_offset(3);
        let collected = orchestrator.fetch_until_enough(&config, 25, Some(99)).await.unwrap();

        assert_eq!(collected.events, vec![record(1, 1, 10)]);
        let expected = SourceCall { config, target: 25, start_block: Some(99) };
        assert_eq!(indexed.calls(), vec![expected.clone()]);
        assert_eq!(fallback.calls(), vec![expected]);
        assert!(logs_contain("indexed failed, falling back"));
    }

    #[tokio::test]
    async fn uses_indexed_when_healthy() {
        let indexed = Arc::new(MockSource::new("indexed", vec![record(1, 1, 10)]));
        let fallback = Arc::new(MockSource::new("rpc", vec![]));
        let orchestrator = FetchOrchestrator::new(Some(indexed.clone()), Some(fallback.clone()));

        let collected = orchestrator.fetch_until_enough(&config(), 5, None).await.unwrap();
        assert_eq!(collected.events.len(), 1);
        assert!(fallback.calls().is_empty());

        // Retried on every call.
        indexed.set_failing(true);
        orchestrator.fetch_until_enough(&config(), 5, None).await.unwrap();
        orchestrator.fetch_until_enough(&config(), 5, None).await.unwrap();
        assert_eq!(indexed.calls().len(), 3);
        assert_eq!(fallback.calls().len(), 2);
    }

    #[tokio::test]
    async fn graphql_disabled_goes_straight_to_fallback() {
        let indexed = Arc::new(MockSource::new("indexed", vec![]));
        let fallback = Arc::new(MockSource::new("rpc", vec![record(1, 1, 10)]));
        let orchestrator = FetchOrchestrator::new(Some(indexed.clone()), Some(fallback.clone()));

        orchestrator.fetch_until_enough(&config().with_use_graphql(false), 5, None).await.unwrap();
        assert!(indexed.calls().is_empty());
        assert_eq!(fallback.calls().len(), 1);
    }

    #[tokio::test]
    async fn errors_without_fallback() {
        let indexed = Arc::new(MockSource::failing("indexed"));
        let orchestrator = FetchOrchestrator::new(Some(indexed), None);
        let err = orchestrator.fetch_until_enough(&config(), 5, None).await.unwrap_err();
        assert!(matches!(err, FeedError::IndexQuery(_)));

        let empty = FetchOrchestrator::default();
        let err = empty.fetch_until_enough(&config(), 5, None).await.unwrap_err();
        assert!(matches!(err, FeedError::NoFetchSource));
        assert_eq!(empty.name(), "orchestrator[]");
    }
}
