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

//! Backward scan of the node for correlated records.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    cache::BlockPointerCache,
    config::{FetchConfig, FetchSettings},
    correlator::correlate,
    errors::FeedError,
    fetcher::EventBatchFetcher,
    finder::LatestActiveBlockFinder,
    node::LedgerNode,
    orchestrator::{CollectedRecords, RecordSource},
    pool::BoundedTaskPool,
};

/// Walks the chain backwards in `block_step` windows, fetching data and risk events of each
/// window side by side, until enough records are found, genesis is reached, or too many windows
/// in a row came back empty.
pub struct PaginatedEventCollector {
    fetcher: EventBatchFetcher,
    finder: LatestActiveBlockFinder,
    pointers: BlockPointerCache,
    pool: BoundedTaskPool,
    block_step: u64,
    max_empty_batches: u32,
}

impl PaginatedEventCollector {
    pub fn new(
        node: Arc<dyn LedgerNode>,
        pointers: BlockPointerCache,
        settings: &FetchSettings,
    ) -> Self {
        Self {
            fetcher: EventBatchFetcher::new(node.clone()),
            finder: LatestActiveBlockFinder::new(
                node,
                settings.search_window_blocks,
                settings.block_scan_concurrency,
            ),
            pointers,
            pool: BoundedTaskPool::new(settings.batch_concurrency),
            block_step: settings.block_step.max(1),
            max_empty_batches: settings.max_empty_batches,
        }
    }

    /// Explicit start, else the cached pointer, else a fresh search.
    async fn start_pointer(&self, config: &FetchConfig) -> Result<u64, FeedError> {
        if let Some(block) = self.pointers.get(&config.endpoint, config.contract_address).await {
            tracing::debug!("Starting scan at cached block {block}");
            return Ok(block);
        }

        let block = self.finder.find(config.contract_address, None).await?;
        if block > 0 {
            self.pointers.set(&config.endpoint, config.contract_address, block).await;
        }
        Ok(block)
    }

    /// Only ever moves the stored pointer forward. Scans of older pages leave it alone.
    async fn remember(&self, config: &FetchConfig, block: u64) {
        let current = self.pointers.get(&config.endpoint, config.contract_address).await;
        if current.map_or(true, |current| block > current) {
            self.pointers.set(&config.endpoint, config.contract_address, block).await;
        }
    }

    /// Collect at least `target` records at or below `start_block` (or the cached or searched
    /// latest active block).
    ///
    /// Windows with records store their upper bound as the block pointer only when it is newer
    /// than the cached one. Scans of older pages therefore do not refresh the pointer's TTL.
    pub async fn collect(
        &self,
        config: &FetchConfig,
        target: usize,
        start_block: Option<u64>,
    ) -> Result<CollectedRecords, FeedError> {
        let mut pointer = match start_block {
            Some(block) => block,
            None => self.start_pointer(config).await?,
        };
        let mut last_checked_block = pointer;
        let mut events = Vec::new();
        let mut empty_batches = 0u32;

        while pointer > 0 && empty_batches < self.max_empty_batches && events.len() < target {
            let range = config.with_block_range(pointer.saturating_sub(self.block_step), pointer);
            let (data, risk) = tokio::try_join!(
                self.pool.execute(self.fetcher.fetch_data(&range)),
                self.pool.execute(self.fetcher.fetch_risk(&range)),
            )?;

            let records = correlate(&data.events, &risk.events);
            if records.is_empty() {
                empty_batches += 1;
            } else {
                tracing::debug!(
                    "Found {} records in blocks [{}, {pointer}]",
                    records.len(),
                    range.from_block
                );
                empty_batches = 0;
                events.extend(records);
                self.remember(config, pointer).await;
            }

            last_checked_block = data.last_checked_block.min(risk.last_checked_block);
            pointer = last_checked_block.saturating_sub(1);
        }

        if empty_batches >= self.max_empty_batches {
            tracing::info!("Stopped scan after {empty_batches} empty batches at block {pointer}");
        }
        tracing::info!("Collected {} records down to block {last_checked_block}", events.len());
        Ok(CollectedRecords { events, last_checked_block })
    }
}

#[async_trait]
impl RecordSource for PaginatedEventCollector {
    fn name(&self) -> String {
        "rpc".to_string()
    }

    async fn fetch_until_enough(
        &self,
        config: &FetchConfig,
        target: usize,
        start_block: Option<u64>,
    ) -> Result<CollectedRecords, FeedError> {
        self.collect(config, target, start_block).await
    }
}
