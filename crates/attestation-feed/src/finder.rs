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

//! Search for the most recent block in which the registry emitted anything.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use alloy::primitives::Address;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::FeedError,
    node::{LedgerNode, LogQuery},
    pool::BoundedTaskPool,
};

/// Inclusive block range `[from, to]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
    pub step: u64,
}

/// Split `[0, latest]` into contiguous ranges of `step` blocks, newest first.
///
/// The last range is shorter when `latest + 1` is not a multiple of `step`.
pub fn block_ranges(latest: u64, step: u64) -> Vec<BlockRange> {
    let step = step.max(1);
    let mut ranges = Vec::with_capacity((latest / step + 1) as usize);
    let mut to = latest;
    loop {
        let from = to.saturating_sub(step - 1);
        ranges.push(BlockRange { from, to, step });
        if from == 0 {
            break;
        }
        to = from - 1;
    }
    ranges
}

/// Scans windows below the chain head in parallel and stops at the first window with logs.
///
/// Every check shares a cancellation token. The first check to see logs raises the shared best
/// block and cancels the rest, including checks of newer windows that are still in flight. An
/// older window answering first therefore wins over a newer one; callers get *an* active block,
/// not necessarily the latest.
pub struct LatestActiveBlockFinder {
    node: Arc<dyn LedgerNode>,
    pool: BoundedTaskPool,
    window: u64,
}

impl LatestActiveBlockFinder {
    pub fn new(node: Arc<dyn LedgerNode>, window: u64, concurrency: usize) -> Self {
        Self { node, pool: BoundedTaskPool::new(concurrency), window: window.max(1) }
    }

    /// Returns 0 when no window has logs for `contract`. `latest` defaults to the chain head.
    pub async fn find(&self, contract: Address, latest: Option<u64>) -> Result<u64, FeedError> {
        let latest = match latest {
            Some(latest) => latest,
            None => self.node.block_number().await?,
        };
        let ranges = block_ranges(latest, self.window);
        tracing::debug!("Searching {} windows below block {latest} for activity", ranges.len());

        let best = AtomicU64::new(0);
        let cancel = CancellationToken::new();
        let checks = ranges.into_iter().map(|range| self.check(contract, range, &best, &cancel));
        let results = self.pool.execute_all(checks).await;
        if let Some(err) = results.into_iter().find_map(Result::err) {
            tracing::error!("Latest active block search failed: {err}");
            return Err(err);
        }

        let found = best.load(Ordering::SeqCst);
        tracing::info!("Latest active block of {contract}: {found}");
        Ok(found)
    }

    async fn check(
        &self,
        contract: Address,
        range: BlockRange,
        best: &AtomicU64,
        cancel: &CancellationToken,
    ) -> Result<u64, FeedError> {
        if cancel.is_cancelled() || best.load(Ordering::SeqCst) > range.to {
            return Ok(0);
        }

        let query = LogQuery::new(contract, range.from, range.to);
        let logs = tokio::select! {
            _ = cancel.cancelled() => return Ok(0),
            logs = self.node.logs(&query) => logs,
        };
        let logs = match logs {
            Ok(logs) => logs,
            Err(err) => {
                cancel.cancel();
                return Err(err);
            }
        };
        if cancel.is_cancelled() {
            return Ok(0);
        }

        let Some(newest) = logs.iter().filter_map(|log| log.block_number).max() else {
            return Ok(0);
        };
        tracing::debug!("Found activity at block {newest} in [{}, {}]", range.from, range.to);
        best.fetch_max(newest, Ordering::SeqCst);
        cancel.cancel();
        Ok(newest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        contracts::RecordLevel,
        test_utils::{data_log, MockNode, CONTRACT},
    };
    use std::time::Duration;
    use tracing_test::traced_test;

    #[test]
    fn ranges_cover_zero_to_latest() {
        let ranges = block_ranges(29_999, 10_000);
        assert_eq!(
            ranges.iter().map(|r| (r.from, r.to)).collect::<Vec<_>>(),
            vec![(20_000, 29_999), (10_000, 19_999), (0, 9_999)]
        );

        let ranges = block_ranges(25, 10);
        assert_eq!(
            ranges.iter().map(|r| (r.from, r.to)).collect::<Vec<_>>(),
            vec![(16, 25), (6, 15), (0, 5)]
        );
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].to + 1, pair[0].from);
        }

        assert_eq!(block_ranges(0, 10), vec![BlockRange { from: 0, to: 0, step: 10 }]);
    }

    #[tokio::test]
    #[traced_test]
    async fn newest_window_wins_when_answering_first() {
        let node = Arc::new(MockNode::new(29_999));
        node.push_log(data_log(RecordLevel::Attestation, 25_000, 1, 1));
        node.push_log(data_log(RecordLevel::Attestation, 5_000, 1, 2));

        let finder = LatestActiveBlockFinder::new(node.clone(), 10_000, 5);
        assert_eq!(finder.find(CONTRACT, None).await.unwrap(), 25_000);
    }

    #[tokio::test]
    async fn skips_windows_below_best() {
        let node = Arc::new(MockNode::new(29_999));
        node.push_log(data_log(RecordLevel::Attestation, 25_000, 1, 1));
        node.push_log(data_log(RecordLevel::Attestation, 5_000, 1, 2));

        let finder = LatestActiveBlockFinder::new(node.clone(), 10_000, 1);
        assert_eq!(finder.find(CONTRACT, None).await.unwrap(), 25_000);
        assert_eq!(node.log_calls(), 1);
    }

    #[tokio::test]
    async fn older_window_answering_first_cancels_newer() {
        let node = Arc::new(MockNode::new(29_999));
        node.push_log(data_log(RecordLevel::Attestation, 25_000, 1, 1));
        node.push_log(data_log(RecordLevel::Attestation, 5_000, 1, 2));
        node.delay_range(20_000, 29_999, Duration::from_millis(200));

        let finder = LatestActiveBlockFinder::new(node.clone(), 10_000, 5);
        assert_eq!(finder.find(CONTRACT, None).await.unwrap(), 5_000);
    }

    #[tokio::test]
    async fn scans_down_to_genesis() {
        let node = Arc::new(MockNode::new(100));
        node.push_log(data_log(RecordLevel::Attestation, 3, 1, 1));

        let finder = LatestActiveBlockFinder::new(node.clone(), 10, 1);
        assert_eq!(finder.find(CONTRACT, Some(49)).await.unwrap(), 3);
        assert_eq!(node.log_calls(), 5);
    }

    #[tokio::test]
    async fn no_activity_is_zero() {
        let node = Arc::new(MockNode::new(1_000));
        let finder = LatestActiveBlockFinder::new(node, 100, 5);
        assert_eq!(finder.find(CONTRACT, None).await.unwrap(), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn transport_errors_abort() {
        let node = Arc::new(MockNode::new(1_000));
        node.set_failing(true);
        let finder = LatestActiveBlockFinder::new(node.clone(), 100, 5);
        assert!(finder.find(CONTRACT, Some(1_000)).await.is_err());
        assert!(logs_contain("Latest active block search failed"));
    }
}
