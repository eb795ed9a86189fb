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

//! Single block-range batches of attestation events from the node.

use std::sync::Arc;

use alloy::{
    primitives::{B256, U256},
    rpc::types::Log,
};

use crate::{
    config::FetchConfig,
    contracts::{EventKind, IAttestationRegistry, RecordLevel},
    errors::FeedError,
    events::{DataEvent, RiskEvent},
    node::{LedgerNode, LogQuery},
};

/// Events of one kind found in one block range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBatch<T> {
    pub events: Vec<T>,
    /// Lower bound of the scanned range. Everything from here up to the range end was checked.
    pub last_checked_block: u64,
}

#[derive(Clone)]
pub struct EventBatchFetcher {
    node: Arc<dyn LedgerNode>,
}

impl EventBatchFetcher {
    pub fn new(node: Arc<dyn LedgerNode>) -> Self {
        Self { node }
    }

    pub async fn fetch_data(
        &self,
        config: &FetchConfig,
    ) -> Result<EventBatch<DataEvent>, FeedError> {
        let logs = self.fetch_logs(config, EventKind::Data).await?;
        let events = logs
            .iter()
            .filter_map(|log| match format_data_log(log, config.level) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!("Skipping data log {:?}: {err}", log.transaction_hash);
                    None
                }
            })
            .collect();
        Ok(EventBatch { events, last_checked_block: config.from_block })
    }

    pub async fn fetch_risk(
        &self,
        config: &FetchConfig,
    ) -> Result<EventBatch<RiskEvent>, FeedError> {
        let logs = self.fetch_logs(config, EventKind::Risk).await?;
        let events = logs
            .iter()
            .filter_map(|log| match format_risk_log(log, config.level) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!("Skipping risk log {:?}: {err}", log.transaction_hash);
                    None
                }
            })
            .collect();
        Ok(EventBatch { events, last_checked_block: config.from_block })
    }

    async fn fetch_logs(
        &self,
        config: &FetchConfig,
        kind: EventKind,
    ) -> Result<Vec<Log>, FeedError> {
        let to_block = config.to_block.max(config.from_block);
        let query = LogQuery::new(config.contract_address, config.from_block, to_block)
            .with_event_signature(config.level.event_signature(kind));
        let logs = self.node.logs(&query).await?;
        tracing::debug!(
            "Fetched {} {kind:?} logs in blocks [{}, {to_block}]",
            logs.len(),
            config.from_block
        );
        Ok(logs)
    }
}

fn decode_error(err: impl std::fmt::Display) -> FeedError {
    FeedError::Decode(err.to_string())
}

fn log_position(log: &Log) -> Result<(B256, u64), FeedError> {
    let transaction_hash =
        log.transaction_hash.ok_or_else(|| decode_error("log has no transaction hash"))?;
    let block_number = log.block_number.ok_or_else(|| decode_error("log has no block number"))?;
    Ok((transaction_hash, block_number))
}

fn epoch_from(epoch: U256) -> Result<u64, FeedError> {
    u64::try_from(epoch).map_err(|_| decode_error(format!("epoch {epoch} does not fit in u64")))
}

/// Decode a data log emitted at `level` into a [DataEvent].
pub fn format_data_log(log: &Log, level: RecordLevel) -> Result<DataEvent, FeedError> {
    let (trader_id, epoch, attester, record) = match level {
        RecordLevel::Attestation => {
            let event = log
                .log_decode::<IAttestationRegistry::AttestedToData>()
                .map_err(decode_error)?
                .inner
                .data;
            (event.traderId, event.epoch, event.attester, event.record)
        }
        RecordLevel::Consensus => {
            let event = log
                .log_decode::<IAttestationRegistry::RecordedConsensusForData>()
                .map_err(decode_error)?
                .inner
                .data;
            (event.traderId, event.epoch, event.attester, event.record)
        }
    };
    let (transaction_hash, block_number) = log_position(log)?;

    Ok(DataEvent {
        transaction_hash,
        block_number,
        trader_id,
        epoch: epoch_from(epoch)?,
        attester,
        merkle_root: record.merkleRoot,
        cid: record.cid,
    })
}

/// Decode a risk log emitted at `level` into a [RiskEvent].
pub fn format_risk_log(log: &Log, level: RecordLevel) -> Result<RiskEvent, FeedError> {
    let (trader_id, epoch, parameter_id, attester, record) = match level {
        RecordLevel::Attestation => {
            let event = log
                .log_decode::<IAttestationRegistry::AttestedToRisk>()
                .map_err(decode_error)?
                .inner
                .data;
            (event.traderId, event.epoch, event.parameterId, event.attester, event.record)
        }
        RecordLevel::Consensus => {
            let event = log
                .log_decode::<IAttestationRegistry::RecordedConsensusForRisk>()
                .map_err(decode_error)?
                .inner
                .data;
            (event.traderId, event.epoch, event.parameterId, event.attester, event.record)
        }
    };
    let (transaction_hash, block_number) = log_position(log)?;

    Ok(RiskEvent {
        transaction_hash,
        block_number,
        trader_id,
        epoch: epoch_from(epoch)?,
        attester,
        parameter_id,
        value: record.value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{data_log, risk_log, MockNode, CONTRACT};
    use tracing_test::traced_test;

    fn config(from: u64, to: u64) -> FetchConfig {
        FetchConfig::new("http://node", CONTRACT).with_block_range(from, to)
    }

    #[tokio::test]
    #[traced_test]
    async fn fetches_and_formats_data_batch() {
        let node = Arc::new(MockNode::new(100));
        node.push_log(data_log(RecordLevel::Attestation, 10, 1, 3));
        node.push_log(data_log(RecordLevel::Attestation, 50, 2, 3));
        // Outside of range.
        node.push_log(data_log(RecordLevel::Attestation, 90, 3, 3));
        // Risk logs are not returned for the data selector.
        node.push_log(risk_log(RecordLevel::Attestation, 20, 1, 3, 7));

        let fetcher = EventBatchFetcher::new(node.clone());
        let batch = fetcher.fetch_data(&config(5, 60)).await.unwrap();

        assert_eq!(batch.last_checked_block, 5);
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.events[0].trader_id, U256::from(1u64));
        assert_eq!(batch.events[0].epoch, 3);
        assert_eq!(batch.events[0].block_number, 10);
        assert_eq!(batch.events[1].cid, "cid-2-3");
    }

    #[tokio::test]
    async fn consensus_level_selects_consensus_events() {
        let node = Arc::new(MockNode::new(100));
        node.push_log(risk_log(RecordLevel::Attestation, 10, 1, 3, 7));
        node.push_log(risk_log(RecordLevel::Consensus, 11, 1, 3, 8));

        let fetcher = EventBatchFetcher::new(node.clone());
        let batch =
            fetcher.fetch_risk(&config(0, 100).with_level(RecordLevel::Consensus)).await.unwrap();

        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].parameter_id, U256::from(7u64));
        assert_eq!(batch.events[0].value, U256::from(8u64 * 100));
        assert_eq!(batch.events[0].block_number, 11);
    }

    #[tokio::test]
    async fn inverted_range_is_clamped() {
        let node = Arc::new(MockNode::new(100));
        node.push_log(data_log(RecordLevel::Attestation, 40, 1, 1));

        let fetcher = EventBatchFetcher::new(node.clone());
        let batch = fetcher.fetch_data(&config(40, 10)).await.unwrap();

        assert_eq!(batch.events.len(), 1);
        let query = node.calls().pop().unwrap();
        assert_eq!((query.from_block, query.to_block), (40, 40));
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let node = Arc::new(MockNode::new(100));
        node.set_failing(true);

        let fetcher = EventBatchFetcher::new(node);
        let err = fetcher.fetch_data(&config(0, 10)).await.unwrap_err();
        assert!(err.is_transport(), "{err}");
    }

    #[tokio::test]
    #[traced_test]
    async fn undecodable_logs_are_skipped() {
        let node = Arc::new(MockNode::new(100));
        let mut broken = data_log(RecordLevel::Attestation, 10, 1, 1);
        broken.transaction_hash = None;
        node.push_log(broken);
        node.push_log(data_log(RecordLevel::Attestation, 11, 2, 1));

        let fetcher = EventBatchFetcher::new(node);
        let batch = fetcher.fetch_data(&config(0, 20)).await.unwrap();

        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].trader_id, U256::from(2u64));
        assert!(logs_contain("Skipping data log"));
    }

    #[test]
    fn formatter_rejects_wrong_event() {
        let log = risk_log(RecordLevel::Attestation, 1, 1, 1, 1);
        assert!(matches!(
            format_data_log(&log, RecordLevel::Attestation),
            Err(FeedError::Decode(_))
        ));
    }
}
