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

//! Fixtures shared by unit and integration tests.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex,
    },
    time::Duration,
};

use alloy::{
    primitives::{address, keccak256, Address, B256, U256},
    rpc::types::Log,
    sol_types::SolEvent,
    transports::TransportErrorKind,
};
use async_trait::async_trait;

use crate::{
    config::FetchConfig,
    contracts::{IAttestationRegistry, RecordLevel},
    errors::FeedError,
    events::{CorrelatedRecord, DataEvent, RiskEvent},
    node::{LedgerNode, LogQuery},
    orchestrator::{CollectedRecords, RecordSource},
    store::{KeyValueStore, StoreError},
};

pub const CONTRACT: Address = address!("0x00000000000000000000000000000000000000aa");
pub const ATTESTER: Address = address!("0x0000000000000000000000000000000000000011");

fn tx_hash(block: u64, trader: u64, epoch: u64, tag: &str) -> B256 {
    keccak256(format!("{tag}-{block}-{trader}-{epoch}"))
}

fn rpc_log(block: u64, tx: B256, data: alloy::primitives::LogData) -> Log {
    Log {
        inner: alloy::primitives::Log { address: CONTRACT, data },
        block_number: Some(block),
        transaction_hash: Some(tx),
        ..Default::default()
    }
}

/// A data log for `trader`/`epoch` in `block`, with cid `cid-{trader}-{epoch}`.
pub fn data_log(level: RecordLevel, block: u64, trader: u64, epoch: u64) -> Log {
    let record = IAttestationRegistry::DataRecord {
        merkleRoot: B256::with_last_byte(trader as u8),
        cid: format!("cid-{trader}-{epoch}"),
    };
    let (trader_id, epoch_id) = (U256::from(trader), U256::from(epoch));
    let data = match level {
        RecordLevel::Attestation => IAttestationRegistry::AttestedToData {
            traderId: trader_id,
            epoch: epoch_id,
            attester: ATTESTER,
            record,
        }
        .encode_log_data(),
        RecordLevel::Consensus => IAttestationRegistry::RecordedConsensusForData {
            traderId: trader_id,
            epoch: epoch_id,
            attester: ATTESTER,
            record,
        }
        .encode_log_data(),
    };
    rpc_log(block, tx_hash(block, trader, epoch, "data"), data)
}

/// A risk log for `trader`/`epoch` in `block`. The value is `parameter * 100`.
pub fn risk_log(level: RecordLevel, block: u64, trader: u64, epoch: u64, parameter: u64) -> Log {
    let record = IAttestationRegistry::RiskRecord { value: U256::from(parameter * 100) };
    let (trader_id, epoch_id, parameter_id) =
        (U256::from(trader), U256::from(epoch), U256::from(parameter));
    let data = match level {
        RecordLevel::Attestation => IAttestationRegistry::AttestedToRisk {
            traderId: trader_id,
            epoch: epoch_id,
            parameterId: parameter_id,
            attester: ATTESTER,
            record,
        }
        .encode_log_data(),
        RecordLevel::Consensus => IAttestationRegistry::RecordedConsensusForRisk {
            traderId: trader_id,
            epoch: epoch_id,
            parameterId: parameter_id,
            attester: ATTESTER,
            record,
        }
        .encode_log_data(),
    };
    rpc_log(block, tx_hash(block, trader, epoch, "risk"), data)
}

pub fn data_event(trader: u64, epoch: u64, block: u64) -> DataEvent {
    DataEvent {
        transaction_hash: tx_hash(block, trader, epoch, "data"),
        block_number: block,
        trader_id: U256::from(trader),
        epoch,
        attester: ATTESTER,
        merkle_root: B256::with_last_byte(trader as u8),
        cid: format!("cid-{trader}-{epoch}"),
    }
}

pub fn risk_event(trader: u64, epoch: u64, parameter: u64, block: u64) -> RiskEvent {
    RiskEvent {
        transaction_hash: tx_hash(block, trader, epoch, "risk"),
        block_number: block,
        trader_id: U256::from(trader),
        epoch,
        attester: ATTESTER,
        parameter_id: U256::from(parameter),
        value: U256::from(parameter * 100),
    }
}

/// A record with a single data event and no risk events.
pub fn record(trader: u64, epoch: u64, block: u64) -> CorrelatedRecord {
    CorrelatedRecord {
        trader_id: U256::from(trader),
        epoch,
        block_number: block,
        data_events: vec![data_event(trader, epoch, block)],
        risk_events: vec![],
    }
}

pub fn mock_transport_error() -> FeedError {
    FeedError::Rpc(TransportErrorKind::custom_str("mock node failure"))
}

/// In-memory ledger node serving a fixed set of logs.
#[derive(Default)]
pub struct MockNode {
    head: AtomicU64,
    logs: Mutex<Vec<Log>>,
    delays: Mutex<Vec<(u64, u64, Duration)>>,
    failing: AtomicBool,
    calls: Mutex<Vec<LogQuery>>,
}

impl MockNode {
    pub fn new(head: u64) -> Self {
        Self { head: AtomicU64::new(head), ..Default::default() }
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn push_log(&self, log: Log) {
        self.logs.lock().unwrap().push(log);
    }

    /// Delay `eth_getLogs` responses for queries overlapping `[from, to]`.
    pub fn delay_range(&self, from: u64, to: u64, delay: Duration) {
        self.delays.lock().unwrap().push((from, to, delay));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every `eth_getLogs` query received so far.
    pub fn calls(&self) -> Vec<LogQuery> {
        self.calls.lock().unwrap().clone()
    }

    pub fn log_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerNode for MockNode {
    async fn block_number(&self) -> Result<u64, FeedError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(mock_transport_error());
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>, FeedError> {
        self.calls.lock().unwrap().push(query.clone());

        let delay = self
            .delays
            .lock()
            .unwrap()
            .iter()
            .find(|(from, to, _)| query.to_block >= *from && query.from_block <= *to)
            .map(|(_, _, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(mock_transport_error());
        }

        let logs = self.logs.lock().unwrap();
        Ok(logs
            .iter()
            .filter(|log| log.address() == query.address)
            .filter(|log| {
                log.block_number
                    .is_some_and(|block| block >= query.from_block && block <= query.to_block)
            })
            .filter(|log| match query.event_signature {
                Some(signature) => log.topic0() == Some(&signature),
                None => true,
            })
            .cloned()
            .collect())
    }
}

/// Arguments of one [RecordSource::fetch_until_enough] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceCall {
    pub config: FetchConfig,
    pub target: usize,
    pub start_block: Option<u64>,
}

/// Record source serving a fixed set of records, newest block first.
#[derive(Default)]
pub struct MockSource {
    name: String,
    records: Mutex<Vec<CorrelatedRecord>>,
    failing: AtomicBool,
    calls: Mutex<Vec<SourceCall>>,
}

impl MockSource {
    pub fn new(name: &str, records: Vec<CorrelatedRecord>) -> Self {
        Self { name: name.to_string(), records: Mutex::new(records), ..Default::default() }
    }

    pub fn failing(name: &str) -> Self {
        let source = Self::new(name, vec![]);
        source.set_failing(true);
        source
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn push_record(&self, record: CorrelatedRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSource for MockSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn fetch_until_enough(
        &self,
        config: &FetchConfig,
        target: usize,
        start_block: Option<u64>,
    ) -> Result<CollectedRecords, FeedError> {
        self.calls.lock().unwrap().push(SourceCall { config: config.clone(), target, start_block });
        if self.failing.load(Ordering::SeqCst) {
            return Err(FeedError::IndexQuery(format!("{} failed", self.name)));
        }

        let mut records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| start_block.map_or(true, |start| r.block_number <= start))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        records.truncate(target);

        let last_checked_block = records.iter().map(|r| r.block_number).min().unwrap_or_default();
        Ok(CollectedRecords { events: records, last_checked_block })
    }
}

/// A store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get_item(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("failing store".to_string()))
    }

    async fn set_item(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("failing store".to_string()))
    }

    async fn remove_item(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("failing store".to_string()))
    }
}
