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

//! Decoded attestation events and the records built from them.

use std::fmt;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// A data attestation: a reference to the trade record of a trader for an epoch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataEvent {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub trader_id: U256,
    pub epoch: u64,
    pub attester: Address,
    pub merkle_root: B256,
    pub cid: String,
}

/// A risk attestation: the value of one risk parameter for a trader and epoch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEvent {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub trader_id: U256,
    pub epoch: u64,
    pub attester: Address,
    pub parameter_id: U256,
    pub value: U256,
}

/// Correlation key of an attestation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub trader_id: U256,
    pub epoch: u64,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.trader_id, self.epoch)
    }
}

/// Shared accessors of data and risk events.
pub trait Attestation {
    fn trader_id(&self) -> U256;
    fn epoch(&self) -> u64;
    fn block_number(&self) -> u64;

    fn key(&self) -> RecordKey {
        RecordKey { trader_id: self.trader_id(), epoch: self.epoch() }
    }
}

impl Attestation for DataEvent {
    fn trader_id(&self) -> U256 {
        self.trader_id
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }

    fn block_number(&self) -> u64 {
        self.block_number
    }
}

impl Attestation for RiskEvent {
    fn trader_id(&self) -> U256 {
        self.trader_id
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }

    fn block_number(&self) -> u64 {
        self.block_number
    }
}

/// All data and risk attestations for one `(trader, epoch)`.
///
/// `data_events` is never empty. `block_number` is the newest block among the data events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatedRecord {
    pub trader_id: U256,
    pub epoch: u64,
    pub block_number: u64,
    pub data_events: Vec<DataEvent>,
    pub risk_events: Vec<RiskEvent>,
}

impl CorrelatedRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey { trader_id: self.trader_id, epoch: self.epoch }
    }
}

/// A correlated record as persisted in the proof cache.
pub type Proof = CorrelatedRecord;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display() {
        let key = RecordKey { trader_id: U256::from(42u64), epoch: 7 };
        assert_eq!(key.to_string(), "42-7");
    }

    #[test]
    fn record_json_round_trips_large_ids() {
        let trader_id = U256::MAX - U256::from(1u64);
        let record = CorrelatedRecord {
            trader_id,
            epoch: 3,
            block_number: 10,
            data_events: vec![DataEvent {
                transaction_hash: B256::repeat_byte(1),
                block_number: 10,
                trader_id,
                epoch: 3,
                attester: Address::repeat_byte(2),
                merkle_root: B256::repeat_byte(3),
                cid: "bafy".to_string(),
            }],
            risk_events: vec![],
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"traderId\""));
        let decoded: CorrelatedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.data_events[0].key(), record.key());
    }
}
