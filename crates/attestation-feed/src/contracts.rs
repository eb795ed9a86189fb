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

//! Interface of the attestation registry contract.

use alloy::{primitives::B256, sol, sol_types::SolEvent};
use serde::{Deserialize, Serialize};

sol! {
    #[sol(rpc, all_derives)]
    interface IAttestationRegistry {
        struct DataRecord {
            bytes32 merkleRoot;
            string cid;
        }

        struct RiskRecord {
            uint256 value;
        }

        struct RiskParameter {
            string name;
            string description;
            uint256 minValue;
            uint256 maxValue;
        }

        event AttestedToData(
            uint256 indexed traderId,
            uint256 indexed epoch,
            address indexed attester,
            DataRecord record
        );

        event AttestedToRisk(
            uint256 indexed traderId,
            uint256 indexed epoch,
            uint256 indexed parameterId,
            address attester,
            RiskRecord record
        );

        event RecordedConsensusForData(
            uint256 indexed traderId,
            uint256 indexed epoch,
            address indexed attester,
            DataRecord record
        );

        event RecordedConsensusForRisk(
            uint256 indexed traderId,
            uint256 indexed epoch,
            uint256 indexed parameterId,
            address attester,
            RiskRecord record
        );

        function getDataRecord(bytes32 key) external view returns (DataRecord memory);
        function getRiskRecord(bytes32 key, uint256 riskGroupId) external view returns (RiskRecord memory);
        function getDataGroup() external view returns (uint256);
        function getRiskGroup(uint256 riskGroupId) external view returns (uint256[] memory);
        function getRiskParameter(uint256 parameterId) external view returns (RiskParameter memory);
    }
}

/// Which side of a trader/epoch attestation an event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Data,
    Risk,
}

/// Whether to read individual attester submissions or the consensus recorded over them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLevel {
    #[default]
    Attestation,
    Consensus,
}

impl RecordLevel {
    /// Topic0 of the event emitted for `kind` at this level.
    pub fn event_signature(self, kind: EventKind) -> B256 {
        match (self, kind) {
            (RecordLevel::Attestation, EventKind::Data) => {
                IAttestationRegistry::AttestedToData::SIGNATURE_HASH
            }
            (RecordLevel::Attestation, EventKind::Risk) => {
                IAttestationRegistry::AttestedToRisk::SIGNATURE_HASH
            }
            (RecordLevel::Consensus, EventKind::Data) => {
                IAttestationRegistry::RecordedConsensusForData::SIGNATURE_HASH
            }
            (RecordLevel::Consensus, EventKind::Risk) => {
                IAttestationRegistry::RecordedConsensusForRisk::SIGNATURE_HASH
            }
        }
    }
}
