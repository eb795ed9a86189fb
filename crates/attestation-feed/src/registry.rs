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

//! Typed reads of the attestation registry state.

use alloy::{
    network::Ethereum,
    primitives::{keccak256, Address, B256, U256},
    providers::Provider,
    sol_types::SolValue,
};
use serde::Serialize;

use crate::{
    contracts::IAttestationRegistry::{self, DataRecord, IAttestationRegistryInstance, RiskRecord},
    errors::FeedError,
    pool::BoundedTaskPool,
};

/// Storage key of the records of `trader_id` for `epoch`: `keccak256(abi.encode(traderId, epoch))`.
pub fn record_key(trader_id: U256, epoch: u64) -> B256 {
    keccak256((trader_id, U256::from(epoch)).abi_encode())
}

/// A risk parameter definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskParameterInfo {
    pub id: U256,
    pub name: String,
    pub description: String,
    pub min_value: U256,
    pub max_value: U256,
}

/// Stored data record of a trader and epoch, with an optional risk value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInfo {
    pub key: B256,
    pub trader_id: U256,
    pub epoch: u64,
    pub merkle_root: B256,
    pub cid: String,
    pub risk_group_id: Option<U256>,
    pub risk_value: Option<U256>,
}

pub struct AttestationRegistry<P> {
    instance: IAttestationRegistryInstance<P>,
    pool: BoundedTaskPool,
}

impl<P> AttestationRegistry<P>
where
    P: Provider<Ethereum> + Clone,
{
    pub fn new(address: Address, provider: P) -> Self {
        Self {
            instance: IAttestationRegistry::new(address, provider),
            pool: BoundedTaskPool::default(),
        }
    }

    pub fn address(&self) -> &Address {
        self.instance.address()
    }

    pub async fn data_record(&self, trader_id: U256, epoch: u64) -> Result<DataRecord, FeedError> {
        let key = record_key(trader_id, epoch);
        Ok(self.instance.getDataRecord(key).call().await?)
    }

    pub async fn risk_record(
        &self,
        trader_id: U256,
        epoch: u64,
        risk_group_id: U256,
    ) -> Result<RiskRecord, FeedError> {
        let key = record_key(trader_id, epoch);
        Ok(self.instance.getRiskRecord(key, risk_group_id).call().await?)
    }

    pub async fn data_group(&self) -> Result<U256, FeedError> {
        Ok(self.instance.getDataGroup().call().await?)
    }

    /// Parameter ids of a risk group.
    pub async fn risk_group(&self, risk_group_id: U256) -> Result<Vec<U256>, FeedError> {
        Ok(self.instance.getRiskGroup(risk_group_id).call().await?)
    }

    pub async fn risk_parameter(&self, parameter_id: U256) -> Result<RiskParameterInfo, FeedError> {
        let parameter = self.instance.getRiskParameter(parameter_id).call().await?;
        Ok(RiskParameterInfo {
            id: parameter_id,
            name: parameter.name,
            description: parameter.description,
            min_value: parameter.minValue,
            max_value: parameter.maxValue,
        })
    }

    /// Definitions of every parameter in a risk group, in group order.
    pub async fn risk_parameters(
        &self,
        risk_group_id: U256,
    ) -> Result<Vec<RiskParameterInfo>, FeedError> {
        let ids = self.risk_group(risk_group_id).await?;
        tracing::debug!("Risk group {risk_group_id} has {} parameters", ids.len());
        self.pool
            .execute_all(ids.into_iter().map(|id| self.risk_parameter(id)))
            .await
            .into_iter()
            .collect()
    }

    /// The data record of `(trader_id, epoch)` and, when `risk_group_id` is given, its risk
    /// record in that group.
    pub async fn record(
        &self,
        trader_id: U256,
        epoch: u64,
        risk_group_id: Option<U256>,
    ) -> Result<RecordInfo, FeedError> {
        let data = self.data_record(trader_id, epoch).await?;
        let risk_value = match risk_group_id {
            Some(group) => Some(self.risk_record(trader_id, epoch, group).await?.value),
            None => None,
        };
        Ok(RecordInfo {
            key: record_key(trader_id, epoch),
            trader_id,
            epoch,
            merkle_root: data.merkleRoot,
            cid: data.cid,
            risk_group_id,
            risk_value,
        })
    }
}
