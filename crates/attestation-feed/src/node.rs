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

//! Access to the ledger node.

use alloy::{
    network::Ethereum,
    primitives::{Address, B256},
    providers::{Provider, RootProvider},
    rpc::types::{Filter, Log},
};
use async_trait::async_trait;
use auto_impl::auto_impl;
use url::Url;

use crate::errors::FeedError;

/// A `eth_getLogs` request against one contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub from_block: u64,
    pub to_block: u64,
    /// Restrict to a single event type. `None` matches every event of the contract.
    pub event_signature: Option<B256>,
}

impl LogQuery {
    pub fn new(address: Address, from_block: u64, to_block: u64) -> Self {
        Self { address, from_block, to_block, event_signature: None }
    }

    pub fn with_event_signature(mut self, signature: B256) -> Self {
        self.event_signature = Some(signature);
        self
    }

    pub fn filter(&self) -> Filter {
        let filter = Filter::new()
            .address(self.address)
            .from_block(self.from_block)
            .to_block(self.to_block);
        match self.event_signature {
            Some(signature) => filter.event_signature(signature),
            None => filter,
        }
    }
}

/// The subset of the node RPC surface the pipeline consumes.
#[async_trait]
#[auto_impl(Arc)]
pub trait LedgerNode: Send + Sync {
    /// Current chain head.
    async fn block_number(&self) -> Result<u64, FeedError>;

    /// Logs matching `query`.
    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>, FeedError>;
}

/// [LedgerNode] backed by an alloy provider.
#[derive(Clone, Debug)]
pub struct RpcNode<P> {
    provider: P,
}

impl RpcNode<RootProvider> {
    /// Connect to a JSON-RPC endpoint over HTTP.
    pub fn http(rpc_url: Url) -> Self {
        Self::new(RootProvider::new_http(rpc_url))
    }
}

impl<P> RpcNode<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> LedgerNode for RpcNode<P>
where
    P: Provider<Ethereum> + Send + Sync + 'static,
{
    async fn block_number(&self) -> Result<u64, FeedError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>, FeedError> {
        tracing::trace!(
            "eth_getLogs {} [{}, {}] signature={:?}",
            query.address,
            query.from_block,
            query.to_block,
            query.event_signature
        );
        Ok(self.provider.get_logs(&query.filter()).await?)
    }
}
