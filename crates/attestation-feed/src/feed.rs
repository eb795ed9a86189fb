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

//! Wiring of the pipeline from a [FeedConfig].

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};

use crate::{
    cache::{BlockPointerCache, ProofCache},
    collector::PaginatedEventCollector,
    config::{FeedConfig, FetchConfig},
    indexed::IndexedQuerySource,
    node::{LedgerNode, RpcNode},
    orchestrator::{FetchOrchestrator, RecordSource},
    pagination::{Page, ProofPaginationController},
    store::{store_from_dir, KeyValueStore},
};

/// A fully wired attestation feed: node scan fallback, optional index, caches and paging.
pub struct AttestationFeed {
    controller: Arc<ProofPaginationController>,
    proofs: Arc<ProofCache>,
    fetch_config: FetchConfig,
}

impl AttestationFeed {
    /// Build the feed over an existing node and store.
    pub fn new(
        config: &FeedConfig,
        node: Arc<dyn LedgerNode>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        config.validate()?;
        let fetch_config = fetch_config(config)?;

        let pointers = BlockPointerCache::new(store.clone(), config.cache.pointer_ttl());
        let collector: Arc<dyn RecordSource> =
            Arc::new(PaginatedEventCollector::new(node, pointers, &config.fetch));

        let indexed: Option<Arc<dyn RecordSource>> = match &config.indexer.url {
            Some(url) => {
                tracing::info!("Using event index at {url}");
                Some(Arc::new(
                    IndexedQuerySource::new(url.clone())
                        .context("Failed to build index client")?,
                ))
            }
            None => None,
        };
        let source: Arc<dyn RecordSource> =
            Arc::new(FetchOrchestrator::new(indexed, Some(collector)));

        let proofs = Arc::new(ProofCache::new(store, config.cache.namespace.clone()));
        let controller = Arc::new(ProofPaginationController::new(
            source,
            proofs.clone(),
            fetch_config.clone(),
            &config.pagination,
        ));

        Ok(Self { controller, proofs, fetch_config })
    }

    /// Build the feed against the configured JSON-RPC endpoint, persisting to `cache.dir` when
    /// set.
    pub fn connect(config: &FeedConfig) -> Result<Self> {
        let rpc_url = config.rpc.url.clone().context("rpc.url is not set")?;
        let node: Arc<dyn LedgerNode> = Arc::new(RpcNode::http(rpc_url));
        let store = store_from_dir(config.cache.dir.as_deref());
        Self::new(config, node, store)
    }

    pub fn controller(&self) -> &Arc<ProofPaginationController> {
        &self.controller
    }

    pub fn proofs(&self) -> &Arc<ProofCache> {
        &self.proofs
    }

    pub fn fetch_config(&self) -> &FetchConfig {
        &self.fetch_config
    }

    /// Move to `page`, fetching what it is missing, and return it.
    pub async fn page(&self, page: usize) -> Page {
        self.controller.handle_page_change(page).await;
        self.controller.get_page(page).await
    }
}

/// The per-call fetch parameters implied by `config`.
pub fn fetch_config(config: &FeedConfig) -> Result<FetchConfig> {
    let contract: Address =
        config.rpc.contract_address.context("rpc.contract_address is not set")?;
    // The endpoint only keys the block pointer cache, so an unset url still works with an
    // injected node.
    let endpoint = config.rpc.url.as_ref().map(|url| url.to_string()).unwrap_or_default();

    Ok(FetchConfig::new(endpoint, contract)
        .with_use_graphql(config.indexer.use_graphql)
        .with_level(config.fetch.level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RecordLevel,
        store::MemoryStore,
        test_utils::{data_log, risk_log, MockNode, CONTRACT},
    };

    fn config() -> FeedConfig {
        let mut config = FeedConfig::default();
        config.rpc.url = Some("http://localhost:8545".parse().unwrap());
        config.rpc.contract_address = Some(CONTRACT);
        config.fetch.block_step = 100;
        config.pagination.page_size = 2;
        config
    }

    #[test]
    fn fetch_config_from_settings() {
        let mut config = config();
        config.indexer.use_graphql = false;
        config.fetch.level = RecordLevel::Consensus;

        let fetch = fetch_config(&config).unwrap();
        assert_eq!(fetch.endpoint, "http://localhost:8545/");
        assert_eq!(fetch.contract_address, CONTRACT);
        assert!(!fetch.use_graphql);
        assert_eq!(fetch.level, RecordLevel::Consensus);

        config.rpc.contract_address = None;
        assert!(fetch_config(&config).is_err());
    }

    #[tokio::test]
    async fn serves_pages_from_node_without_index() {
        let node = Arc::new(MockNode::new(1_000));
        for (epoch, block) in [(1u64, 310u64), (2, 520), (3, 730)] {
            node.push_log(data_log(RecordLevel::Attestation, block, 7, epoch));
            node.push_log(risk_log(RecordLevel::Attestation, block, 7, epoch, 1));
        }

        let feed =
            AttestationFeed::new(&config(), node, Arc::new(MemoryStore::default())).unwrap();
        let page = feed.page(0).await;
        assert_eq!(page.proofs.iter().map(|p| p.epoch).collect::<Vec<_>>(), vec![3, 2]);

        let page = feed.page(1).await;
        assert_eq!(page.proofs.iter().map(|p| p.epoch).collect::<Vec<_>>(), vec![1]);
        assert_eq!(page.total_items, 3);
        assert_eq!(feed.controller().current_page(), 1);
    }
}
