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

//! Configuration of the attestation feed.
//!
//! [FeedConfig] is the long-lived settings file. [FetchConfig] is the per-call value handed to
//! the fetch strategies; it is never mutated in place, only derived with the `with_*` builders.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

pub use crate::contracts::RecordLevel;

pub mod defaults {
    pub const fn use_graphql() -> bool {
        true
    }

    pub const fn block_step() -> u64 {
        1_000
    }

    pub const fn max_empty_batches() -> u32 {
        200
    }

    /// Width of the ranges probed when searching for the latest active block.
    pub const fn search_window_blocks() -> u64 {
        10_000
    }

    pub const fn block_scan_concurrency() -> usize {
        5
    }

    /// Data and risk batches of one range are fetched side by side.
    pub const fn batch_concurrency() -> usize {
        2
    }

    pub const fn pointer_ttl_secs() -> u64 {
        10 * 60
    }

    pub fn namespace() -> String {
        "attestations".to_string()
    }

    pub const fn page_size() -> usize {
        25
    }

    pub const fn refresh_interval_secs() -> u64 {
        10 * 60
    }
}

/// Node RPC settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint of the ledger node.
    pub url: Option<Url>,
    /// Address of the attestation registry contract.
    pub contract_address: Option<Address>,
}

/// GraphQL index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// GraphQL endpoint of the event index. Without it only the node is queried.
    pub url: Option<Url>,
    /// Try the index before scanning the node.
    #[serde(default = "defaults::use_graphql")]
    pub use_graphql: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self { url: None, use_graphql: defaults::use_graphql() }
    }
}

/// Node scanning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "defaults::block_step")]
    pub block_step: u64,
    #[serde(default = "defaults::max_empty_batches")]
    pub max_empty_batches: u32,
    #[serde(default = "defaults::search_window_blocks")]
    pub search_window_blocks: u64,
    #[serde(default = "defaults::block_scan_concurrency")]
    pub block_scan_concurrency: usize,
    #[serde(default = "defaults::batch_concurrency")]
    pub batch_concurrency: usize,
    #[serde(default)]
    pub level: RecordLevel,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            block_step: defaults::block_step(),
            max_empty_batches: defaults::max_empty_batches(),
            search_window_blocks: defaults::search_window_blocks(),
            block_scan_concurrency: defaults::block_scan_concurrency(),
            batch_concurrency: defaults::batch_concurrency(),
            level: RecordLevel::default(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Directory of the file store. Without it the caches only live in memory.
    pub dir: Option<PathBuf>,
    #[serde(default = "defaults::namespace")]
    pub namespace: String,
    #[serde(default = "defaults::pointer_ttl_secs")]
    pub pointer_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: None,
            namespace: defaults::namespace(),
            pointer_ttl_secs: defaults::pointer_ttl_secs(),
        }
    }
}

impl CacheSettings {
    pub fn pointer_ttl(&self) -> Duration {
        Duration::from_secs(self.pointer_ttl_secs)
    }
}

/// Page serving settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationSettings {
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,
    #[serde(default = "defaults::refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            page_size: defaults::page_size(),
            refresh_interval_secs: defaults::refresh_interval_secs(),
        }
    }
}

impl PaginationSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Top level settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub pagination: PaginationSettings,
}

impl FeedConfig {
    /// Load the config from a TOML file
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.fetch.block_step > 0, "fetch.block_step must be positive");
        anyhow::ensure!(
            self.fetch.search_window_blocks > 0,
            "fetch.search_window_blocks must be positive"
        );
        anyhow::ensure!(self.pagination.page_size > 0, "pagination.page_size must be positive");
        Ok(())
    }
}

/// Parameters of a single fetch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Identifies the node the events come from; part of the block pointer cache key.
    pub endpoint: String,
    pub contract_address: Address,
    pub from_block: u64,
    pub to_block: u64,
    /// Number of index entries to skip before the first page.
    pub pagination_offset: u64,
    pub use_graphql: bool,
    pub level: RecordLevel,
}

impl FetchConfig {
    pub fn new(endpoint: impl Into<String>, contract_address: Address) -> Self {
        Self {
            endpoint: endpoint.into(),
            contract_address,
            from_block: 0,
            to_block: 0,
            pagination_offset: 0,
            use_graphql: defaults::use_graphql(),
            level: RecordLevel::default(),
        }
    }

    pub fn with_block_range(&self, from_block: u64, to_block: u64) -> Self {
        Self { from_block, to_block, ..self.clone() }
    }

    pub fn with_pagination_offset(&self, pagination_offset: u64) -> Self {
        Self { pagination_offset, ..self.clone() }
    }

    pub fn with_use_graphql(&self, use_graphql: bool) -> Self {
        Self { use_graphql, ..self.clone() }
    }

    pub fn with_level(&self, level: RecordLevel) -> Self {
        Self { level, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG_TEMPL: &str = r#"
[rpc]
url = "http://localhost:8545"
contract_address = "0x0000000000000000000000000000000000000001"

[indexer]
url = "http://localhost:8000/subgraphs/name/attestations"
use_graphql = false

[fetch]
block_step = 500
level = "consensus"

[cache]
namespace = "testnet"

[pagination]
page_size = 10
"#;

    #[tokio::test]
    async fn load_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONFIG_TEMPL.as_bytes()).unwrap();

        let config = FeedConfig::load(file.path()).await.unwrap();
        assert_eq!(config.rpc.url.unwrap().as_str(), "http://localhost:8545/");
        assert_eq!(config.rpc.contract_address, Some(Address::with_last_byte(1)));
        assert!(!config.indexer.use_graphql);
        assert_eq!(config.fetch.block_step, 500);
        assert_eq!(config.fetch.max_empty_batches, defaults::max_empty_batches());
        assert_eq!(config.fetch.level, RecordLevel::Consensus);
        assert_eq!(config.cache.namespace, "testnet");
        assert_eq!(config.cache.pointer_ttl(), Duration::from_secs(600));
        assert_eq!(config.pagination.page_size, 10);
        assert_eq!(config.pagination.refresh_interval(), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn empty_config_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = FeedConfig::load(file.path()).await.unwrap();
        assert!(config.indexer.use_graphql);
        assert_eq!(config.fetch.block_step, 1_000);
        assert_eq!(config.pagination.page_size, 25);
    }

    #[tokio::test]
    async fn rejects_zero_page_size() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[pagination]\npage_size = 0\n").unwrap();
        assert!(FeedConfig::load(file.path()).await.is_err());
    }

    #[test]
    fn fetch_config_overrides_copy() {
        let base = FetchConfig::new("http://node", Address::ZERO);
        let ranged = base.with_block_range(10, 20).with_level(RecordLevel::Consensus);

        assert_eq!(base.from_block, 0);
        assert_eq!(base.level, RecordLevel::Attestation);
        assert_eq!((ranged.from_block, ranged.to_block), (10, 20));
        assert_eq!(ranged.endpoint, base.endpoint);
        assert!(!base.with_use_graphql(false).use_graphql);
        assert_eq!(base.with_pagination_offset(5).pagination_offset, 5);
    }
}
