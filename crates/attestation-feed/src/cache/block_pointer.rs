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

use std::{sync::Arc, time::Duration};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::store::KeyValueStore;

/// Last active block of a contract, as persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedBlockPointer {
    pub block_number: u64,
    /// Unix time in milliseconds at which the pointer was written.
    pub timestamp: i64,
}

pub fn pointer_key(endpoint: &str, contract: Address) -> String {
    format!("latestActiveBlock:{endpoint}:{contract}")
}

/// Short-lived cache of the last active block per `(endpoint, contract)`.
///
/// Store failures are logged and treated as a miss.
#[derive(Clone)]
pub struct BlockPointerCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl BlockPointerCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn get(&self, endpoint: &str, contract: Address) -> Option<u64> {
        self.get_at(endpoint, contract, chrono::Utc::now().timestamp_millis()).await
    }

    /// Lookup as of `now` (unix millis). Expired entries are removed.
    pub async fn get_at(&self, endpoint: &str, contract: Address, now: i64) -> Option<u64> {
        let key = pointer_key(endpoint, contract);
        let raw = match self.store.get_item(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!("Failed to read block pointer {key}: {err}");
                return None;
            }
        };

        let pointer = match serde_json::from_str::<CachedBlockPointer>(&raw) {
            Ok(pointer) => pointer,
            Err(err) => {
                tracing::warn!("Discarding malformed block pointer {key}: {err}");
                self.remove(&key).await;
                return None;
            }
        };

        let age_ms = now.saturating_sub(pointer.timestamp);
        if age_ms >= self.ttl.as_millis() as i64 {
            tracing::debug!("Block pointer {key} expired ({age_ms}ms old)");
            self.remove(&key).await;
            return None;
        }

        tracing::trace!("Block pointer cache hit for {key}: {}", pointer.block_number);
        Some(pointer.block_number)
    }

    pub async fn set(&self, endpoint: &str, contract: Address, block_number: u64) {
        self.set_at(endpoint, contract, block_number, chrono::Utc::now().timestamp_millis()).await
    }

    pub async fn set_at(&self, endpoint: &str, contract: Address, block_number: u64, now: i64) {
        let key = pointer_key(endpoint, contract);
        let pointer = CachedBlockPointer { block_number, timestamp: now };
        let value = match serde_json::to_string(&pointer) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Failed to encode block pointer {key}: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set_item(&key, &value).await {
            tracing::warn!("Failed to write block pointer {key}: {err}");
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(err) = self.store.remove_item(key).await {
            tracing::warn!("Failed to remove block pointer {key}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::MemoryStore,
        test_utils::{FailingStore, CONTRACT},
    };
    use tracing_test::traced_test;

    const ENDPOINT: &str = "http://localhost:8545";
    const TTL: Duration = Duration::from_secs(600);

    #[tokio::test]
    async fn expires_after_ttl() {
        let store = Arc::new(MemoryStore::default());
        let cache = BlockPointerCache::new(store.clone(), TTL);
        let written = 1_700_000_000_000;
        let ttl_ms = TTL.as_millis() as i64;

        cache.set_at(ENDPOINT, CONTRACT, 1234, written).await;
        assert_eq!(cache.get_at(ENDPOINT, CONTRACT, written + ttl_ms - 1).await, Some(1234));
        assert_eq!(cache.get_at(ENDPOINT, CONTRACT, written + ttl_ms + 1).await, None);

        // The stale entry is gone, not just hidden.
        assert!(store.get_item(&pointer_key(ENDPOINT, CONTRACT)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keyed_by_endpoint_and_contract() {
        let store = Arc::new(MemoryStore::default());
        let cache = BlockPointerCache::new(store.clone(), TTL);

        cache.set(ENDPOINT, CONTRACT, 10).await;
        assert_eq!(cache.get(ENDPOINT, CONTRACT).await, Some(10));
        assert_eq!(cache.get("http://other", CONTRACT).await, None);
        assert_eq!(cache.get(ENDPOINT, Address::ZERO).await, None);

        let raw = store.get_item(&pointer_key(ENDPOINT, CONTRACT)).await.unwrap().unwrap();
        assert!(raw.contains("\"blockNumber\":10"));
        assert!(pointer_key(ENDPOINT, CONTRACT)
            .starts_with("latestActiveBlock:http://localhost:8545:0x"));
    }

    #[tokio::test]
    #[traced_test]
    async fn store_failures_are_a_miss() {
        let cache = BlockPointerCache::new(Arc::new(FailingStore), TTL);
        cache.set(ENDPOINT, CONTRACT, 10).await;
        assert_eq!(cache.get(ENDPOINT, CONTRACT).await, None);
        assert!(logs_contain("Failed to write block pointer"));
        assert!(logs_contain("Failed to read block pointer"));
    }

    #[tokio::test]
    async fn malformed_entries_are_dropped() {
        let store = Arc::new(MemoryStore::default());
        let key = pointer_key(ENDPOINT, CONTRACT);
        store.set_item(&key, "not json").await.unwrap();

        let cache = BlockPointerCache::new(store.clone(), TTL);
        assert_eq!(cache.get(ENDPOINT, CONTRACT).await, None);
        assert!(store.is_empty());
    }
}
