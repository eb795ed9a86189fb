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

//! Long-lived, deduplicated store of correlated records.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::Mutex;

use crate::{
    events::{Proof, RecordKey},
    store::KeyValueStore,
};

/// Newest epoch first, then trader id descending by its decimal string.
pub fn proof_order(a: &Proof, b: &Proof) -> Ordering {
    b.epoch.cmp(&a.epoch).then_with(|| b.trader_id.to_string().cmp(&a.trader_id.to_string()))
}

pub fn sort_proofs(mut proofs: Vec<Proof>) -> Vec<Proof> {
    proofs.sort_by(proof_order);
    proofs
}

/// Union of `existing` and `incoming` by key. An incoming proof fully replaces an existing one.
pub fn merge_proofs(existing: Vec<Proof>, incoming: Vec<Proof>) -> Vec<Proof> {
    let mut by_key: HashMap<RecordKey, Proof> =
        existing.into_iter().map(|proof| (proof.key(), proof)).collect();
    for proof in incoming {
        by_key.insert(proof.key(), proof);
    }
    sort_proofs(by_key.into_values().collect())
}

/// Proof records persisted under `{namespace}-proofs-cache`, with the last viewed page under
/// `{namespace}-proofs-page`.
///
/// The persisted list is loaded on first use. Reads and merges of the in-memory list happen under
/// a synchronous lock and never span an `.await`. Store failures are logged; the in-memory view
/// keeps working and starts empty if the initial load fails.
pub struct ProofCache {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    proofs: RwLock<Option<Vec<Proof>>>,
    // Orders merges so the last persisted list is the last merged one.
    write_lock: Mutex<()>,
}

impl ProofCache {
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            proofs: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    fn cache_key(&self) -> String {
        format!("{}-proofs-cache", self.namespace)
    }

    fn page_key(&self) -> String {
        format!("{}-proofs-page", self.namespace)
    }

    fn snapshot(&self) -> Option<Vec<Proof>> {
        self.proofs.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn load(&self) -> Vec<Proof> {
        if let Some(proofs) = self.snapshot() {
            return proofs;
        }

        let key = self.cache_key();
        let loaded = match self.store.get_item(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Proof>>(&raw) {
                Ok(proofs) => proofs,
                Err(err) => {
                    tracing::warn!("Discarding unreadable proof cache {key}: {err}");
                    vec![]
                }
            },
            Ok(None) => vec![],
            Err(err) => {
                tracing::warn!("Failed to load proof cache {key}: {err}");
                vec![]
            }
        };
        tracing::debug!("Loaded {} proofs from {key}", loaded.len());

        let mut state = self.proofs.write().unwrap_or_else(PoisonError::into_inner);
        state.get_or_insert_with(|| sort_proofs(loaded)).clone()
    }

    async fn persist(&self, proofs: &[Proof]) {
        let key = self.cache_key();
        let value = match serde_json::to_string(proofs) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Failed to encode proof cache: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set_item(&key, &value).await {
            tracing::warn!("Failed to persist proof cache {key}: {err}");
        }
    }

    /// All cached proofs in display order.
    pub async fn get(&self) -> Vec<Proof> {
        self.load().await
    }

    pub async fn len(&self) -> usize {
        self.load().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Lowest block of any event held by the cached proofs.
    ///
    /// A proof's `block_number` is its newest data block, so scanning below it could find the
    /// older events of a cached proof again.
    pub async fn oldest_block(&self) -> Option<u64> {
        self.load()
            .await
            .iter()
            .flat_map(|proof| {
                let data = proof.data_events.iter().map(|event| event.block_number);
                let risk = proof.risk_events.iter().map(|event| event.block_number);
                data.chain(risk).chain(std::iter::once(proof.block_number))
            })
            .min()
    }

    /// Merge `incoming` into the cache and persist the result.
    pub async fn merge(&self, incoming: Vec<Proof>) -> Vec<Proof> {
        let _guard = self.write_lock.lock().await;
        self.load().await;

        let merged = {
            let mut state = self.proofs.write().unwrap_or_else(PoisonError::into_inner);
            let merged = merge_proofs(state.take().unwrap_or_default(), incoming);
            *state = Some(merged.clone());
            merged
        };
        self.persist(&merged).await;
        merged
    }

    /// Drop every cached proof and the stored page pointer.
    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        *self.proofs.write().unwrap_or_else(PoisonError::into_inner) = Some(vec![]);

        for key in [self.cache_key(), self.page_key()] {
            if let Err(err) = self.store.remove_item(&key).await {
                tracing::warn!("Failed to clear {key}: {err}");
            }
        }
    }

    /// Last page pointer persisted with [Self::set_page], or 0.
    pub async fn page(&self) -> usize {
        let key = self.page_key();
        match self.store.get_item(&key).await {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or_default(),
            Ok(None) => 0,
            Err(err) => {
                tracing::warn!("Failed to read page pointer {key}: {err}");
                0
            }
        }
    }

    pub async fn set_page(&self, page: usize) {
        let key = self.page_key();
        if let Err(err) = self.store.set_item(&key, &page.to_string()).await {
            tracing::warn!("Failed to write page pointer {key}: {err}");
        }
    }
}
