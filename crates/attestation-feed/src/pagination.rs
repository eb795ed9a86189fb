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

//! Serves pages of proofs from the proof cache and fetches more when a page runs past it.

use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{
    cache::ProofCache,
    config::{FetchConfig, PaginationSettings},
    errors::FeedError,
    events::Proof,
    orchestrator::RecordSource,
};

const ALERT_CHANNEL_CAPACITY: usize = 16;

/// Notifications for consumers of the feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedAlert {
    /// A fetch failed. The cached proofs are still served.
    FetchFailed { message: String },
    /// The cache was rebuilt from scratch.
    Refreshed { total_items: usize },
}

/// One page of proofs as handed to consumers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page: usize,
    pub proofs: Vec<Proof>,
    pub loading: bool,
    pub has_more: bool,
    pub total_items: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PaginationState {
    current_page: usize,
    loading: bool,
    has_more: bool,
    initialized: bool,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self { current_page: 0, loading: false, has_more: true, initialized: false }
    }
}

pub struct ProofPaginationController {
    source: Arc<dyn RecordSource>,
    proofs: Arc<ProofCache>,
    config: FetchConfig,
    page_size: usize,
    refresh_interval: Duration,
    state: RwLock<PaginationState>,
    // One fetch at a time; page changes queue behind each other and behind refreshes.
    fetch_lock: Mutex<()>,
    alerts: broadcast::Sender<FeedAlert>,
}

impl ProofPaginationController {
    pub fn new(
        source: Arc<dyn RecordSource>,
        proofs: Arc<ProofCache>,
        config: FetchConfig,
        settings: &PaginationSettings,
    ) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            source,
            proofs,
            config,
            page_size: settings.page_size.max(1),
            refresh_interval: settings.refresh_interval(),
            state: RwLock::new(PaginationState::default()),
            fetch_lock: Mutex::new(()),
            alerts,
        }
    }

    fn state(&self) -> PaginationState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_state(&self, update: impl FnOnce(&mut PaginationState)) {
        update(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.state().current_page
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn has_more(&self) -> bool {
        self.state().has_more
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<FeedAlert> {
        self.alerts.subscribe()
    }

    fn publish(&self, alert: FeedAlert) {
        // Nobody listening is fine.
        let _ = self.alerts.send(alert);
    }

    /// Fetch `target` records at or below `start_block` and merge them into the cache.
    ///
    /// Failures are published as an alert and leave `has_more` set so the next page change
    /// tries again.
    async fn fetch_into_cache(
        &self,
        target: usize,
        start_block: Option<u64>,
    ) -> Result<usize, FeedError> {
        self.update_state(|state| state.loading = true);
        let result = self.source.fetch_until_enough(&self.config, target, start_block).await;
        self.update_state(|state| state.loading = false);

        match result {
            Ok(collected) => {
                let fetched = collected.events.len();
                self.proofs.merge(collected.events).await;
                tracing::debug!("Merged {fetched} fetched proofs (start block {start_block:?})");
                Ok(fetched)
            }
            Err(err) => {
                tracing::error!("Failed to fetch proofs from {}: {err}", self.source.name());
                self.update_state(|state| state.has_more = true);
                self.publish(FeedAlert::FetchFailed { message: err.to_string() });
                Err(err)
            }
        }
    }

    /// Fetch `target` records below the oldest cached one. Returns whether the source may hold
    /// more.
    async fn fetch_older(&self, target: usize) -> Result<bool, FeedError> {
        let start_block = match self.proofs.oldest_block().await {
            Some(0) => return Ok(false),
            Some(oldest) => Some(oldest - 1),
            None => None,
        };
        let fetched = self.fetch_into_cache(target, start_block).await?;
        Ok(fetched >= target)
    }

    /// Restore the persisted page pointer and, when the cache is empty, fetch the first page.
    pub async fn initialize(&self) {
        let _fetch = self.fetch_lock.lock().await;
        if self.state().initialized {
            return;
        }

        let current_page = self.proofs.page().await;
        self.update_state(|state| state.current_page = current_page);

        if self.proofs.is_empty().await {
            if let Ok(fetched) = self.fetch_into_cache(self.page_size, None).await {
                let mut has_more = fetched >= self.page_size;
                if fetched > 0 && !has_more {
                    // The first fetch can come back short without the source being exhausted,
                    // e.g. when the node scan hits its empty batch limit.
                    if let Ok(more) = self.fetch_older(self.page_size - fetched).await {
                        has_more = more;
                    }
                }
                self.update_state(|state| state.has_more = has_more);
            }
        }

        self.update_state(|state| state.initialized = true);
        tracing::info!(
            "Pagination initialized at page {current_page} with {} cached proofs",
            self.proofs.len().await
        );
    }

    /// Make sure the cache holds everything up to the end of `page`, then move to it.
    pub async fn handle_page_change(&self, page: usize) {
        self.initialize().await;
        let _fetch = self.fetch_lock.lock().await;

        let needed = page.checked_add(1).and_then(|pages| pages.checked_mul(self.page_size));
        let cached = self.proofs.len().await;
        if needed.is_none() {
            tracing::warn!("Page {page} is out of range, not fetching");
        }
        if let Some(needed) = needed.filter(|&needed| cached < needed && self.state().has_more) {
            let shortfall = needed - cached;
            tracing::debug!("Page {page} needs {shortfall} more proofs");
            if let Ok(has_more) = self.fetch_older(shortfall).await {
                self.update_state(|state| state.has_more = has_more);
            }
        }

        self.update_state(|state| state.current_page = page);
        self.proofs.set_page(page).await;
    }

    /// Snapshot of `page` from the cache. Does not fetch.
    pub async fn get_page(&self, page: usize) -> Page {
        let proofs = self.proofs.get().await;
        let total_items = proofs.len();
        let start = page.saturating_mul(self.page_size).min(total_items);
        let end = start.saturating_add(self.page_size).min(total_items);
        let state = self.state();

        Page {
            page,
            proofs: proofs[start..end].to_vec(),
            loading: state.loading,
            has_more: state.has_more,
            total_items,
        }
    }

    /// Drop every cached proof and fetch the first page again.
    pub async fn refresh(&self) {
        let _fetch = self.fetch_lock.lock().await;
        tracing::info!("Refreshing proof cache");

        self.proofs.clear().await;
        self.update_state(|state| {
            state.current_page = 0;
            state.has_more = true;
        });

        if let Ok(fetched) = self.fetch_into_cache(self.page_size, None).await {
            self.update_state(|state| state.has_more = fetched >= self.page_size);
            self.publish(FeedAlert::Refreshed { total_items: fetched });
        }
        self.update_state(|state| state.initialized = true);
    }

    /// Refresh every `refresh_interval` until `cancel_token` fires.
    pub fn spawn_refresh_task(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                "Proof refresh task started (interval: {}s)",
                self.refresh_interval.as_secs()
            );

            let mut ticker = tokio::time::interval(self.refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.refresh().await;
                    }
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Proof refresh task shutting down");
                        break;
                    }
                }
            }
        })
    }
}
