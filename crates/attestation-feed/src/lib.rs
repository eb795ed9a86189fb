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

//! Fetch, correlate, cache and page through the data and risk attestations of an on-chain
//! registry.
//!
//! Events come from a GraphQL index when one is configured and from scanning the node
//! otherwise. Data and risk events of the same trader and epoch are joined into proofs, which
//! are cached newest first and served a page at a time by [ProofPaginationController].

pub mod cache;
pub mod collector;
pub mod config;
pub mod contracts;
pub mod correlator;
pub mod errors;
pub mod events;
pub mod feed;
pub mod fetcher;
pub mod finder;
pub mod indexed;
pub mod node;
pub mod orchestrator;
pub mod pagination;
pub mod pool;
pub mod registry;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{BlockPointerCache, ProofCache};
pub use collector::PaginatedEventCollector;
pub use config::{FeedConfig, FetchConfig, RecordLevel};
pub use correlator::correlate;
pub use errors::{CodedError, FeedError};
pub use events::{CorrelatedRecord, DataEvent, Proof, RecordKey, RiskEvent};
pub use feed::AttestationFeed;
pub use finder::LatestActiveBlockFinder;
pub use indexed::IndexedQuerySource;
pub use node::{LedgerNode, RpcNode};
pub use orchestrator::{FetchOrchestrator, RecordSource};
pub use pagination::{FeedAlert, Page, ProofPaginationController};
pub use store::KeyValueStore;
