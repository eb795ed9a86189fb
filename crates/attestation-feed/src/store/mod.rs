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

//! Persistence substrate for the caches.
//!
//! Values are opaque strings; the caches own their JSON encoding.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use auto_impl::auto_impl;
use thiserror::Error;

use crate::{errors::CodedError, impl_coded_debug};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Error)]
pub enum StoreError {
    #[error("{code} Store IO error: {0}", code = self.code())]
    Io(#[from] std::io::Error),

    #[error("{code} Store lock poisoned", code = self.code())]
    LockFailed,

    #[error("{code} Store unavailable: {0}", code = self.code())]
    Unavailable(String),
}

impl CodedError for StoreError {
    fn code(&self) -> &str {
        match self {
            StoreError::Io(_) => "[AF-STO-501]",
            StoreError::LockFailed => "[AF-STO-502]",
            StoreError::Unavailable(_) => "[AF-STO-503]",
        }
    }
}

impl_coded_debug!(StoreError);

/// String key/value persistence.
#[async_trait]
#[auto_impl(Arc)]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    async fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

/// A [FileStore] rooted at `dir` when given, else a [MemoryStore].
pub fn store_from_dir(dir: Option<&Path>) -> Arc<dyn KeyValueStore> {
    match dir {
        Some(dir) => Arc::new(FileStore::new(dir)),
        None => Arc::new(MemoryStore::default()),
    }
}
