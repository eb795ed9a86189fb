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

use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

pub trait CodedError: std::error::Error {
    fn code(&self) -> &str;
}

/// Implements [std::fmt::Debug] by delegating to the [std::fmt::Display] impl, so that coded
/// errors render their code and message when propagated through `anyhow` or `{:?}`.
#[macro_export]
macro_rules! impl_coded_debug {
    ($name:ident) => {
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self)
            }
        }
    };
}

/// Errors raised while fetching attestation events.
///
/// Transport-class variants abort the current fetch attempt and are the trigger for the
/// orchestrator's fallback. Decode errors are normally logged and skipped at the decode
/// boundary; they only surface here from the single-entry formatters.
#[derive(Error)]
pub enum FeedError {
    #[error("{code} Node RPC request failed: {0}", code = self.code())]
    Rpc(#[from] RpcError<TransportErrorKind>),

    #[error("{code} Contract call failed: {0}", code = self.code())]
    Contract(#[from] alloy::contract::Error),

    #[error("{code} Index request failed: {0}", code = self.code())]
    Http(#[from] reqwest::Error),

    #[error("{code} Index returned HTTP status {0}", code = self.code())]
    IndexStatus(reqwest::StatusCode),

    #[error("{code} Index query failed: {0}", code = self.code())]
    IndexQuery(String),

    #[error("{code} Failed to decode event: {0}", code = self.code())]
    Decode(String),

    #[error("{code} No fetch source available", code = self.code())]
    NoFetchSource,
}

impl CodedError for FeedError {
    fn code(&self) -> &str {
        match self {
            FeedError::Rpc(_) => "[AF-RPC-501]",
            FeedError::Contract(_) => "[AF-RPC-502]",
            FeedError::Http(_) => "[AF-IDX-501]",
            FeedError::IndexStatus(_) => "[AF-IDX-502]",
            FeedError::IndexQuery(_) => "[AF-IDX-503]",
            FeedError::Decode(_) => "[AF-DEC-400]",
            FeedError::NoFetchSource => "[AF-ORC-404]",
        }
    }
}

impl_coded_debug!(FeedError);

impl FeedError {
    /// Whether the error came from a transport (node or index) rather than from local decoding.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FeedError::Rpc(_)
                | FeedError::Contract(_)
                | FeedError::Http(_)
                | FeedError::IndexStatus(_)
                | FeedError::IndexQuery(_)
        )
    }
}
