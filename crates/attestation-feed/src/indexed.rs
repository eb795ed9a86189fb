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

//! Client for the GraphQL event index.
//!
//! The index serves the registry events as entity collections. Numeric fields arrive as decimal
//! strings and are parsed explicitly; entities that fail to parse are skipped.

use std::{fmt::Display, str::FromStr, time::Duration};

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::{
    config::FetchConfig,
    contracts::RecordLevel,
    correlator::correlate,
    errors::FeedError,
    events::{DataEvent, RiskEvent},
    orchestrator::{CollectedRecords, RecordSource},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    #[default]
    Desc,
}

/// Paging and filter arguments of one index query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageQuery {
    pub first: usize,
    pub skip: u64,
    pub order_by: String,
    pub order_direction: OrderDirection,
    /// A `where` filter, applied to both collections.
    pub filter: Value,
}

impl PageQuery {
    /// Newest first, no filter.
    pub fn new(first: usize, skip: u64) -> Self {
        Self {
            first,
            skip,
            order_by: "blockNumber".to_string(),
            order_direction: OrderDirection::Desc,
            filter: json!({}),
        }
    }

    /// Only entities at or below `block`.
    pub fn at_or_below(mut self, block: u64) -> Self {
        self.filter = json!({ "blockNumber_lte": block.to_string() });
        self
    }
}

/// One page of index results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexedPage {
    pub data_events: Vec<DataEvent>,
    pub risk_events: Vec<RiskEvent>,
    /// The data collection returned fewer entities than requested.
    pub exhausted: bool,
}

/// Collection and entity type names for `level`.
fn collections(level: RecordLevel) -> [(&'static str, &'static str); 2] {
    match level {
        RecordLevel::Attestation => {
            [("attestedToDatas", "AttestedToData"), ("attestedToRisks", "AttestedToRisk")]
        }
        RecordLevel::Consensus => [
            ("recordedConsensusForDatas", "RecordedConsensusForData"),
            ("recordedConsensusForRisks", "RecordedConsensusForRisk"),
        ],
    }
}

fn build_query(level: RecordLevel) -> String {
    let [(data, data_type), (risk, risk_type)] = collections(level);
    format!(
        r#"query Attestations(
  $first: Int!
  $skip: Int!
  $orderBy: {data_type}_orderBy
  $riskOrderBy: {risk_type}_orderBy
  $orderDirection: OrderDirection
  $where: {data_type}_filter
  $riskWhere: {risk_type}_filter
) {{
  data: {data}(
    first: $first
    skip: $skip
    orderBy: $orderBy
    orderDirection: $orderDirection
    where: $where
  ) {{
    transactionHash
    blockNumber
    traderId
    epoch
    attester
    merkleRoot
    cid
  }}
  risk: {risk}(
    first: $first
    skip: $skip
    orderBy: $riskOrderBy
    orderDirection: $orderDirection
    where: $riskWhere
  ) {{
    transactionHash
    blockNumber
    traderId
    epoch
    attester
    parameterId
    value
  }}
}}"#
    )
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<PageData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct PageData {
    #[serde(default)]
    data: Vec<RawDataEvent>,
    #[serde(default)]
    risk: Vec<RawRiskEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDataEvent {
    transaction_hash: Option<String>,
    block_number: Option<String>,
    trader_id: Option<String>,
    epoch: Option<String>,
    attester: Option<String>,
    merkle_root: Option<String>,
    cid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRiskEvent {
    transaction_hash: Option<String>,
    block_number: Option<String>,
    trader_id: Option<String>,
    epoch: Option<String>,
    attester: Option<String>,
    parameter_id: Option<String>,
    value: Option<String>,
}

fn parse_field<T>(value: &Option<String>, name: &str) -> Result<T, FeedError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = value.as_deref().ok_or_else(|| FeedError::Decode(format!("missing {name}")))?;
    raw.parse().map_err(|err| FeedError::Decode(format!("invalid {name} {raw:?}: {err}")))
}

impl TryFrom<RawDataEvent> for DataEvent {
    type Error = FeedError;

    fn try_from(raw: RawDataEvent) -> Result<Self, Self::Error> {
        Ok(DataEvent {
            transaction_hash: parse_field::<B256>(&raw.transaction_hash, "transactionHash")?,
            block_number: parse_field(&raw.block_number, "blockNumber")?,
            trader_id: parse_field::<U256>(&raw.trader_id, "traderId")?,
            epoch: parse_field(&raw.epoch, "epoch")?,
            attester: parse_field::<Address>(&raw.attester, "attester")?,
            merkle_root: parse_field::<B256>(&raw.merkle_root, "merkleRoot")?,
            cid: raw.cid.ok_or_else(|| FeedError::Decode("missing cid".to_string()))?,
        })
    }
}

impl TryFrom<RawRiskEvent> for RiskEvent {
    type Error = FeedError;

    fn try_from(raw: RawRiskEvent) -> Result<Self, Self::Error> {
        Ok(RiskEvent {
            transaction_hash: parse_field::<B256>(&raw.transaction_hash, "transactionHash")?,
            block_number: parse_field(&raw.block_number, "blockNumber")?,
            trader_id: parse_field::<U256>(&raw.trader_id, "traderId")?,
            epoch: parse_field(&raw.epoch, "epoch")?,
            attester: parse_field::<Address>(&raw.attester, "attester")?,
            parameter_id: parse_field::<U256>(&raw.parameter_id, "parameterId")?,
            value: parse_field::<U256>(&raw.value, "value")?,
        })
    }
}

fn decode_entities<R, T>(raw: Vec<R>, kind: &str) -> Vec<T>
where
    T: TryFrom<R, Error = FeedError>,
{
    raw.into_iter()
        .filter_map(|entity| match T::try_from(entity) {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::warn!("Skipping {kind} entity from index: {err}");
                None
            }
        })
        .collect()
}

/// GraphQL index of registry events.
#[derive(Clone)]
pub struct IndexedQuerySource {
    client: Client,
    url: Url,
}

impl IndexedQuerySource {
    pub fn new(url: Url) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("attestation-feed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch one page of data and risk events at `config.level`.
    pub async fn fetch_page(
        &self,
        config: &FetchConfig,
        query: &PageQuery,
    ) -> Result<IndexedPage, FeedError> {
        let body = json!({
            "query": build_query(config.level),
            "variables": {
                "first": query.first,
                "skip": query.skip,
                "orderBy": query.order_by,
                "riskOrderBy": query.order_by,
                "orderDirection": query.order_direction,
                "where": query.filter,
                "riskWhere": query.filter,
            },
        });

        let response = self.client.post(self.url.clone()).json(&body).send().await?;
        if !response.status().is_success() {
            tracing::error!("Index {} returned {}", self.url, response.status());
            return Err(FeedError::IndexStatus(response.status()));
        }

        let response: GraphQlResponse = response.json().await?;
        if !response.errors.is_empty() {
            let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
            return Err(FeedError::IndexQuery(messages.join("; ")));
        }
        let page = response
            .data
            .ok_or_else(|| FeedError::IndexQuery("response has no data".to_string()))?;

        let exhausted = page.data.len() < query.first;
        let data_events: Vec<DataEvent> = decode_entities(page.data, "data");
        let risk_events: Vec<RiskEvent> = decode_entities(page.risk, "risk");
        tracing::debug!(
            "Index page skip={} returned {} data and {} risk events",
            query.skip,
            data_events.len(),
            risk_events.len()
        );

        Ok(IndexedPage { data_events, risk_events, exhausted })
    }
}

#[async_trait]
impl RecordSource for IndexedQuerySource {
    fn name(&self) -> String {
        "graphql".to_string()
    }

    /// Pages of `2 * target` entities, newest first, starting at `config.pagination_offset`.
    /// Every page is correlated together with the previous ones, so risk events arriving on a
    /// later page still join their data event.
    async fn fetch_until_enough(
        &self,
        config: &FetchConfig,
        target: usize,
        start_block: Option<u64>,
    ) -> Result<CollectedRecords, FeedError> {
        let first = target.max(1).saturating_mul(2);
        let mut skip = config.pagination_offset;
        let mut data_events = Vec::new();
        let mut risk_events = Vec::new();

        let records = loop {
            let mut query = PageQuery::new(first, skip);
            if let Some(block) = start_block {
                query = query.at_or_below(block);
            }
            let page = self.fetch_page(config, &query).await?;
            data_events.extend(page.data_events);
            risk_events.extend(page.risk_events);
            skip += first as u64;

            let records = correlate(&data_events, &risk_events);
            if records.len() >= target || page.exhausted {
                break records;
            }
        };

        let last_checked_block = records
            .iter()
            .map(|record| record.block_number)
            .min()
            .or(start_block)
            .unwrap_or_default();
        tracing::info!(
            "Index returned {} records down to block {last_checked_block}",
            records.len()
        );
        Ok(CollectedRecords { events: records, last_checked_block })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::CONTRACT;
    use httpmock::prelude::*;
    use tracing_test::traced_test;

    const TX: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
    const ROOT: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";
    const ATTESTER: &str = "0x0000000000000000000000000000000000000011";

    fn data_entity(block: u64, trader: &str, epoch: u64) -> Value {
        json!({
            "transactionHash": TX,
            "blockNumber": block.to_string(),
            "traderId": trader,
            "epoch": epoch.to_string(),
            "attester": ATTESTER,
            "merkleRoot": ROOT,
            "cid": format!("cid-{trader}-{epoch}"),
        })
    }

    fn risk_entity(block: u64, trader: &str, epoch: u64, parameter: u64) -> Value {
        json!({
            "transactionHash": TX,
            "blockNumber": block.to_string(),
            "traderId": trader,
            "epoch": epoch.to_string(),
            "attester": ATTESTER,
            "parameterId": parameter.to_string(),
            "value": U256::MAX.to_string(),
        })
    }

    fn source(server: &MockServer) -> IndexedQuerySource {
        IndexedQuerySource::new(server.base_url().parse().unwrap()).unwrap()
    }

    fn config() -> FetchConfig {
        FetchConfig::new("http://node", CONTRACT)
    }

    #[tokio::test]
    async fn parses_page() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/")
                .body_contains("attestedToDatas")
                .body_contains("\"first\":4");
            then.status(200).header("content-type", "application/json").json_body(json!({
                "data": {
                    "data": [data_entity(100, "42", 7)],
                    "risk": [risk_entity(101, "42", 7, 3)],
                }
            }));
        });

        let page = source(&server).fetch_page(&config(), &PageQuery::new(4, 0)).await.unwrap();

        mock.assert();
        assert!(page.exhausted);
        assert_eq!(page.data_events.len(), 1);
        let data = &page.data_events[0];
        assert_eq!(data.trader_id, U256::from(42u64));
        assert_eq!((data.epoch, data.block_number), (7, 100));
        assert_eq!(data.merkle_root, ROOT.parse::<B256>().unwrap());
        assert_eq!(data.cid, "cid-42-7");
        assert_eq!(page.risk_events[0].value, U256::MAX);
        assert_eq!(page.risk_events[0].parameter_id, U256::from(3u64));
    }

    #[tokio::test]
    async fn consensus_level_queries_consensus_collections() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .body_contains("recordedConsensusForDatas")
                .body_contains("recordedConsensusForRisks")
                .body_contains("\"blockNumber_lte\":\"500\"");
            then.status(200).json_body(json!({ "data": { "data": [], "risk": [] } }));
        });

        let config = config().with_level(RecordLevel::Consensus);
        let page = source(&server)
            .fetch_page(&config, &PageQuery::new(2, 0).at_or_below(500))
            .await
            .unwrap();

        mock.assert();
        assert!(page.exhausted);
    }

    #[tokio::test]
    #[traced_test]
    async fn skips_invalid_entities() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({
                "data": {
                    "data": [
                        data_entity(100, "not-a-number", 7),
                        { "transactionHash": TX, "traderId": "1", "epoch": "1" },
                        data_entity(99, "5", 1),
                    ],
                    "risk": [],
                }
            }));
        });

        let page = source(&server).fetch_page(&config(), &PageQuery::new(3, 0)).await.unwrap();

        assert_eq!(page.data_events.len(), 1);
        assert_eq!(page.data_events[0].trader_id, U256::from(5u64));
        // Exhaustion counts raw entities, not decoded ones.
        assert!(!page.exhausted);
        assert!(logs_contain("Skipping data entity from index"));
    }

    #[tokio::test]
    async fn graphql_errors_fail_the_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({
                "data": null,
                "errors": [{ "message": "Type `AttestedToData_filter` has no field `bogus`" }],
            }));
        });

        let err = source(&server).fetch_page(&config(), &PageQuery::new(2, 0)).await.unwrap_err();
        assert!(matches!(err, FeedError::IndexQuery(ref msg) if msg.contains("bogus")), "{err}");
    }

    #[tokio::test]
    async fn http_errors_fail_the_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(503);
        });

        let err = source(&server).fetch_page(&config(), &PageQuery::new(2, 0)).await.unwrap_err();
        assert!(matches!(err, FeedError::IndexStatus(status) if status.as_u16() == 503));
    }

    #[tokio::test]
    async fn pages_until_target_reached() {
        let server = MockServer::start();
        let first_page = server.mock(|when, then| {
            when.method(POST).body_contains("\"skip\":10").body_contains("\"first\":4");
            then.status(200).json_body(json!({
                "data": {
                    "data": [
                        data_entity(400, "1", 1),
                        data_entity(399, "1", 1),
                        data_entity(398, "1", 1),
                        data_entity(397, "1", 1),
                    ],
                    "risk": [],
                }
            }));
        });
        let second_page = server.mock(|when, then| {
            when.method(POST).body_contains("\"skip\":14");
            then.status(200).json_body(json!({
                "data": {
                    "data": [data_entity(300, "2", 1), data_entity(299, "3", 1)],
                    "risk": [risk_entity(398, "1", 1, 9)],
                }
            }));
        });

        let config = config().with_pagination_offset(10);
        let collected = source(&server).fetch_until_enough(&config, 2, None).await.unwrap();

        first_page.assert_hits(1);
        second_page.assert_hits(1);
        let keys: Vec<_> = collected.events.iter().map(|r| r.key().to_string()).collect();
        assert_eq!(keys, vec!["1-1", "2-1", "3-1"]);
        assert_eq!(collected.events[0].data_events.len(), 4);
        assert_eq!(collected.events[0].risk_events.len(), 1);
        assert_eq!(collected.events[0].block_number, 400);
        assert_eq!(collected.last_checked_block, 299);
    }

    #[tokio::test]
    async fn stops_when_index_runs_out() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).body_contains("\"blockNumber_lte\":\"1000\"");
            then.status(200).json_body(json!({
                "data": { "data": [data_entity(900, "1", 1)], "risk": [] }
            }));
        });

        let collected =
            source(&server).fetch_until_enough(&config(), 5, Some(1_000)).await.unwrap();

        mock.assert_hits(1);
        assert_eq!(collected.events.len(), 1);
        assert_eq!(collected.last_checked_block, 900);
    }
}
