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

use std::path::PathBuf;

use alloy::{
    primitives::{Address, U256},
    providers::RootProvider,
};
use anyhow::{Context, Result};
use attestation_feed::{
    config::RecordLevel, registry::AttestationRegistry, AttestationFeed, FeedAlert, FeedConfig,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Arguments of the attestation feed.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    /// TOML config file. Command line options override its values.
    #[clap(short, long, env = "ATTESTATION_FEED_CONFIG")]
    config: Option<PathBuf>,
    /// URL of the Ethereum RPC endpoint.
    #[clap(short, long, env)]
    rpc_url: Option<Url>,
    /// URL of the GraphQL event index.
    #[clap(long, env)]
    graphql_url: Option<Url>,
    /// Address of the attestation registry contract.
    #[clap(long, env)]
    contract_address: Option<Address>,
    /// Directory to persist caches in. Caches live in memory when unset.
    #[clap(long, env)]
    cache_dir: Option<PathBuf>,
    /// Page to print.
    #[clap(long, default_value_t = 0)]
    page: usize,
    /// Read consensus level records instead of attestations.
    #[clap(long, default_value_t = false)]
    consensus: bool,
    /// Only scan the node, never the index.
    #[clap(long, default_value_t = false)]
    no_graphql: bool,
    /// Keep running and refresh the cache periodically.
    #[clap(long, default_value_t = false)]
    watch: bool,
    /// Print the parameter definitions of this risk group and exit. With `--trader-id` and
    /// `--epoch`, also read the risk record in this group.
    #[clap(long)]
    risk_group: Option<U256>,
    /// Print the stored record of this trader (requires `--epoch`) and exit.
    #[clap(long, requires = "epoch")]
    trader_id: Option<U256>,
    /// Epoch of the record to print.
    #[clap(long, requires = "trader_id")]
    epoch: Option<u64>,
    /// Print the data group id of the registry and exit.
    #[clap(long, default_value_t = false)]
    data_group: bool,
    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false)]
    log_json: bool,
}

impl MainArgs {
    async fn feed_config(&self) -> Result<FeedConfig> {
        let mut config = match &self.config {
            Some(path) => FeedConfig::load(path).await?,
            None => FeedConfig::default(),
        };
        if let Some(url) = &self.rpc_url {
            config.rpc.url = Some(url.clone());
        }
        if let Some(url) = &self.graphql_url {
            config.indexer.url = Some(url.clone());
        }
        if let Some(address) = self.contract_address {
            config.rpc.contract_address = Some(address);
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
        if self.consensus {
            config.fetch.level = RecordLevel::Consensus;
        }
        if self.no_graphql {
            config.indexer.use_graphql = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = MainArgs::parse();

    if args.log_json {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    let config = args.feed_config().await.context("Failed to load feed config")?;

    if let (Some(trader_id), Some(epoch)) = (args.trader_id, args.epoch) {
        let record = registry(&config)?
            .record(trader_id, epoch, args.risk_group)
            .await
            .with_context(|| format!("Failed to read record {trader_id}-{epoch}"))?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }
    if args.data_group {
        let group = registry(&config)?.data_group().await.context("Failed to read data group")?;
        println!("{group}");
        return Ok(());
    }
    if let Some(risk_group) = args.risk_group {
        return print_risk_group(&config, risk_group).await;
    }

    let feed = AttestationFeed::connect(&config)?;
    let mut alerts = feed.controller().subscribe_alerts();
    tokio::spawn(async move {
        while let Ok(alert) = alerts.recv().await {
            match alert {
                FeedAlert::FetchFailed { message } => {
                    tracing::warn!("Fetching proofs failed: {message}")
                }
                FeedAlert::Refreshed { total_items } => {
                    tracing::info!("Proof cache refreshed with {total_items} proofs")
                }
            }
        }
    });

    let page = feed.page(args.page).await;
    println!("{}", serde_json::to_string_pretty(&page)?);

    if args.watch {
        let cancel_token = CancellationToken::new();
        let refresh = feed.controller().clone().spawn_refresh_task(cancel_token.clone());
        tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
        tracing::info!("Shutting down");
        cancel_token.cancel();
        refresh.await.context("Refresh task panicked")?;
    }

    Ok(())
}

fn registry(config: &FeedConfig) -> Result<AttestationRegistry<RootProvider>> {
    let rpc_url = config.rpc.url.clone().context("rpc.url is not set")?;
    let contract = config.rpc.contract_address.context("rpc.contract_address is not set")?;
    Ok(AttestationRegistry::new(contract, RootProvider::new_http(rpc_url)))
}

async fn print_risk_group(config: &FeedConfig, risk_group: U256) -> Result<()> {
    let parameters = registry(config)?
        .risk_parameters(risk_group)
        .await
        .with_context(|| format!("Failed to read risk group {risk_group}"))?;
    println!("{}", serde_json::to_string_pretty(&parameters)?);
    Ok(())
}
