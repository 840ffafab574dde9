//! # Position Valuer
//!
//! Reads an Arcadia account's assets and prints the amount of each underlying
//! token, with Uniswap V3 positions decomposed at the pools' current ticks.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin position_valuer -- --account 0xb2DF87b16682435bdf29494fEA44dF5374F22f3E
//! cargo run --bin position_valuer -- --account 0x... --block 19000000 --json
//! ```
//!
//! The RPC endpoint comes from `Config.toml`, `SDK_RPC_HTTP_URL` or `ALCHEMY_KEY`.

use anyhow::{Context, Result};
use clap::Parser;
use ethers::prelude::{Http, Provider};
use std::sync::Arc;
use univ3_position_valuer::{
    aggregation::AggregationOptions,
    types::conversions::{address_to_string, string_to_address, u256_to_decimal},
    EthersChainReader, PoolRegistry, PositionAggregator, Settings,
};

#[derive(Parser, Debug)]
#[command(name = "position_valuer", about = "Value Uniswap V3 positions held by an account")]
struct Args {
    /// Account whose generateAssetData() is enumerated
    #[arg(long)]
    account: String,

    /// Historic block to read at (latest when omitted)
    #[arg(long)]
    block: Option<u64>,

    /// Configuration file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// Print raw amounts as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let settings = Settings::load(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config))?;
    let registry = PoolRegistry::from_config(&settings.pools)?;
    let account = string_to_address(&args.account)?;

    let provider = Provider::<Http>::try_from(settings.rpc.http_url.as_str())
        .context("Invalid RPC url")?;
    let reader = EthersChainReader::new(Arc::new(provider), &settings.rpc);
    let aggregator = PositionAggregator::new(
        Arc::new(reader),
        registry,
        AggregationOptions::from(&settings.aggregation),
    );

    let totals = aggregator.value_account(account, args.block).await?;

    if args.json {
        let map: serde_json::Map<String, serde_json::Value> = totals
            .iter()
            .map(|(token, amount)| {
                (
                    address_to_string(*token),
                    serde_json::Value::String(amount.to_string()),
                )
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    println!("{:<44} {:>40} {:>30}", "asset", "raw amount", "amount");
    for (token, amount) in totals.iter() {
        let scaled = aggregator
            .registry()
            .token_decimals(*token)
            .and_then(|decimals| u256_to_decimal(*amount, decimals).ok())
            .map(|d| d.normalize().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<44} {:>40} {:>30}", address_to_string(*token), amount, scaled);
    }

    Ok(())
}
