use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    #[serde(default = "default_http_url")]
    pub http_url: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Retries on transport failures only; reverts are never retried
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_http_url() -> String {
    "https://mainnet.base.org".to_string()
}
fn default_request_timeout_seconds() -> u64 {
    10
}
fn default_max_retries() -> usize {
    2
}
fn default_backoff_base_ms() -> u64 {
    200
}
fn default_backoff_max_ms() -> u64 {
    2000
}

impl Default for Rpc {
    fn default() -> Self {
        Self {
            http_url: default_http_url(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Aggregation {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Record a zero-amount marker when a pool's slot0 cannot be read
    /// (false drops the entry entirely)
    #[serde(default = "default_true")]
    pub record_unreadable_pools: bool,
    /// Add uncollected tokensOwed0/1 on top of the liquidity amounts
    #[serde(default = "default_false")]
    pub include_tokens_owed: bool,
}

fn default_max_concurrency() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}

impl Default for Aggregation {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            record_unreadable_pools: default_true(),
            include_tokens_owed: default_false(),
        }
    }
}

/// Static pool table entry; addresses stay strings until the registry parses them.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PoolMappingConfig {
    pub name: String,
    pub pool: String,
    pub token0: String,
    pub token1: String,
    pub decimals0: u8,
    pub decimals1: u8,
}

// Uniswap V3 pools on Base
fn default_pools() -> Vec<PoolMappingConfig> {
    vec![
        PoolMappingConfig {
            name: "wETH-USDC".to_string(),
            pool: "0xd0b53D9277642d899DF5C87A3966A349A798F224".to_string(),
            token0: "0x4200000000000000000000000000000000000006".to_string(),
            token1: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            decimals0: 18,
            decimals1: 6,
        },
        PoolMappingConfig {
            name: "wETH-USDbC".to_string(),
            pool: "0x4C36388bE6F416A29C8d8Eee81C771cE6bE14B18".to_string(),
            token0: "0x4200000000000000000000000000000000000006".to_string(),
            token1: "0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA".to_string(),
            decimals0: 18,
            decimals1: 6,
        },
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub rpc: Rpc,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default = "default_pools")]
    pub pools: Vec<PoolMappingConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc: Rpc::default(),
            aggregation: Aggregation::default(),
            pools: default_pools(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load("Config.toml")
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// `SDK_RPC_HTTP_URL` wins; otherwise `ALCHEMY_KEY` selects the Alchemy Base endpoint.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("SDK_RPC_HTTP_URL") {
            let trimmed = url.trim();
            if !trimmed.is_empty() {
                self.rpc.http_url = trimmed.to_string();
                return;
            }
        }
        if let Ok(key) = env::var("ALCHEMY_KEY") {
            let trimmed = key.trim();
            if !trimmed.is_empty() {
                self.rpc.http_url = format!("https://base-mainnet.g.alchemy.com/v2/{}", trimmed);
            }
        }
    }
}
