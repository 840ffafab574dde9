//! # Position Aggregation
//!
//! Values an account's holdings in underlying tokens.
//!
//! Each held asset is either a fungible balance (id zero), which is counted as
//! is, or a Uniswap V3 position NFT, which is resolved to its pool and tick
//! range through a [`ChainReader`] and converted to token0/token1 amounts at the
//! pool's current tick.
//!
//! ## Degradation
//!
//! A bad asset never discards the rest of the inventory:
//!
//! | Situation | Result |
//! |---|---|
//! | `positions()` read fails (not a position NFT) | NFT contract recorded with amount 0 |
//! | token pair not in the [`PoolRegistry`] | NFT contract recorded with amount 0 |
//! | `slot0()` read fails | amount 0 marker, or dropped if `record_unreadable_pools` is off |
//! | tick outside ±887272 | [`AggregationError::Domain`], the whole pass fails |
//!
//! Entries are independent, so up to `max_concurrency` of them are resolved at
//! once. Summation is commutative; the output order follows the input order.

use crate::chain_reader::{ChainReader, ReadError};
use crate::liquidity_amounts::get_amounts_from_ticks;
use crate::pool_registry::PoolRegistry;
use crate::settings::Aggregation;
use crate::types::{AssetData, AssetEntry, PositionDetails};
use crate::v3_math::V3MathError;
use ethers::types::{Address, U256};
use futures::stream::{self, StreamExt, TryStreamExt};
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("Position {token_id} on {contract:?} has invalid tick data: {source}")]
    Domain {
        contract: Address,
        token_id: U256,
        #[source]
        source: V3MathError,
    },
    #[error("Failed to enumerate account assets: {0}")]
    AssetData(#[from] ReadError),
}

#[derive(Debug, Clone)]
pub struct AggregationOptions {
    pub max_concurrency: usize,
    pub record_unreadable_pools: bool,
    pub include_tokens_owed: bool,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self::from(&Aggregation::default())
    }
}

impl From<&Aggregation> for AggregationOptions {
    fn from(raw: &Aggregation) -> Self {
        Self {
            max_concurrency: raw.max_concurrency.max(1),
            record_unreadable_pools: raw.record_unreadable_pools,
            include_tokens_owed: raw.include_tokens_owed,
        }
    }
}

/// A resolved liquidity position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub pool: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
}

impl Position {
    pub fn from_details(pool: Address, details: &PositionDetails) -> Self {
        Self {
            pool,
            token0: details.token0,
            token1: details.token1,
            fee: details.fee,
            tick_lower: details.tick_lower,
            tick_upper: details.tick_upper,
            liquidity: details.liquidity,
            tokens_owed0: details.tokens_owed0,
            tokens_owed1: details.tokens_owed1,
        }
    }

    /// (lower, upper), ordered even if the source data is not.
    pub fn tick_range(&self) -> (i32, i32) {
        if self.tick_lower <= self.tick_upper {
            (self.tick_lower, self.tick_upper)
        } else {
            (self.tick_upper, self.tick_lower)
        }
    }

    /// Token0/token1 held by the position's liquidity at `tick_current`.
    pub fn amounts_at(&self, tick_current: i32) -> Result<(U256, U256), V3MathError> {
        let (lower, upper) = self.tick_range();
        get_amounts_from_ticks(tick_current, lower, upper, self.liquidity)
    }
}

/// Token address -> accumulated raw amount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionTotals(IndexMap<Address, U256>);

impl PositionTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` under `token`, inserting it if absent. Zero records presence.
    pub fn add(&mut self, token: Address, amount: U256) {
        let total = self.0.entry(token).or_insert_with(U256::zero);
        let (sum, overflowed) = total.overflowing_add(amount);
        if overflowed {
            warn!("Total for {:?} overflowed U256, saturating", token);
            *total = U256::MAX;
        } else {
            *total = sum;
        }
    }

    pub fn get(&self, token: &Address) -> Option<U256> {
        self.0.get(token).copied()
    }

    pub fn contains(&self, token: &Address) -> bool {
        self.0.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.0.iter()
    }
}

impl IntoIterator for PositionTotals {
    type Item = (Address, U256);
    type IntoIter = indexmap::map::IntoIter<Address, U256>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// What one asset entry contributes to the totals.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryOutcome {
    Balance(Address, U256),
    Position {
        token0: Address,
        amount0: U256,
        token1: Address,
        amount1: U256,
    },
    PresenceOnly(Address),
    Skipped,
}

impl EntryOutcome {
    fn apply(self, totals: &mut PositionTotals) {
        match self {
            EntryOutcome::Balance(token, amount) => totals.add(token, amount),
            EntryOutcome::Position {
                token0,
                amount0,
                token1,
                amount1,
            } => {
                totals.add(token0, amount0);
                totals.add(token1, amount1);
            }
            EntryOutcome::PresenceOnly(contract) => totals.add(contract, U256::zero()),
            EntryOutcome::Skipped => {}
        }
    }
}

async fn resolve_entry<R: ChainReader + ?Sized>(
    entry: AssetEntry,
    reader: &R,
    registry: &PoolRegistry,
    options: &AggregationOptions,
    at_block: Option<u64>,
) -> Result<EntryOutcome, AggregationError> {
    if entry.is_fungible() {
        return Ok(EntryOutcome::Balance(entry.address, entry.amount));
    }

    let contract = entry.address;
    let token_id = entry.id;

    let details = match reader.positions(contract, token_id, at_block).await {
        Ok(details) => details,
        Err(e) => {
            debug!("Asset {} on {:?} is not a V3 position: {}", token_id, contract, e);
            return Ok(EntryOutcome::PresenceOnly(contract));
        }
    };

    let Some(mapping) = registry.find(details.token0, details.token1) else {
        debug!(
            "No pool mapping for {:?}/{:?} (position {} on {:?})",
            details.token0, details.token1, token_id, contract
        );
        return Ok(EntryOutcome::PresenceOnly(contract));
    };

    let slot0 = match reader.slot0(mapping.pool, at_block).await {
        Ok(slot0) => slot0,
        Err(e) => {
            warn!("slot0 unavailable for pool {} ({:?}): {}", mapping.name, mapping.pool, e);
            return Ok(if options.record_unreadable_pools {
                EntryOutcome::PresenceOnly(contract)
            } else {
                EntryOutcome::Skipped
            });
        }
    };

    let position = Position::from_details(mapping.pool, &details);
    let (mut amount0, mut amount1) =
        position
            .amounts_at(slot0.tick)
            .map_err(|source| AggregationError::Domain {
                contract,
                token_id,
                source,
            })?;

    if options.include_tokens_owed {
        amount0 = amount0.saturating_add(U256::from(position.tokens_owed0));
        amount1 = amount1.saturating_add(U256::from(position.tokens_owed1));
    }

    debug!(
        "Position {} in {}: tick {} in [{}, {}] -> {} / {}",
        token_id, mapping.name, slot0.tick, position.tick_lower, position.tick_upper, amount0, amount1
    );

    Ok(EntryOutcome::Position {
        token0: position.token0,
        amount0,
        token1: position.token1,
        amount1,
    })
}

/// Sums every asset in `asset_data` into per-token totals.
///
/// Fungible entries never touch the reader. Only out-of-range tick data aborts
/// the pass; every read failure degrades per entry.
pub async fn aggregate_positions<R: ChainReader + ?Sized>(
    asset_data: &AssetData,
    reader: &R,
    registry: &PoolRegistry,
    options: &AggregationOptions,
    at_block: Option<u64>,
) -> Result<PositionTotals, AggregationError> {
    let outcomes: Vec<EntryOutcome> = stream::iter(asset_data.entries())
        .map(|entry| resolve_entry(entry, reader, registry, options, at_block))
        .buffered(options.max_concurrency.max(1))
        .try_collect()
        .await?;

    let mut totals = PositionTotals::new();
    for outcome in outcomes {
        outcome.apply(&mut totals);
    }
    Ok(totals)
}

/// Composition root for valuing accounts with one reader and pool table.
pub struct PositionAggregator<R: ?Sized> {
    reader: Arc<R>,
    registry: PoolRegistry,
    options: AggregationOptions,
}

impl<R: ChainReader + ?Sized> PositionAggregator<R> {
    pub fn new(reader: Arc<R>, registry: PoolRegistry, options: AggregationOptions) -> Self {
        Self {
            reader,
            registry,
            options,
        }
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub async fn aggregate(
        &self,
        asset_data: &AssetData,
        at_block: Option<u64>,
    ) -> Result<PositionTotals, AggregationError> {
        aggregate_positions(
            asset_data,
            self.reader.as_ref(),
            &self.registry,
            &self.options,
            at_block,
        )
        .await
    }

    /// Enumerates `account` with `generateAssetData()` and aggregates the result.
    pub async fn value_account(
        &self,
        account: Address,
        at_block: Option<u64>,
    ) -> Result<PositionTotals, AggregationError> {
        let asset_data = self.reader.asset_data(account, at_block).await?;
        info!(
            "Account {:?} holds {} assets{}",
            account,
            asset_data.len(),
            at_block.map(|b| format!(" at block {}", b)).unwrap_or_default()
        );
        self.aggregate(&asset_data, at_block).await
    }
}
