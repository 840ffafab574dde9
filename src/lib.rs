//! # Uniswap V3 Position Valuer
//!
//! Values concentrated-liquidity positions in their underlying tokens, with tick
//! and amount math that reproduces the on-chain Uniswap V3 libraries bit for bit.
//!
//! ## Overview
//!
//! - **Tick math**: tick ⇄ Q64.96 sqrt price (`TickMath.getSqrtRatioAtTick`)
//! - **Liquidity amounts**: token0/token1 owed to a liquidity over a tick range
//! - **Aggregation**: walks an account's assets (fungible balances and position
//!   NFTs) and sums them per underlying token
//!
//! ## Architecture
//!
//! ### Math Layer
//! Pure, synchronous integer arithmetic on `U256`/`U512`. No I/O.
//!
//! ### Read Layer
//! The [`ChainReader`] trait exposes three typed read calls
//! (`positions`, `slot0`, `generateAssetData`). [`EthersChainReader`] implements
//! it over an injected ethers provider.
//!
//! ### Aggregation Layer
//! Resolves each position NFT to a pool through the static [`PoolRegistry`] and
//! degrades per entry on read failures.

// Math
/// Uniswap V3 tick math (tick ⇄ sqrt price)
pub mod v3_math;
/// Liquidity to token amount conversion
pub mod liquidity_amounts;

// Reading & aggregation
/// Typed chain reads and the ethers-backed reader
pub mod chain_reader;
/// Per-account position aggregation
pub mod aggregation;
/// Static token pair -> pool table
pub mod pool_registry;

/// Common types and data structures
pub mod types;

// Contracts (Public ABIs Only)
/// Smart contract ABIs (read-only)
pub mod contracts;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use aggregation::{aggregate_positions, AggregationError, PositionAggregator, PositionTotals};
pub use chain_reader::{ChainReader, EthersChainReader, ReadError};
pub use pool_registry::PoolRegistry;
pub use settings::Settings;
