use ethers::types::{Address, U256};

// Decoded `positions(tokenId)` return of the NonfungiblePositionManager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionDetails {
    pub nonce: u128,
    pub operator: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub fee_growth_inside0_last_x128: U256,
    pub fee_growth_inside1_last_x128: U256,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
}

// Decoded `slot0()` return of a Uniswap V3 pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot0Data {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub observation_index: u16,
    pub observation_cardinality: u16,
    pub observation_cardinality_next: u16,
    pub fee_protocol: u8,
    pub unlocked: bool,
}

/// One held asset: a fungible balance when `id` is zero, otherwise an NFT
/// token id on the `address` contract (with `amount` usually 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetEntry {
    pub address: Address,
    pub id: U256,
    pub amount: U256,
}

impl AssetEntry {
    pub fn is_fungible(&self) -> bool {
        self.id.is_zero()
    }
}

/// Account asset enumeration as three parallel arrays of equal length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetData {
    addresses: Vec<Address>,
    ids: Vec<U256>,
    amounts: Vec<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Asset data arrays differ in length: {addresses} addresses, {ids} ids, {amounts} amounts")]
pub struct AssetDataLengthMismatch {
    pub addresses: usize,
    pub ids: usize,
    pub amounts: usize,
}

impl AssetData {
    pub fn new(
        addresses: Vec<Address>,
        ids: Vec<U256>,
        amounts: Vec<U256>,
    ) -> Result<Self, AssetDataLengthMismatch> {
        if addresses.len() != ids.len() || addresses.len() != amounts.len() {
            return Err(AssetDataLengthMismatch {
                addresses: addresses.len(),
                ids: ids.len(),
                amounts: amounts.len(),
            });
        }
        Ok(Self {
            addresses,
            ids,
            amounts,
        })
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = AssetEntry> + '_ {
        self.addresses
            .iter()
            .zip(&self.ids)
            .zip(&self.amounts)
            .map(|((address, id), amount)| AssetEntry {
                address: *address,
                id: *id,
                amount: *amount,
            })
    }
}
