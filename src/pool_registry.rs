//! Static token-pair -> pool table.
//!
//! A position only names its two tokens and fee; the pool whose `slot0` gives
//! the current tick is resolved here. Pairs are registered under both
//! orderings so a position listing the tokens swapped still matches.

use crate::settings::PoolMappingConfig;
use crate::types::conversions::{string_to_address, ConversionError};
use ethers::types::Address;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMapping {
    pub name: String,
    pub pool: Address,
    pub token0: Address,
    pub token1: Address,
    pub decimals0: u8,
    pub decimals1: u8,
}

impl TryFrom<&PoolMappingConfig> for PoolMapping {
    type Error = ConversionError;

    fn try_from(raw: &PoolMappingConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            name: raw.name.clone(),
            pool: string_to_address(&raw.pool)?,
            token0: string_to_address(&raw.token0)?,
            token1: string_to_address(&raw.token1)?,
            decimals0: raw.decimals0,
            decimals1: raw.decimals1,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    pools: Vec<PoolMapping>,
    by_pair: HashMap<(Address, Address), usize>,
}

impl PoolRegistry {
    pub fn new(pools: Vec<PoolMapping>) -> Self {
        let mut by_pair = HashMap::with_capacity(pools.len() * 2);
        for (index, pool) in pools.iter().enumerate() {
            // first mapping wins on duplicate pairs
            by_pair.entry((pool.token0, pool.token1)).or_insert(index);
            by_pair.entry((pool.token1, pool.token0)).or_insert(index);
        }
        Self { pools, by_pair }
    }

    pub fn from_config(raw: &[PoolMappingConfig]) -> Result<Self, ConversionError> {
        let pools = raw
            .iter()
            .map(PoolMapping::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(pools))
    }

    /// Pool for a token pair, in either order.
    pub fn find(&self, token_a: Address, token_b: Address) -> Option<&PoolMapping> {
        self.by_pair
            .get(&(token_a, token_b))
            .and_then(|index| self.pools.get(*index))
    }

    /// Decimals of a token, from the first mapping that lists it.
    pub fn token_decimals(&self, token: Address) -> Option<u8> {
        self.pools.iter().find_map(|pool| {
            if pool.token0 == token {
                Some(pool.decimals0)
            } else if pool.token1 == token {
                Some(pool.decimals1)
            } else {
                None
            }
        })
    }

    pub fn pools(&self) -> &[PoolMapping] {
        &self.pools
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn base_registry() -> PoolRegistry {
        PoolRegistry::from_config(&Settings::default().pools).unwrap()
    }

    #[test]
    fn test_find_is_order_insensitive() {
        let registry = base_registry();
        let weth = string_to_address("0x4200000000000000000000000000000000000006").unwrap();
        let usdc = string_to_address("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913").unwrap();

        let forward = registry.find(weth, usdc).unwrap();
        let reversed = registry.find(usdc, weth).unwrap();
        assert_eq!(forward, reversed);
        assert_eq!(forward.name, "wETH-USDC");
        assert_eq!(
            forward.pool,
            string_to_address("0xd0b53d9277642d899df5c87a3966a349a798f224").unwrap()
        );
    }

    #[test]
    fn test_unknown_pair_is_none() {
        let registry = base_registry();
        let weth = string_to_address("0x4200000000000000000000000000000000000006").unwrap();
        assert!(registry.find(weth, Address::repeat_byte(0x11)).is_none());
        assert!(registry.find(weth, weth).is_none());
    }

    #[test]
    fn test_token_decimals() {
        let registry = base_registry();
        let weth = string_to_address("0x4200000000000000000000000000000000000006").unwrap();
        let usdbc = string_to_address("0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA").unwrap();
        assert_eq!(registry.token_decimals(weth), Some(18));
        assert_eq!(registry.token_decimals(usdbc), Some(6));
        assert_eq!(registry.token_decimals(Address::zero()), None);
    }

    #[test]
    fn test_invalid_address_rejected() {
        let mut raw = Settings::default().pools;
        raw[0].pool = "not-an-address".to_string();
        assert!(PoolRegistry::from_config(&raw).is_err());
    }
}
