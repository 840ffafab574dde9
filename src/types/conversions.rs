//! Boundary conversions between on-chain values and what users read.
//!
//! Token balances leave the crate as raw `U256` integers; rendering them in
//! whole-token units and parsing configured addresses happens here.

use ethers::types::{Address, U256};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Scales a raw token amount down by `decimals`.
///
/// `1_500_000` with 6 decimals is `1.5`. Fails with
/// [`ConversionError::InvalidDecimal`] when the raw amount exceeds what a
/// `Decimal` can hold (about 7.9e28), and with [`ConversionError::Overflow`]
/// when `10^decimals` does.
pub fn u256_to_decimal(value: U256, decimals: u8) -> Result<Decimal, ConversionError> {
    let raw = Decimal::from_str(&value.to_string())
        .map_err(|e| ConversionError::InvalidDecimal(format!("{}: {}", value, e)))?;

    let divisor = 10u128
        .checked_pow(decimals as u32)
        .and_then(Decimal::from_u128)
        .ok_or(ConversionError::Overflow)?;
    raw.checked_div(divisor).ok_or(ConversionError::Overflow)
}

/// Lowercase `0x`-prefixed hex, the form result keys are rendered in.
pub fn address_to_string(addr: Address) -> String {
    format!("{:?}", addr).to_lowercase()
}

// Accepts any hex case; checksums are not enforced
pub fn string_to_address(s: &str) -> Result<Address, ConversionError> {
    Address::from_str(s.trim()).map_err(|e| ConversionError::InvalidAddress(format!("{}: {}", s, e)))
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The raw amount does not fit a `Decimal`.
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),
    /// `10^decimals` does not fit a `Decimal`.
    #[error("Overflow in conversion")]
    Overflow,
    /// Not a 20-byte hex address; carries the offending input.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_to_decimal_scales_by_decimals() {
        let usdc = u256_to_decimal(U256::from(1_500_000u64), 6).unwrap();
        assert_eq!(usdc, Decimal::from_str("1.5").unwrap());

        let weth = u256_to_decimal(U256::from(12_289_573_077_240_346u64), 18).unwrap();
        assert_eq!(weth, Decimal::from_str("0.012289573077240346").unwrap());
    }

    #[test]
    fn test_u256_to_decimal_out_of_range() {
        // 10^29 exceeds the Decimal mantissa
        assert!(matches!(
            u256_to_decimal(U256::one(), 29),
            Err(ConversionError::Overflow)
        ));
        assert!(matches!(
            u256_to_decimal(U256::MAX, 18),
            Err(ConversionError::InvalidDecimal(_))
        ));
        assert_eq!(u256_to_decimal(U256::from(42u64), 0).unwrap(), Decimal::from(42));
    }

    #[test]
    fn test_string_to_address_is_case_insensitive() {
        let checksummed = string_to_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap();
        let lower = string_to_address("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913").unwrap();
        assert_eq!(checksummed, lower);
        assert_eq!(
            address_to_string(checksummed),
            "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
        );
        assert!(string_to_address("0x1234").is_err());
    }
}
