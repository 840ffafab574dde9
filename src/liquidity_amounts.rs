//! Liquidity -> token amount conversion (LiquidityAmounts.sol equivalent).
//!
//! Every function truncates after each division in the same order as the
//! on-chain library, so a position valued here matches what the pool would pay
//! out for the same liquidity.

use crate::v3_math::{get_sqrt_ratio_at_tick, V3MathError, Q96};
use ethers::types::{U256, U512};

/// floor(a * b / denominator) with a 512-bit intermediate product.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, V3MathError> {
    if denominator.is_zero() {
        return Err(V3MathError::DivisionByZero);
    }
    let product: U512 = a.full_mul(b);
    let quotient = product / U512::from(denominator);
    U256::try_from(quotient).map_err(|_| V3MathError::Overflow)
}

fn sorted(sqrt_ratio_a_x96: U256, sqrt_ratio_b_x96: U256) -> (U256, U256) {
    if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_b_x96, sqrt_ratio_a_x96)
    } else {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96)
    }
}

/// Amount of token0 held by `liquidity` between two sqrt prices.
///
/// `floor(floor((L << 96) * (b - a) / b) / a)`; the bounds may be passed in
/// either order.
pub fn get_amount0_for_liquidity(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
) -> Result<U256, V3MathError> {
    let (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    if sqrt_ratio_a_x96.is_zero() {
        return Err(V3MathError::DivisionByZero);
    }

    let numerator1 = U256::from(liquidity) << 96;
    let numerator2 = sqrt_ratio_b_x96 - sqrt_ratio_a_x96;

    Ok(mul_div(numerator1, numerator2, sqrt_ratio_b_x96)? / sqrt_ratio_a_x96)
}

/// Amount of token1 held by `liquidity` between two sqrt prices.
pub fn get_amount1_for_liquidity(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
) -> Result<U256, V3MathError> {
    let (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);

    mul_div(
        U256::from(liquidity),
        sqrt_ratio_b_x96 - sqrt_ratio_a_x96,
        Q96,
    )
}

/// Token0/token1 amounts of a position at the pool's current tick.
///
/// Below the range the position is all token0, above it all token1, and in
/// between it is split at the current price. `tick_lower` and `tick_upper` may
/// arrive swapped.
pub fn get_amounts_from_ticks(
    tick_current: i32,
    tick_lower: i32,
    tick_upper: i32,
    liquidity: u128,
) -> Result<(U256, U256), V3MathError> {
    let sqrt_ratio_x96 = get_sqrt_ratio_at_tick(tick_current)?;
    let (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = sorted(
        get_sqrt_ratio_at_tick(tick_lower)?,
        get_sqrt_ratio_at_tick(tick_upper)?,
    );

    if sqrt_ratio_x96 <= sqrt_ratio_a_x96 {
        let amount0 = get_amount0_for_liquidity(sqrt_ratio_a_x96, sqrt_ratio_b_x96, liquidity)?;
        Ok((amount0, U256::zero()))
    } else if sqrt_ratio_x96 < sqrt_ratio_b_x96 {
        let amount0 = get_amount0_for_liquidity(sqrt_ratio_x96, sqrt_ratio_b_x96, liquidity)?;
        let amount1 = get_amount1_for_liquidity(sqrt_ratio_a_x96, sqrt_ratio_x96, liquidity)?;
        Ok((amount0, amount1))
    } else {
        let amount1 = get_amount1_for_liquidity(sqrt_ratio_a_x96, sqrt_ratio_b_x96, liquidity)?;
        Ok((U256::zero(), amount1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v3_math::{MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK};

    const ONE_E18: u128 = 1_000_000_000_000_000_000;

    fn dec(s: &str) -> U256 {
        U256::from_dec_str(s).unwrap()
    }

    #[test]
    fn test_regimes_around_symmetric_range() {
        let (a0, a1) = get_amounts_from_ticks(-200, -100, 100, ONE_E18).unwrap();
        assert_eq!(a0, dec("9999541693800299"));
        assert!(a1.is_zero());

        let (a0, a1) = get_amounts_from_ticks(200, -100, 100, ONE_E18).unwrap();
        assert!(a0.is_zero());
        assert_eq!(a1, dec("9999541693800299"));

        let (a0, a1) = get_amounts_from_ticks(0, -100, 100, ONE_E18).unwrap();
        assert_eq!(a0, dec("4987272070749096"));
        assert_eq!(a1, dec("4987272070749096"));

        let (a0, a1) = get_amounts_from_ticks(50, -100, 100, ONE_E18).unwrap();
        assert_eq!(a0, dec("2490519147795409"));
        assert_eq!(a1, dec("7490274372014627"));
    }

    #[test]
    fn test_range_boundaries_are_single_sided() {
        // current == lower is entirely token0
        let (a0, a1) = get_amounts_from_ticks(-100, -100, 100, ONE_E18).unwrap();
        assert_eq!(a0, dec("9999541693800299"));
        assert!(a1.is_zero());

        // current == upper is entirely token1
        let (a0, a1) = get_amounts_from_ticks(100, -100, 100, ONE_E18).unwrap();
        assert!(a0.is_zero());
        assert_eq!(a1, dec("9999541693800299"));
    }

    #[test]
    fn test_swapped_ticks_are_normalized() {
        assert_eq!(
            get_amounts_from_ticks(0, 100, -100, ONE_E18).unwrap(),
            get_amounts_from_ticks(0, -100, 100, ONE_E18).unwrap()
        );
    }

    #[test]
    fn test_amount0_argument_order_irrelevant() {
        let a = get_sqrt_ratio_at_tick(-100).unwrap();
        let b = get_sqrt_ratio_at_tick(100).unwrap();
        let forward = get_amount0_for_liquidity(a, b, ONE_E18).unwrap();
        let backward = get_amount0_for_liquidity(b, a, ONE_E18).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, dec("9999541693800299"));
        assert_eq!(
            get_amount1_for_liquidity(b, a, ONE_E18).unwrap(),
            get_amount1_for_liquidity(a, b, ONE_E18).unwrap()
        );
    }

    #[test]
    fn test_realistic_weth_usdc_position() {
        let (a0, a1) =
            get_amounts_from_ticks(-197000, -199980, -194100, 1_234_567_890_123_456).unwrap();
        assert_eq!(a0, dec("3157501868812665937"));
        assert_eq!(a1, dec("9018640295"));
    }

    #[test]
    fn test_wide_range_token1_uses_q96_denominator() {
        let (a0, a1) =
            get_amounts_from_ticks(-444685, -478736, 845301, 47_711_344_518_198_494_368).unwrap();
        assert_eq!(a0, dec("215948882557258431816799587061"));
        assert_eq!(a1, dec("8620282790"));

        // one unit of sqrt price spread over 2^96 liquidity is exactly one token1
        assert_eq!(
            get_amount1_for_liquidity(Q96, Q96 + U256::one(), 1u128 << 96).unwrap(),
            U256::one()
        );
    }

    #[test]
    fn test_full_range_max_liquidity_does_not_wrap() {
        // (L << 96) * (b - a) needs more than 256 bits here
        assert_eq!(
            get_amount0_for_liquidity(MIN_SQRT_RATIO, MAX_SQRT_RATIO, u128::MAX).unwrap(),
            dec("6276865795046577716716727052920969657919881535178523893767")
        );
        assert_eq!(
            get_amount1_for_liquidity(MIN_SQRT_RATIO, MAX_SQRT_RATIO, u128::MAX).unwrap(),
            dec("6276865796315986613307619852238232712829278890652951511957")
        );
    }

    #[test]
    fn test_out_of_range_tick_propagates() {
        assert_eq!(
            get_amounts_from_ticks(MAX_TICK + 1, -100, 100, ONE_E18),
            Err(V3MathError::TickOutOfRange(MAX_TICK + 1))
        );
        assert_eq!(
            get_amounts_from_ticks(0, MIN_TICK - 1, 100, ONE_E18),
            Err(V3MathError::TickOutOfRange(MIN_TICK - 1))
        );
    }

    #[test]
    fn test_zero_liquidity_and_empty_range() {
        assert_eq!(
            get_amounts_from_ticks(0, -100, 100, 0).unwrap(),
            (U256::zero(), U256::zero())
        );
        assert_eq!(
            get_amounts_from_ticks(0, 10, 10, ONE_E18).unwrap(),
            (U256::zero(), U256::zero())
        );
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(
            mul_div(U256::MAX, U256::from(2), U256::from(4)).unwrap(),
            U256::MAX / 2
        );
        assert_eq!(
            mul_div(U256::one(), U256::one(), U256::zero()),
            Err(V3MathError::DivisionByZero)
        );
        assert_eq!(
            mul_div(U256::MAX, U256::MAX, U256::one()),
            Err(V3MathError::Overflow)
        );
    }
}
