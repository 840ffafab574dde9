// UniswapV3 tick math, bit-exact with TickMath.getSqrtRatioAtTick
use ethers::types::U256;

/// Uniswap V3 constants
pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;
pub const MIN_SQRT_RATIO: U256 = U256([4295128739, 0, 0, 0]); // getSqrtRatioAtTick(MIN_TICK)
pub const MAX_SQRT_RATIO: U256 = U256([6743328256752651558, 17280870778742802505, 4294805859, 0]); // getSqrtRatioAtTick(MAX_TICK)

/// Q96 fixed point constant
pub const Q96: U256 = U256([0, 4294967296, 0, 0]); // 2^96

/// 2^128, the Q128 seed used when bit 0 of |tick| is clear
const Q128: U256 = U256([0, 0, 1, 0]);

/// Seed used when bit 0 of |tick| is set: 1/sqrt(1.0001) in Q128
const ODD_TICK_SEED: u128 = 0xfffcb933bd6fad37aa2d162d1a594001;

/// 1/sqrt(1.0001)^(2^k) in Q128 for k = 1..19
const TICK_BIT_MULTIPLIERS: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum V3MathError {
    #[error("Tick {0} outside Uniswap V3 valid range [-887272, 887272]")]
    TickOutOfRange(i32),
    #[error("Invalid sqrt price: {0}")]
    InvalidSqrtPrice(U256),
    #[error("Invalid price: {0}")]
    InvalidPrice(f64),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Overflow in fixed-point arithmetic")]
    Overflow,
}

/// Calculate sqrt price from tick (TickMath.getSqrtRatioAtTick equivalent).
///
/// Returns the Q64.96 sqrt price for `tick`, reproducing the on-chain integer
/// math exactly: same constants, same shift order, same final round-up.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, V3MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(V3MathError::TickOutOfRange(tick));
    }

    let abs_tick = tick.unsigned_abs();

    // ratio < 2^129 and every multiplier < 2^128, so each product fits in 256 bits
    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(ODD_TICK_SEED)
    } else {
        Q128
    };

    for (bit, multiplier) in TICK_BIT_MULTIPLIERS {
        if abs_tick & bit != 0 {
            ratio = (ratio * U256::from(multiplier)) >> 128;
        }
    }

    if tick > 0 {
        ratio = div_two_pow_256(ratio)?;
    }

    // Q128.128 -> Q64.96, rounding up
    let remainder = ratio % (U256::one() << 32);
    let shifted = ratio >> 32;
    if remainder.is_zero() {
        Ok(shifted)
    } else {
        Ok(shifted + U256::one())
    }
}

/// floor(2^256 / d) without a 257-bit intermediate.
fn div_two_pow_256(d: U256) -> Result<U256, V3MathError> {
    if d.is_zero() {
        return Err(V3MathError::DivisionByZero);
    }
    if d == U256::one() {
        return Err(V3MathError::Overflow);
    }
    // 2^256 = (MAX / d) * d + (MAX % d) + 1
    let quotient = U256::MAX / d;
    let remainder = U256::MAX % d;
    if remainder + U256::one() == d {
        Ok(quotient + U256::one())
    } else {
        Ok(quotient)
    }
}

/// Calculate tick from sqrt price (inverse of above).
///
/// Floating point: used for display and sanity checks, never compared against
/// ledger state.
pub fn sqrt_price_x96_to_tick(sqrt_price_x96: U256) -> Result<i32, V3MathError> {
    if sqrt_price_x96.is_zero() {
        return Err(V3MathError::InvalidSqrtPrice(sqrt_price_x96));
    }

    let sqrt_price = u256_to_f64_lossy(sqrt_price_x96) / q96_f64();
    let tick = 2.0 * sqrt_price.ln() / 1.0001f64.ln();
    Ok(tick.round() as i32)
}

/// sqrt(price) * 2^96, truncated toward zero.
pub fn sqrt_price_from_price(price: f64) -> Result<U256, V3MathError> {
    if !price.is_finite() || price < 0.0 {
        return Err(V3MathError::InvalidPrice(price));
    }
    f64_to_u256_truncated(price.sqrt() * q96_f64())
}

fn q96_f64() -> f64 {
    (1u128 << 96) as f64
}

/// Exact truncation of a finite, non-negative f64 into U256.
fn f64_to_u256_truncated(value: f64) -> Result<U256, V3MathError> {
    if value < 1.0 {
        return Ok(U256::zero());
    }

    let bits = value.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32 - 1075;
    let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);

    if exponent >= 0 {
        // mantissa has 53 significant bits
        if exponent + 53 > 256 {
            return Err(V3MathError::Overflow);
        }
        Ok(U256::from(mantissa) << exponent as usize)
    } else {
        Ok(U256::from(mantissa >> (-exponent) as u32))
    }
}

/// Approximate f64 of a U256.
///
/// The top 64 significant bits are taken as the mantissa and scaled by the
/// dropped bit count, so the result is within one f64 ulp of the true value.
pub fn u256_to_f64_lossy(v: U256) -> f64 {
    let bits = v.bits();
    if bits <= 64 {
        return v.low_u64() as f64;
    }
    let shift = bits - 64;
    let top = (v >> shift).low_u64() as f64;
    top * 2f64.powi(shift as i32)
}

/// Converts a Uniswap V3 tick to a price.
/// The price is the ratio of token1 to token0 in raw units.
pub fn tick_to_price(tick: i32) -> f64 {
    (tick as f64 * 1.0001f64.ln()).exp()
}
