use ethers::prelude::*;

// uint160 sqrtPriceX96 / int24 tick must stay exact: a wider type silently
// changes the return decoding.
abigen!(
    IUniswapV3Pool,
    r#"[
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked)
    ]"#
);
