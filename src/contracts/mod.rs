// Contracts Module - read-only ABIs for position valuation

pub mod i_arcadia_account;
pub mod i_nonfungible_position_manager;
pub mod i_uniswap_v3_pool;

pub use i_arcadia_account::IArcadiaAccount;
pub use i_nonfungible_position_manager::INonfungiblePositionManager;
pub use i_uniswap_v3_pool::IUniswapV3Pool;
