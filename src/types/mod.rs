pub mod chain_data;
pub mod conversions;

pub use chain_data::{AssetData, AssetDataLengthMismatch, AssetEntry, PositionDetails, Slot0Data};
