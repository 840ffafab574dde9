use ethers::prelude::*;

// Arcadia margin account: enumerates every asset held as parallel arrays.
// assetIds[i] == 0 marks a fungible balance, anything else an NFT token id.
abigen!(
    IArcadiaAccount,
    r#"[
        function generateAssetData() external view returns (address[] assetAddresses, uint256[] assetIds, uint256[] assetAmounts)
    ]"#
);
