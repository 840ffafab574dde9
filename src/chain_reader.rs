//! # Chain Reader
//!
//! Read-only access to the three contract calls position valuation needs:
//! `positions(tokenId)` on a NonfungiblePositionManager, `slot0()` on a pool and
//! `generateAssetData()` on an Arcadia account.
//!
//! The core only talks to the [`ChainReader`] trait; [`EthersChainReader`] is the
//! production implementation over any ethers `Middleware`. The caller owns the
//! provider and hands it in, there is no global client.
//!
//! ## Failure model
//!
//! Every call fails with a [`ReadError`]:
//!
//! - `InterfaceMismatch`: the call reverted, the target has no code, or the
//!   return data does not decode into the expected tuple
//! - `Unavailable`: transport or provider failure
//! - `Timeout`: no answer within the configured deadline
//!
//! Transport failures and timeouts are retried with exponential backoff before
//! they surface; mismatches are returned immediately.

use crate::contracts::{IArcadiaAccount, INonfungiblePositionManager, IUniswapV3Pool};
use crate::settings::Rpc;
use crate::types::{AssetData, PositionDetails, Slot0Data};
use async_trait::async_trait;
use ethers::contract::ContractError;
use ethers::providers::Middleware;
use ethers::types::{Address, BlockId, BlockNumber, U256, U64};
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("{contract:?}.{function}() interface mismatch: {reason}")]
    InterfaceMismatch {
        contract: Address,
        function: &'static str,
        reason: String,
    },
    #[error("{contract:?}.{function}() unavailable: {reason}")]
    Unavailable {
        contract: Address,
        function: &'static str,
        reason: String,
    },
    #[error("{contract:?}.{function}() timed out after {after:?}")]
    Timeout {
        contract: Address,
        function: &'static str,
        after: Duration,
    },
}

impl ReadError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ReadError::InterfaceMismatch { .. })
    }

    pub fn contract(&self) -> Address {
        match self {
            ReadError::InterfaceMismatch { contract, .. }
            | ReadError::Unavailable { contract, .. }
            | ReadError::Timeout { contract, .. } => *contract,
        }
    }
}

/// Typed read queries consumed by position aggregation.
///
/// `at_block` pins the read to a historic block; `None` reads the latest state.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `positions(tokenId)` on a NonfungiblePositionManager.
    async fn positions(
        &self,
        position_manager: Address,
        token_id: U256,
        at_block: Option<u64>,
    ) -> Result<PositionDetails, ReadError>;

    /// `slot0()` on a Uniswap V3 pool.
    async fn slot0(&self, pool: Address, at_block: Option<u64>) -> Result<Slot0Data, ReadError>;

    /// `generateAssetData()` on an Arcadia account.
    async fn asset_data(
        &self,
        account: Address,
        at_block: Option<u64>,
    ) -> Result<AssetData, ReadError>;
}

const POSITIONS: &str = "positions";
const SLOT0: &str = "slot0";
const GENERATE_ASSET_DATA: &str = "generateAssetData";

/// [`ChainReader`] over an ethers middleware stack.
#[derive(Debug, Clone)]
pub struct EthersChainReader<M> {
    client: Arc<M>,
    timeout: Duration,
    max_retries: usize,
    backoff_base_ms: u64,
    backoff_max: Duration,
}

impl<M: Middleware + 'static> EthersChainReader<M> {
    pub fn new(client: Arc<M>, rpc: &Rpc) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(rpc.request_timeout_seconds),
            max_retries: rpc.max_retries,
            backoff_base_ms: rpc.backoff_base_ms,
            backoff_max: Duration::from_millis(rpc.backoff_max_ms),
        }
    }

    /// Set custom per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set custom retry count
    pub fn with_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn block_id(at_block: Option<u64>) -> Option<BlockId> {
        at_block.map(|n| BlockId::Number(BlockNumber::Number(U64::from(n))))
    }

    /// Runs one contract call with the timeout and retry policy applied.
    async fn call<T, F, Fut>(
        &self,
        contract: Address,
        function: &'static str,
        mut make_call: F,
    ) -> Result<T, ReadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ContractError<M>>>,
    {
        let timeout = self.timeout;
        // delays of base, 2*base, 4*base ... capped at backoff_max
        let strategy = ExponentialBackoff::from_millis(2)
            .factor((self.backoff_base_ms / 2).max(1))
            .max_delay(self.backoff_max)
            .map(jitter)
            .take(self.max_retries);

        RetryIf::spawn(
            strategy,
            || {
                let pending = make_call();
                async move {
                    match tokio::time::timeout(timeout, pending).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err(classify(contract, function, e)),
                        Err(_) => Err(ReadError::Timeout {
                            contract,
                            function,
                            after: timeout,
                        }),
                    }
                }
            },
            |e: &ReadError| {
                let retry = e.is_transient();
                if retry {
                    warn!("Read failed, retrying: {}", e);
                }
                retry
            },
        )
        .await
    }
}

fn classify<M: Middleware>(
    contract: Address,
    function: &'static str,
    err: ContractError<M>,
) -> ReadError {
    let reason = err.to_string();
    let mismatch = matches!(
        err,
        ContractError::Revert(_)
            | ContractError::DecodingError(_)
            | ContractError::AbiError(_)
            | ContractError::DetokenizationError(_)
            | ContractError::ContractNotDeployed
    ) || reason.to_lowercase().contains("revert");

    if mismatch {
        ReadError::InterfaceMismatch {
            contract,
            function,
            reason,
        }
    } else {
        ReadError::Unavailable {
            contract,
            function,
            reason,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainReader for EthersChainReader<M> {
    async fn positions(
        &self,
        position_manager: Address,
        token_id: U256,
        at_block: Option<u64>,
    ) -> Result<PositionDetails, ReadError> {
        let manager = INonfungiblePositionManager::new(position_manager, self.client.clone());
        let block = Self::block_id(at_block);

        let (
            nonce,
            operator,
            token0,
            token1,
            fee,
            tick_lower,
            tick_upper,
            liquidity,
            fee_growth_inside0_last_x128,
            fee_growth_inside1_last_x128,
            tokens_owed0,
            tokens_owed1,
        ) = self
            .call(position_manager, POSITIONS, || {
                let mut call = manager.positions(token_id);
                if let Some(block) = block {
                    call = call.block(block);
                }
                async move { call.call().await }
            })
            .await?;

        debug!(
            "positions({}) on {:?}: {:?}/{:?} ticks [{}, {}] liquidity {}",
            token_id, position_manager, token0, token1, tick_lower, tick_upper, liquidity
        );

        Ok(PositionDetails {
            nonce,
            operator,
            token0,
            token1,
            fee,
            tick_lower,
            tick_upper,
            liquidity,
            fee_growth_inside0_last_x128,
            fee_growth_inside1_last_x128,
            tokens_owed0,
            tokens_owed1,
        })
    }

    async fn slot0(&self, pool: Address, at_block: Option<u64>) -> Result<Slot0Data, ReadError> {
        let contract = IUniswapV3Pool::new(pool, self.client.clone());
        let block = Self::block_id(at_block);

        let (
            sqrt_price_x96,
            tick,
            observation_index,
            observation_cardinality,
            observation_cardinality_next,
            fee_protocol,
            unlocked,
        ) = self
            .call(pool, SLOT0, || {
                // the macro names slot0() as slot_0
                let mut call = contract.slot_0();
                if let Some(block) = block {
                    call = call.block(block);
                }
                async move { call.call().await }
            })
            .await?;

        Ok(Slot0Data {
            sqrt_price_x96,
            tick,
            observation_index,
            observation_cardinality,
            observation_cardinality_next,
            fee_protocol,
            unlocked,
        })
    }

    async fn asset_data(
        &self,
        account: Address,
        at_block: Option<u64>,
    ) -> Result<AssetData, ReadError> {
        let contract = IArcadiaAccount::new(account, self.client.clone());
        let block = Self::block_id(at_block);

        let (addresses, ids, amounts) = self
            .call(account, GENERATE_ASSET_DATA, || {
                let mut call = contract.generate_asset_data();
                if let Some(block) = block {
                    call = call.block(block);
                }
                async move { call.call().await }
            })
            .await?;

        AssetData::new(addresses, ids, amounts).map_err(|e| ReadError::InterfaceMismatch {
            contract: account,
            function: GENERATE_ASSET_DATA,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{encode, Token};
    use ethers::providers::{JsonRpcError, MockProvider, MockResponse, Provider};
    use ethers::types::{Bytes, I256};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_rpc() -> Rpc {
        Rpc {
            backoff_base_ms: 2,
            backoff_max_ms: 10,
            ..Rpc::default()
        }
    }

    fn mocked_reader() -> (EthersChainReader<Provider<MockProvider>>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let reader = EthersChainReader::new(Arc::new(provider), &fast_rpc())
            .with_timeout(Duration::from_secs(5))
            .with_retries(0);
        (reader, mock)
    }

    fn slot0_return(sqrt_price: U256, tick: i64) -> Bytes {
        Bytes::from(encode(&[
            Token::Uint(sqrt_price),
            Token::Int(I256::from(tick).into_raw()),
            Token::Uint(U256::from(12u64)),
            Token::Uint(U256::from(300u64)),
            Token::Uint(U256::from(300u64)),
            Token::Uint(U256::zero()),
            Token::Bool(true),
        ]))
    }

    fn rpc_error(code: i64, message: &str) -> MockResponse {
        MockResponse::Error(JsonRpcError {
            code,
            message: message.to_string(),
            data: None,
        })
    }

    #[tokio::test]
    async fn test_slot0_decodes_tuple() {
        let (reader, mock) = mocked_reader();
        let sqrt_price = U256::from_dec_str("4369979623070641835023254").unwrap();
        mock.push::<Bytes, _>(slot0_return(sqrt_price, -197_000)).unwrap();

        let slot0 = reader.slot0(Address::repeat_byte(0x01), None).await.unwrap();
        assert_eq!(slot0.sqrt_price_x96, sqrt_price);
        assert_eq!(slot0.tick, -197_000);
        assert_eq!(slot0.observation_cardinality, 300);
        assert!(slot0.unlocked);
    }

    #[tokio::test]
    async fn test_empty_return_is_interface_mismatch() {
        let (reader, mock) = mocked_reader();
        // one for eth_call, one spare in case the call also queries eth_getCode
        mock.push::<Bytes, _>(Bytes::default()).unwrap();
        mock.push::<Bytes, _>(Bytes::default()).unwrap();

        let err = reader
            .positions(Address::repeat_byte(0x02), U256::from(7), Some(19_000_000))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::InterfaceMismatch { function: "positions", .. }));
        assert!(!err.is_transient());
        assert_eq!(err.contract(), Address::repeat_byte(0x02));
    }

    #[tokio::test]
    async fn test_provider_failure_is_unavailable() {
        let (reader, _mock) = mocked_reader();

        // nothing queued: the transport itself errors
        let err = reader.slot0(Address::repeat_byte(0x03), None).await.unwrap_err();
        assert!(matches!(err, ReadError::Unavailable { function: "slot0", .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_transport_error_is_retried() {
        let (reader, mock) = mocked_reader();
        let reader = reader.with_retries(1);
        let sqrt_price = U256::from_dec_str("79228162514264337593543950336").unwrap();

        // responses pop from the back: the error is served first
        mock.push::<Bytes, _>(slot0_return(sqrt_price, 0)).unwrap();
        mock.push_response(rpc_error(-32000, "connection reset by peer"));

        let slot0 = reader.slot0(Address::repeat_byte(0x04), None).await.unwrap();
        assert_eq!(slot0.sqrt_price_x96, sqrt_price);
        assert_eq!(slot0.tick, 0);
    }

    #[tokio::test]
    async fn test_transport_error_without_retries_surfaces() {
        let (reader, mock) = mocked_reader();
        mock.push::<Bytes, _>(slot0_return(U256::one() << 96, 0)).unwrap();
        mock.push_response(rpc_error(-32000, "connection reset by peer"));

        let err = reader.slot0(Address::repeat_byte(0x04), None).await.unwrap_err();
        assert!(matches!(err, ReadError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_revert_is_mismatch_and_not_retried() {
        let (reader, mock) = mocked_reader();
        let reader = reader.with_retries(3);
        let pool = Address::repeat_byte(0x05);

        mock.push::<Bytes, _>(slot0_return(U256::one() << 96, 7)).unwrap();
        mock.push_response(rpc_error(3, "execution reverted"));

        let err = reader.slot0(pool, None).await.unwrap_err();
        assert!(matches!(err, ReadError::InterfaceMismatch { function: "slot0", .. }));
        assert_eq!(err.contract(), pool);

        // the queued success was never consumed by a retry
        let slot0 = reader.slot0(pool, None).await.unwrap();
        assert_eq!(slot0.tick, 7);
    }

    #[tokio::test]
    async fn test_stalled_call_times_out_after_retries() {
        let (reader, _mock) = mocked_reader();
        let reader = reader
            .with_timeout(Duration::from_millis(20))
            .with_retries(2);
        let attempts = AtomicUsize::new(0);

        let err = reader
            .call(Address::repeat_byte(0x06), SLOT0, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                futures::future::pending::<Result<u8, ContractError<Provider<MockProvider>>>>()
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ReadError::Timeout {
                contract: Address::repeat_byte(0x06),
                function: SLOT0,
                after: Duration::from_millis(20),
            }
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_contract_errors_classified() {
        let (reader, _mock) = mocked_reader();
        let reader = reader.with_retries(3);
        let attempts = AtomicUsize::new(0);

        let err = reader
            .call(Address::repeat_byte(0x07), POSITIONS, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(Err::<u8, ContractError<Provider<MockProvider>>>(
                    ContractError::Revert(Bytes::default()),
                ))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ReadError::InterfaceMismatch { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
