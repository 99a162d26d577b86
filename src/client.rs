//! The chain access a Safe needs, and its alloy-backed implementation.
//!
//! Everything in this crate talks to the chain through [`ChainClient`], so tests and callers
//! with their own transport can substitute an implementation.

use std::future::Future;

use alloy::network::{AnyNetwork, Network, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{BlockId, BlockNumberOrTag};
use alloy::sol_types::{decode_revert_reason, SolCall};
use alloy::transports::{RpcError, TransportErrorKind};
use tracing::debug;
use url::Url;

use crate::chain::ChainConfig;
use crate::contracts::IMulticall3;
use crate::error::{Error, Result};

/// A read-only `eth_call` / `eth_estimateGas` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    /// Gas limit for the call; the node default when unset
    pub gas: Option<u64>,
    pub block: BlockId,
}

impl CallRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            value: U256::ZERO,
            data: data.into(),
            gas: None,
            block: BlockId::Number(BlockNumberOrTag::Latest),
        }
    }

    /// Builds a request for a typed contract call
    pub fn for_call<C: SolCall>(to: Address, call: &C) -> Self {
        Self::new(to, call.abi_encode())
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn at_block(mut self, block: BlockId) -> Self {
        self.block = block;
        self
    }

    /// Only plain latest-state reads can be folded into a Multicall3 batch
    fn is_batchable(&self) -> bool {
        self.from.is_none()
            && self.gas.is_none()
            && self.value.is_zero()
            && self.block == BlockId::Number(BlockNumberOrTag::Latest)
    }
}

/// Chain access required by the Safe protocol.
///
/// `call` distinguishes its failure modes: a revert yields [`Error::Reverted`] with the raw
/// revert data, running out of gas yields [`Error::OutOfGas`], and transport problems yield
/// [`Error::Provider`]. Implementations must not retry on behalf of the caller.
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    fn call(&self, request: CallRequest) -> impl Future<Output = Result<Bytes>> + Send;

    fn estimate_gas(&self, request: CallRequest) -> impl Future<Output = Result<u64>> + Send;

    fn get_code(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    fn get_storage_at(&self, address: Address, slot: B256)
        -> impl Future<Output = Result<B256>> + Send;

    /// Gas limit of the latest block
    fn block_gas_limit(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Executes several calls, returning one result per request in order.
    ///
    /// The default issues the calls one after another.
    fn batch(
        &self,
        requests: Vec<CallRequest>,
    ) -> impl Future<Output = Result<Vec<Result<Bytes>>>> + Send {
        async move {
            let mut results = Vec::with_capacity(requests.len());
            for request in requests {
                results.push(self.call(request).await);
            }
            Ok(results)
        }
    }
}

/// [`ChainClient`] over an alloy provider, batching through Multicall3 when configured
#[derive(Debug, Clone)]
pub struct RpcClient<P> {
    provider: P,
    multicall: Option<Address>,
}

impl<P> RpcClient<P>
where
    P: Provider<AnyNetwork>,
{
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            multicall: None,
        }
    }

    /// Batches reads through the Multicall3 contract at `multicall`
    pub fn with_multicall(mut self, multicall: Address) -> Self {
        self.multicall = Some(multicall);
        self
    }

    /// Batches through the Multicall3 of `config`, or not at all when it has none
    pub fn with_chain_config(mut self, config: &ChainConfig) -> Self {
        self.multicall = config.multicall;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn transaction_request(request: &CallRequest) -> <AnyNetwork as Network>::TransactionRequest {
        let mut tx = <AnyNetwork as Network>::TransactionRequest::default()
            .with_to(request.to)
            .with_value(request.value)
            .with_input(request.data.clone());
        if let Some(from) = request.from {
            tx = tx.with_from(from);
        }
        if let Some(gas) = request.gas {
            tx = tx.with_gas_limit(gas);
        }
        tx
    }

    async fn multicall(&self, multicall: Address, requests: &[CallRequest]) -> Result<Vec<Result<Bytes>>> {
        let calls = requests
            .iter()
            .map(|request| IMulticall3::Call3 {
                target: request.to,
                allowFailure: true,
                callData: request.data.clone(),
            })
            .collect();
        let request = CallRequest::for_call(multicall, &IMulticall3::aggregate3Call { calls });
        let data = self.call(request).await?;
        let results = IMulticall3::aggregate3Call::abi_decode_returns(&data)?;

        if results.len() != requests.len() {
            return Err(Error::Abi(format!(
                "multicall returned {} results for {} calls",
                results.len(),
                requests.len()
            )));
        }

        Ok(results
            .into_iter()
            .map(|result| {
                if result.success {
                    Ok(result.returnData)
                } else {
                    Err(Error::Reverted {
                        reason: decode_revert_reason(&result.returnData),
                        data: result.returnData,
                    })
                }
            })
            .collect())
    }
}

impl RpcClient<RootProvider<AnyNetwork>> {
    /// Connects to an HTTP JSON-RPC endpoint
    pub fn connect_http(url: Url) -> Self {
        Self::new(RootProvider::new_http(url))
    }
}

/// Maps a JSON-RPC failure onto the revert / out-of-gas / transport split
pub fn classify_rpc_error(err: RpcError<TransportErrorKind>) -> Error {
    if let Some(payload) = err.as_error_resp() {
        if let Some(data) = payload.as_revert_data() {
            return Error::Reverted {
                reason: decode_revert_reason(&data),
                data,
            };
        }
        let message = payload.message.to_lowercase();
        if message.contains("out of gas") || message.contains("gas required exceeds") {
            return Error::OutOfGas;
        }
        if message.contains("revert") {
            return Error::Reverted {
                data: Bytes::new(),
                reason: Some(payload.message.to_string()),
            };
        }
    }
    Error::Provider(err.to_string())
}

impl<P> ChainClient for RpcClient<P>
where
    P: Provider<AnyNetwork>,
{
    async fn chain_id(&self) -> Result<u64> {
        self.provider.get_chain_id().await.map_err(classify_rpc_error)
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes> {
        let tx = Self::transaction_request(&request);
        self.provider
            .call(tx)
            .block(request.block)
            .await
            .map_err(classify_rpc_error)
    }

    async fn estimate_gas(&self, request: CallRequest) -> Result<u64> {
        let tx = Self::transaction_request(&request);
        self.provider
            .estimate_gas(tx)
            .block(request.block)
            .await
            .map_err(classify_rpc_error)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.provider.get_code_at(address).await.map_err(classify_rpc_error)
    }

    async fn get_storage_at(&self, address: Address, slot: B256) -> Result<B256> {
        let value = self
            .provider
            .get_storage_at(address, U256::from_be_bytes(slot.0))
            .await
            .map_err(classify_rpc_error)?;
        Ok(B256::from(value.to_be_bytes::<32>()))
    }

    async fn block_gas_limit(&self) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(classify_rpc_error)?
            .ok_or_else(|| Error::Fetch {
                what: "latest block",
                reason: "node returned no block".to_string(),
            })?;
        Ok(block.header.gas_limit)
    }

    async fn batch(&self, requests: Vec<CallRequest>) -> Result<Vec<Result<Bytes>>> {
        if let Some(multicall) = self.multicall {
            if requests.len() > 1 && requests.iter().all(CallRequest::is_batchable) {
                match self.multicall(multicall, &requests).await {
                    Ok(results) => return Ok(results),
                    Err(Error::Provider(reason)) => return Err(Error::Provider(reason)),
                    Err(err) => {
                        debug!(%multicall, error = %err, "multicall batch failed, calling sequentially");
                    }
                }
            }
        }

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.call(request).await);
        }
        Ok(results)
    }
}
