//! Common test utilities: an in-memory chain answering calls by target and selector

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolValue};
use safe_protocol::{CallRequest, ChainClient, Error, Result};

type Handler = Arc<dyn Fn(&CallRequest) -> Result<Bytes> + Send + Sync>;

/// Scripted [`ChainClient`].
///
/// Calls are routed to the handler registered for `(to, selector)`; unknown calls revert with
/// empty data. Every request is logged.
pub struct MockChain {
    pub chain_id: u64,
    pub block_gas_limit: u64,
    handlers: Mutex<HashMap<(Address, [u8; 4]), Handler>>,
    code: Mutex<HashMap<Address, Bytes>>,
    storage: Mutex<HashMap<(Address, B256), B256>>,
    rpc_estimate: Mutex<Option<u64>>,
    calls: Mutex<Vec<CallRequest>>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            block_gas_limit: 30_000_000,
            handlers: Mutex::new(HashMap::new()),
            code: Mutex::new(HashMap::new()),
            storage: Mutex::new(HashMap::new()),
            rpc_estimate: Mutex::new(Some(21_000)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_block_gas_limit(mut self, limit: u64) -> Self {
        self.block_gas_limit = limit;
        self
    }

    /// Answers calls of `C` on `to` with `handler`
    pub fn on<C: SolCall>(
        &self,
        to: Address,
        handler: impl Fn(&CallRequest) -> Result<Bytes> + Send + Sync + 'static,
    ) {
        self.handlers
            .lock()
            .unwrap()
            .insert((to, C::SELECTOR), Arc::new(handler));
    }

    /// Answers calls of `C` on `to` with a fixed ABI-encoded value
    pub fn returns<C: SolCall>(&self, to: Address, encoded: Vec<u8>) {
        let encoded = Bytes::from(encoded);
        self.on::<C>(to, move |_| Ok(encoded.clone()));
    }

    pub fn reverts<C: SolCall>(&self, to: Address) {
        self.on::<C>(to, |_| {
            Err(Error::Reverted {
                data: Bytes::new(),
                reason: None,
            })
        });
    }

    pub fn set_code(&self, address: Address, code: impl Into<Bytes>) {
        self.code.lock().unwrap().insert(address, code.into());
    }

    pub fn set_storage(&self, address: Address, slot: B256, value: B256) {
        self.storage.lock().unwrap().insert((address, slot), value);
    }

    pub fn set_storage_address(&self, address: Address, slot: B256, value: Address) {
        self.set_storage(address, slot, value.into_word());
    }

    /// `None` makes `eth_estimateGas` revert
    pub fn set_rpc_estimate(&self, estimate: Option<u64>) {
        *self.rpc_estimate.lock().unwrap() = estimate;
    }

    /// Number of logged calls of `C` on `to`
    pub fn count<C: SolCall>(&self, to: Address) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.to == to && request.data.starts_with(&C::SELECTOR))
            .count()
    }

    /// Logged calls of `C` on `to`, decoded
    pub fn decoded<C: SolCall>(&self, to: Address) -> Vec<C> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.to == to && request.data.starts_with(&C::SELECTOR))
            .map(|request| C::abi_decode(&request.data).unwrap())
            .collect()
    }

    pub fn calls(&self) -> Vec<CallRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes> {
        self.calls.lock().unwrap().push(request.clone());

        let handler = request
            .data
            .get(..4)
            .and_then(|selector| <[u8; 4]>::try_from(selector).ok())
            .and_then(|selector| self.handlers.lock().unwrap().get(&(request.to, selector)).cloned());

        match handler {
            Some(handler) => handler(&request),
            None => Err(Error::Reverted {
                data: Bytes::new(),
                reason: None,
            }),
        }
    }

    async fn estimate_gas(&self, _request: CallRequest) -> Result<u64> {
        self.rpc_estimate.lock().unwrap().ok_or(Error::Reverted {
            data: Bytes::new(),
            reason: Some("estimate failed".to_string()),
        })
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        Ok(self
            .code
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_storage_at(&self, address: Address, slot: B256) -> Result<B256> {
        Ok(self
            .storage
            .lock()
            .unwrap()
            .get(&(address, slot))
            .copied()
            .unwrap_or_default())
    }

    async fn block_gas_limit(&self) -> Result<u64> {
        Ok(self.block_gas_limit)
    }
}

/// ABI encoding of a single `uint256` return value
pub fn uint(value: u64) -> Vec<u8> {
    U256::from(value).abi_encode()
}

/// `Error(string)` revert data carrying `estimate` as its only word, as `requiredTxGas` does
pub fn required_tx_gas_revert(estimate: u64) -> Bytes {
    let mut data = vec![0x08, 0xc3, 0x79, 0xa0];
    data.extend_from_slice(&U256::from(32).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(32).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(estimate).to_be_bytes::<32>());
    Bytes::from(data)
}

/// Installs the reads every Safe answers: version, owners, threshold and nonce
pub fn install_safe(chain: &MockChain, safe: Address, version: &str, owners: &[Address], threshold: u64) {
    use safe_protocol::ISafe;

    chain.returns::<ISafe::VERSIONCall>(safe, version.to_string().abi_encode());
    chain.returns::<ISafe::getOwnersCall>(safe, owners.to_vec().abi_encode());
    chain.returns::<ISafe::getThresholdCall>(safe, uint(threshold));
    chain.returns::<ISafe::nonceCall>(safe, uint(0));
}
