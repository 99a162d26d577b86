//! EIP-712 hashing for Safe transactions, selected by protocol revision

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};

use crate::contracts::{
    DOMAIN_SEPARATOR_TYPEHASH, LEGACY_DOMAIN_SEPARATOR_TYPEHASH, LEGACY_SAFE_TX_TYPEHASH,
    SAFE_TX_TYPEHASH,
};
use crate::types::Operation;
use crate::version::Revision;

/// The nine signed payload fields of a Safe transaction, without nonce or wallet context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTxParams {
    /// Target address
    pub to: Address,
    /// Value to send
    pub value: U256,
    /// Calldata
    pub data: Bytes,
    /// Operation type
    pub operation: Operation,
    /// Gas forwarded to the inner call
    pub safe_tx_gas: U256,
    /// Gas independent of the inner call (`dataGas` before 1.0.0)
    pub base_gas: U256,
    /// Gas price for refund calculation
    pub gas_price: U256,
    /// Token used for gas refund (address(0) for ETH)
    pub gas_token: Address,
    /// Address to receive gas refund
    pub refund_receiver: Address,
}

impl SafeTxParams {
    /// Creates params with every gas and refund field zeroed
    pub fn new(to: Address, value: U256, data: impl Into<Bytes>, operation: Operation) -> Self {
        Self {
            to,
            value,
            data: data.into(),
            operation,
            safe_tx_gas: U256::ZERO,
            base_gas: U256::ZERO,
            gas_price: U256::ZERO,
            gas_token: Address::ZERO,
            refund_receiver: Address::ZERO,
        }
    }

    pub fn with_safe_tx_gas(mut self, gas: U256) -> Self {
        self.safe_tx_gas = gas;
        self
    }

    pub fn with_base_gas(mut self, gas: U256) -> Self {
        self.base_gas = gas;
        self
    }

    /// Sets the refund parameters paid by the Safe to the executor
    pub fn with_refund(mut self, gas_price: U256, gas_token: Address, refund_receiver: Address) -> Self {
        self.gas_price = gas_price;
        self.gas_token = gas_token;
        self.refund_receiver = refund_receiver;
        self
    }
}

/// Computes the domain separator for a Safe.
///
/// From 1.3.0 the chain id is part of the domain; older revisions bind only the wallet address.
pub fn compute_domain_separator(revision: Revision, chain_id: u64, safe_address: Address) -> B256 {
    let mut encoded = Vec::with_capacity(96);

    if revision.chain_id_in_domain() {
        encoded.extend_from_slice(DOMAIN_SEPARATOR_TYPEHASH.as_slice());
        encoded.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    } else {
        encoded.extend_from_slice(LEGACY_DOMAIN_SEPARATOR_TYPEHASH.as_slice());
    }
    encoded.extend_from_slice(safe_address.into_word().as_slice());

    keccak256(&encoded)
}

/// Computes the struct hash for SafeTx
///
/// structHash = keccak256(abi.encode(
///     TYPEHASH,
///     to, value, keccak256(data), operation,
///     safeTxGas, baseGas|dataGas, gasPrice, gasToken, refundReceiver, nonce
/// ))
pub fn compute_safe_tx_hash(revision: Revision, params: &SafeTxParams, nonce: U256) -> B256 {
    let typehash = if revision.uses_base_gas() {
        SAFE_TX_TYPEHASH
    } else {
        LEGACY_SAFE_TX_TYPEHASH
    };

    let mut encoded = Vec::with_capacity(352);
    encoded.extend_from_slice(typehash.as_slice());
    encoded.extend_from_slice(params.to.into_word().as_slice());
    encoded.extend_from_slice(&params.value.to_be_bytes::<32>());
    encoded.extend_from_slice(keccak256(&params.data).as_slice());
    encoded.extend_from_slice(&U256::from(params.operation.as_u8()).to_be_bytes::<32>());
    encoded.extend_from_slice(&params.safe_tx_gas.to_be_bytes::<32>());
    encoded.extend_from_slice(&params.base_gas.to_be_bytes::<32>());
    encoded.extend_from_slice(&params.gas_price.to_be_bytes::<32>());
    encoded.extend_from_slice(params.gas_token.into_word().as_slice());
    encoded.extend_from_slice(params.refund_receiver.into_word().as_slice());
    encoded.extend_from_slice(&nonce.to_be_bytes::<32>());

    keccak256(&encoded)
}

/// Returns `0x19 0x01 || domainSeparator || structHash`, the preimage owners sign
pub fn encode_transaction_data(domain_separator: B256, struct_hash: B256) -> Bytes {
    let mut encoded = Vec::with_capacity(66);
    encoded.extend_from_slice(&[0x19, 0x01]);
    encoded.extend_from_slice(domain_separator.as_slice());
    encoded.extend_from_slice(struct_hash.as_slice());
    Bytes::from(encoded)
}

/// Computes the final EIP-712 hash to sign
///
/// hash = keccak256("\x19\x01" || domainSeparator || structHash)
pub fn compute_transaction_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    keccak256(encode_transaction_data(domain_separator, struct_hash))
}

/// Computes the complete transaction hash for signing
pub fn compute_safe_transaction_hash(
    revision: Revision,
    chain_id: u64,
    safe_address: Address,
    params: &SafeTxParams,
    nonce: U256,
) -> B256 {
    let domain_separator = compute_domain_separator(revision, chain_id, safe_address);
    let struct_hash = compute_safe_tx_hash(revision, params, nonce);
    compute_transaction_hash(domain_separator, struct_hash)
}
