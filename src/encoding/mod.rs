//! Encoding utilities for Safe transactions

mod eip712;
mod multisend;

pub use eip712::{
    compute_domain_separator, compute_safe_transaction_hash, compute_safe_tx_hash,
    compute_transaction_hash, encode_transaction_data, SafeTxParams,
};
pub use multisend::{decode_multisend_data, encode_multisend_data, MultiSendTx};
