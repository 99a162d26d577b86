//! # safe-protocol
//!
//! A Rust library for building, signing, estimating and executing Safe multisig transactions
//! across every deployed revision of the Safe contracts (0.0.1 through 1.4.1).
//!
//! ## Features
//!
//! - EIP-712 `SafeTx` hashing with per-revision domain and struct layouts
//! - Signature parsing, verification and canonical aggregation for ECDSA, `eth_sign`,
//!   approved-hash and contract (EIP-1271) owners
//! - `safeTxGas` estimation with the 63/64 retry loop and `baseGas` estimation
//! - CREATE2 address prediction for proxy deployments and proxy bytecode recognition
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use safe_protocol::{RpcClient, Safe, Operation};
//! use alloy::primitives::{Bytes, U256};
//!
//! let client = RpcClient::connect_http(rpc_url);
//! let safe = Safe::connect(client, safe_address).await?;
//!
//! let tx = safe
//!     .build_transaction(recipient, U256::from(1000), Bytes::new(), Operation::Call)
//!     .await?;
//! let mut tx = safe.estimate_transaction(tx).await?;
//!
//! tx.sign(&owner_signer).await?;
//! let result = tx.execute(&provider, None, None).await?;
//! ```
//!
//! ## Signatures
//!
//! Signatures travel as one packed blob sorted by owner address:
//!
//! ```rust,ignore
//! tx.sign(&owner_b).await?;
//! tx.sign(&owner_a).await?;
//!
//! // Order of signing does not matter
//! let signers = tx.signers()?;
//! assert!(signers.windows(2).all(|pair| pair[0] < pair[1]));
//! ```

pub mod address;
pub mod cache;
pub mod chain;
pub mod client;
pub mod contracts;
pub mod create2;
pub mod encoding;
pub mod error;
pub mod gas;
pub mod proxy;
pub mod safe;
pub mod safe_tx;
pub mod signing;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use cache::BoundedCache;
pub use chain::{ChainAddresses, ChainConfig, ChainConfigs};
pub use client::{CallRequest, ChainClient, RpcClient};
pub use contracts::{IMultiSend, ISafe, ISafeProxyFactory, ISafeSetup};
pub use create2::{
    calculate_salt, create2_address, encode_setup_call, predict_address, ProxyDeployment, SafeSetup,
};
pub use encoding::{MultiSendTx, SafeTxParams};
pub use error::{Error, Result, RevertKind};
pub use gas::GasEstimator;
pub use proxy::{check_proxy_code, classify_proxy_bytecode, ProxyKind};
pub use safe::{detect_revision, is_safe, GasEstimate, Safe, SAFE_SINGLETON_SLOT};
pub use safe_tx::SafeTx;
pub use signing::{SafeSignature, SignatureScheme};
pub use types::{ExecutionResult, Operation, WalletInfo};
pub use version::{Revision, SimulationStrategy};

// Re-export alloy types that are commonly used
pub use alloy::network::AnyNetwork;
pub use alloy::primitives::{Address, Bytes, B256, U256};
pub use alloy::providers::Provider;
