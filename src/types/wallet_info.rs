//! Snapshots of on-chain Safe state

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::version::Revision;

/// Read-only view of a Safe at the time it was fetched.
///
/// Re-fetch after anything that may have changed on-chain state; nothing here is kept in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: Address,
    /// Owners in the order the contract's linked list returns them
    pub owners: Vec<Address>,
    pub threshold: u64,
    pub nonce: U256,
    pub master_copy: Address,
    /// Zero when unset or when the revision has no fallback manager
    pub fallback_handler: Address,
    /// Zero when unset or when the revision has no guard manager
    pub guard: Address,
    pub modules: Vec<Address>,
    /// Raw `VERSION()` string, when the contract answered
    pub version: Option<String>,
    pub revision: Revision,
}

impl WalletInfo {
    pub fn is_owner(&self, address: Address) -> bool {
        self.owners.contains(&address)
    }

    pub fn has_guard(&self) -> bool {
        self.guard != Address::ZERO
    }
}

/// Result of executing a Safe transaction
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Whether the transaction was included with a successful status
    pub success: bool,
}
