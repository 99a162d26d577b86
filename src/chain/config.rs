//! Per-chain contract addresses, injected into every [`crate::Safe`] at construction

use std::collections::HashMap;

use alloy::primitives::{address, Address};

/// Canonical Multicall3 deployment, identical on most EVM chains
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Contract addresses of one Safe release.
/// These are the same across all chains that use the canonical CREATE2 deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainAddresses {
    /// Safe singleton address
    pub safe_singleton: Address,
    /// MultiSend contract address
    pub multi_send: Address,
    /// MultiSendCallOnly contract address
    pub multi_send_call_only: Address,
    /// Safe proxy factory address
    pub proxy_factory: Address,
    /// Compatibility fallback handler
    pub fallback_handler: Address,
    /// Accessor delegatecalled by the fallback handler to simulate transactions
    pub simulate_tx_accessor: Address,
}

impl Default for ChainAddresses {
    fn default() -> Self {
        Self::v1_4_1()
    }
}

impl ChainAddresses {
    pub fn v1_4_1() -> Self {
        Self {
            safe_singleton: address!("41675C099F32341bf84BFc5382aF534df5C7461a"),
            multi_send: address!("38869bf66a61cF6bDB996A6aE40D5853Fd43B526"),
            multi_send_call_only: address!("9641d764fc13c8B624c04430C7356C1C7C8102e2"),
            proxy_factory: address!("4e1DCf7AD4e460CfD30791CCC4F9c8a4f820ec67"),
            fallback_handler: address!("fd0732Dc9E303f09fCEf3a7388Ad10A83459Ec99"),
            simulate_tx_accessor: address!("3d4BA2E0884aa488718476ca2FB8Efc291A46199"),
        }
    }

    pub fn v1_3_0() -> Self {
        Self {
            safe_singleton: address!("d9Db270c1B5E3Bd161E8c8503c55cEABeE709552"),
            multi_send: address!("A238CBeb142c10Ef7Ad8442C6D1f9E89e07e7761"),
            multi_send_call_only: address!("40A2aCCbd92BCA938b02010E17A5b8929b49130D"),
            proxy_factory: address!("a6B71E26C5e0845f74c812102Ca7114b6a896AB2"),
            fallback_handler: address!("f48f2B2d2a534e402487b3ee7C18c33Aec0Fe5e4"),
            simulate_tx_accessor: address!("59AD6735bCd8152B84860Cb256dD9e96b85F69Da"),
        }
    }
}

/// Everything chain-specific a Safe client needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub addresses: ChainAddresses,
    /// Multicall3 used to batch reads; `None` issues calls one by one
    pub multicall: Option<Address>,
}

impl ChainConfig {
    /// Canonical v1.4.1 addresses and the canonical Multicall3
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            addresses: ChainAddresses::v1_4_1(),
            multicall: Some(MULTICALL3_ADDRESS),
        }
    }

    pub fn with_addresses(chain_id: u64, addresses: ChainAddresses) -> Self {
        Self {
            addresses,
            ..Self::new(chain_id)
        }
    }

    pub fn with_multicall(mut self, multicall: Address) -> Self {
        self.multicall = Some(multicall);
        self
    }

    pub fn without_multicall(mut self) -> Self {
        self.multicall = None;
        self
    }

    pub fn mainnet() -> Self {
        Self::new(chain_ids::MAINNET)
    }

    pub fn gnosis() -> Self {
        Self::new(chain_ids::GNOSIS)
    }

    pub fn sepolia() -> Self {
        Self::new(chain_ids::SEPOLIA)
    }
}

/// Caller-owned registry of chain configurations keyed by chain id
#[derive(Debug, Clone, Default)]
pub struct ChainConfigs {
    configs: HashMap<u64, ChainConfig>,
}

impl ChainConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the configuration for its chain id
    pub fn insert(&mut self, config: ChainConfig) -> Option<ChainConfig> {
        self.configs.insert(config.chain_id, config)
    }

    /// Registered configuration, or the canonical defaults for unknown chains
    pub fn get(&self, chain_id: u64) -> ChainConfig {
        self.configs
            .get(&chain_id)
            .cloned()
            .unwrap_or_else(|| ChainConfig::new(chain_id))
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.configs.contains_key(&chain_id)
    }
}

/// Well-known chain IDs
pub mod chain_ids {
    pub const MAINNET: u64 = 1;
    pub const OPTIMISM: u64 = 10;
    pub const GNOSIS: u64 = 100;
    pub const POLYGON: u64 = 137;
    pub const BASE: u64 = 8453;
    pub const ARBITRUM: u64 = 42161;
    pub const SEPOLIA: u64 = 11155111;
}
