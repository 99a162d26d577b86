//! Chain configuration and known deployments

mod config;
pub mod deployments;

pub use config::{chain_ids, ChainAddresses, ChainConfig, ChainConfigs, MULTICALL3_ADDRESS};
pub use deployments::Deployment;
