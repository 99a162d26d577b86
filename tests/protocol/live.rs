//! Read-only checks against mainnet, run only when ETH_RPC_URL is set

use alloy::primitives::{address, b256, keccak256, U256};
use safe_protocol::create2::proxy_init_code;
use safe_protocol::{
    check_proxy_code, detect_revision, BoundedCache, ChainAddresses, ChainClient, ChainConfig,
    ProxyDeployment, Revision, RpcClient,
};

/// Macro to skip tests when ETH_RPC_URL is not set
macro_rules! skip_if_no_rpc {
    () => {
        match std::env::var("ETH_RPC_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("Skipping test: ETH_RPC_URL not set");
                return;
            }
        }
    };
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_mainnet_singleton_revision() {
    let url = skip_if_no_rpc!();
    init_tracing();

    let client = RpcClient::connect_http(url.parse().unwrap());
    if client.chain_id().await.unwrap() != 1 {
        eprintln!("Skipping test: ETH_RPC_URL is not mainnet");
        return;
    }

    let singleton = ChainAddresses::v1_4_1().safe_singleton;
    let (revision, version) = detect_revision(&client, singleton).await;
    assert_eq!(revision, Revision::V141);
    assert_eq!(version.as_deref(), Some("1.4.1"));

    // the singleton itself is not a proxy
    assert_eq!(check_proxy_code(&client, singleton).await.unwrap(), None);
}

#[tokio::test]
async fn test_mainnet_factory_creation_code() {
    let url = skip_if_no_rpc!();
    init_tracing();

    let client =
        RpcClient::connect_http(url.parse().unwrap()).with_chain_config(&ChainConfig::mainnet());
    if client.chain_id().await.unwrap() != 1 {
        eprintln!("Skipping test: ETH_RPC_URL is not mainnet");
        return;
    }

    let master_copy = address!("29fcb43b46531bca003ddc8fcb67ffe91900c762");
    let deployment = ProxyDeployment::new(
        ChainAddresses::v1_4_1().proxy_factory,
        master_copy,
        vec![0u8],
        U256::ZERO,
    );

    let mut cache = BoundedCache::new(1);
    let code = deployment.fetch_creation_code(&client, &mut cache).await.unwrap();
    assert_eq!(
        keccak256(proxy_init_code(&code, master_copy)),
        b256!("e298282cefe913ab5d282047161268a8222e4bd4ed106300c547894bbefd31ee")
    );
}
