//! Proxy address prediction from factory state and deployed-code recognition

use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolValue};
use safe_protocol::proxy::{check_proxy_code_with_factory, PROXY_1_4_1_RUNTIME};
use safe_protocol::{
    create2_address, encode_setup_call, predict_address, BoundedCache, ChainAddresses, Error,
    ISafeProxyFactory, ProxyDeployment, ProxyKind,
};

use crate::common::MockChain;

const FACTORY: Address = address!("4e1dcf7ad4e460cfd30791ccc4f9c8a4f820ec67");
const OWNER: Address = address!("1000000000000000000000000000000000000001");
const PROXY: Address = address!("7000000000000000000000000000000000000007");

fn creation_code() -> Bytes {
    Bytes::from(vec![0x60u8, 0x80, 0x60, 0x40, 0x52, 0x34, 0x80, 0x15])
}

fn deployment() -> ProxyDeployment {
    let addresses = ChainAddresses::v1_4_1();
    let initializer = encode_setup_call(&[OWNER], 1, addresses.fallback_handler);
    ProxyDeployment::new(FACTORY, addresses.safe_singleton, initializer, U256::from(42))
}

#[tokio::test]
async fn test_creation_code_is_fetched_once_per_factory() {
    let chain = MockChain::new(1);
    chain.returns::<ISafeProxyFactory::proxyCreationCodeCall>(FACTORY, creation_code().abi_encode());

    let mut cache = BoundedCache::new(4);
    let deployment = deployment();
    let first = deployment.fetch_creation_code(&chain, &mut cache).await.unwrap();
    let second = deployment.fetch_creation_code(&chain, &mut cache).await.unwrap();

    assert_eq!(first, creation_code());
    assert_eq!(second, first);
    assert_eq!(chain.count::<ISafeProxyFactory::proxyCreationCodeCall>(FACTORY), 1);

    cache.invalidate(&FACTORY);
    deployment.fetch_creation_code(&chain, &mut cache).await.unwrap();
    assert_eq!(chain.count::<ISafeProxyFactory::proxyCreationCodeCall>(FACTORY), 2);
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let chain = MockChain::new(1);
    chain.reverts::<ISafeProxyFactory::proxyCreationCodeCall>(FACTORY);

    let mut cache = BoundedCache::new(4);
    let result = deployment().fetch_creation_code(&chain, &mut cache).await;
    assert!(matches!(result, Err(Error::Fetch { what: "proxy creation code", .. })));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_predict_matches_factory_salt() {
    let chain = MockChain::new(1);
    chain.returns::<ISafeProxyFactory::proxyCreationCodeCall>(FACTORY, creation_code().abi_encode());

    let mut cache = BoundedCache::new(4);
    let mut deployment = deployment();
    let code = deployment.fetch_creation_code(&chain, &mut cache).await.unwrap();
    let predicted = deployment.predict(&code, 1);

    assert_eq!(deployment.predicted_address, Some(predicted));
    assert_eq!(
        predicted,
        predict_address(
            FACTORY,
            deployment.master_copy,
            &deployment.initializer,
            U256::from(42),
            None,
            &code,
        )
    );

    let mut init_code = code.to_vec();
    init_code.extend_from_slice(deployment.master_copy.into_word().as_slice());
    assert_eq!(predicted, create2_address(FACTORY, deployment.salt(1), &init_code));

    let mut chain_specific = deployment.clone().chain_specific();
    assert_ne!(chain_specific.predict(&code, 1), predicted);
    assert_ne!(chain_specific.predict(&code, 1), chain_specific.predict(&code, 137));

    let calldata = chain_specific.deploy_calldata();
    let call = ISafeProxyFactory::createChainSpecificProxyWithNonceCall::abi_decode(&calldata).unwrap();
    assert_eq!(call.saltNonce, U256::from(42));
    assert_eq!(call.initializer, deployment.initializer);
}

#[tokio::test]
async fn test_proxy_recognized_through_factory_runtime_code() {
    let custom_runtime = Bytes::from(vec![0x36u8, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36]);

    let chain = MockChain::new(1);
    chain.set_code(PROXY, custom_runtime.clone());
    chain.returns::<ISafeProxyFactory::proxyRuntimeCodeCall>(FACTORY, custom_runtime.abi_encode());
    assert_eq!(
        check_proxy_code_with_factory(&chain, PROXY, FACTORY).await.unwrap(),
        Some(ProxyKind::Factory)
    );

    // 1.4.1 factories dropped proxyRuntimeCode
    let chain = MockChain::new(1);
    chain.set_code(PROXY, custom_runtime);
    assert_eq!(check_proxy_code_with_factory(&chain, PROXY, FACTORY).await.unwrap(), None);

    let chain = MockChain::new(1);
    chain.set_code(PROXY, PROXY_1_4_1_RUNTIME.to_vec());
    assert_eq!(
        check_proxy_code_with_factory(&chain, PROXY, FACTORY).await.unwrap(),
        Some(ProxyKind::V141)
    );
    assert_eq!(chain.count::<ISafeProxyFactory::proxyRuntimeCodeCall>(FACTORY), 0);
}
