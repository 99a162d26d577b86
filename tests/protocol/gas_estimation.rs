//! `safeTxGas` and `baseGas` estimation through both simulation entry points

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol_types::{Revert, SolError, SolValue};
use safe_protocol::contracts::ICompatibilityFallbackHandler;
use safe_protocol::gas::{
    base_gas_calldata, estimate_base_gas, OLD_CALL_GAS, PROXY_GAS, RPC_ESTIMATE_OFFSET,
};
use safe_protocol::{ChainConfig, Error, ISafe, Operation, Revision, Safe};

use crate::common::{install_safe, required_tx_gas_revert, MockChain};

const SAFE: Address = address!("5afe5afe5afe5afe5afe5afe5afe5afe5afe5afe");
const OWNER: Address = address!("1000000000000000000000000000000000000001");
const RECIPIENT: Address = address!("3000000000000000000000000000000000000003");

/// `SimulateTxAccessor.simulate` result wrapped in the fallback handler's `bytes` response
fn accessor_response(estimate: u64, success: bool, return_data: Bytes) -> Bytes {
    let inner = (U256::from(estimate), success, return_data).abi_encode_params();
    Bytes::from(Bytes::from(inner).abi_encode())
}

/// A Safe whose simulation reports `estimate` but only succeeds with at least `required` gas.
///
/// Each simulation with a gas limit bumps `limited`.
fn accessor_safe(chain: MockChain, estimate: u64, required: u64) -> (Safe<MockChain>, Arc<AtomicU32>) {
    let limited = Arc::new(AtomicU32::new(0));
    let counter = limited.clone();
    chain.on::<ICompatibilityFallbackHandler::simulateCall>(SAFE, move |request| {
        if let Some(gas) = request.gas {
            counter.fetch_add(1, Ordering::SeqCst);
            if gas < required {
                return Err(Error::OutOfGas);
            }
        }
        Ok(accessor_response(estimate, true, Bytes::new()))
    });
    install_safe(&chain, SAFE, "1.4.1", &[OWNER], 1);

    let safe = Safe::with_revision(chain, SAFE, Revision::V141, ChainConfig::mainnet());
    (safe, limited)
}

#[tokio::test]
async fn test_estimate_converges_after_shortfalls() {
    let (safe, limited) = accessor_safe(MockChain::new(1), 50_000, 100_000);

    let estimate = safe
        .gas_estimator()
        .estimate_safe_tx_gas(RECIPIENT, U256::ZERO, &Bytes::new(), Operation::Call)
        .await
        .unwrap();

    // five shortfalls, each growing the estimate by 3% more than the last
    assert_eq!(estimate, 76_639);
    assert_eq!(limited.load(Ordering::SeqCst), 6);
    assert_eq!(
        safe.client().count::<ICompatibilityFallbackHandler::simulateCall>(SAFE),
        7
    );
}

#[tokio::test]
async fn test_simulation_targets_accessor() {
    let (safe, _) = accessor_safe(MockChain::new(1), 40_000, 0);
    safe.gas_estimator()
        .estimate_safe_tx_gas(RECIPIENT, U256::from(5), &Bytes::new(), Operation::Call)
        .await
        .unwrap();

    let calls = safe
        .client()
        .decoded::<ICompatibilityFallbackHandler::simulateCall>(SAFE);
    assert!(!calls.is_empty());
    for call in calls {
        assert_eq!(call.targetContract, ChainConfig::mainnet().addresses.simulate_tx_accessor);
    }
}

#[tokio::test]
async fn test_estimate_capped_at_block_gas_limit() {
    let chain = MockChain::new(1).with_block_gas_limit(90_000);
    let (safe, limited) = accessor_safe(chain, 50_000, u64::MAX);

    let estimate = safe
        .gas_estimator()
        .estimate_safe_tx_gas(RECIPIENT, U256::ZERO, &Bytes::new(), Operation::Call)
        .await
        .unwrap();
    assert_eq!(estimate, 90_000);
    assert_eq!(limited.load(Ordering::SeqCst), 6);

    let tx_gas = safe
        .estimate_tx_gas(RECIPIENT, U256::ZERO, &Bytes::new(), Operation::Call)
        .await
        .unwrap();
    assert_eq!(tx_gas, 90_000);
}

#[tokio::test]
async fn test_estimate_gives_up_after_max_attempts() {
    let (safe, limited) = accessor_safe(MockChain::new(1), 50_000, u64::MAX);

    let result = safe
        .gas_estimator()
        .with_max_attempts(3)
        .estimate_safe_tx_gas(RECIPIENT, U256::ZERO, &Bytes::new(), Operation::Call)
        .await;
    assert!(matches!(result, Err(Error::CannotEstimateGas(_))));
    assert_eq!(limited.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_inner_revert_is_reported() {
    let chain = MockChain::new(1);
    let revert = Bytes::from(
        Revert {
            reason: "transfer failed".to_string(),
        }
        .abi_encode(),
    );
    let returned = revert.clone();
    chain.on::<ICompatibilityFallbackHandler::simulateCall>(SAFE, move |_| {
        Ok(accessor_response(30_000, false, returned.clone()))
    });
    // would succeed if the estimator fell back to eth_estimateGas
    chain.set_rpc_estimate(Some(40_000));

    let safe = Safe::with_revision(chain, SAFE, Revision::V141, ChainConfig::mainnet());
    match safe
        .gas_estimator()
        .estimate_safe_tx_gas(RECIPIENT, U256::ZERO, &Bytes::new(), Operation::Call)
        .await
    {
        Err(Error::Reverted { data, reason }) => {
            assert_eq!(data, revert);
            assert_eq!(reason.as_deref(), Some("transfer failed"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_undecodable_inner_revert_falls_back_to_rpc() {
    let chain = MockChain::new(1);
    chain.on::<ICompatibilityFallbackHandler::simulateCall>(SAFE, |_| {
        // custom error selector without a string reason
        Ok(accessor_response(30_000, false, Bytes::from(vec![0xdeu8, 0xad, 0xbe, 0xef])))
    });
    chain.set_rpc_estimate(Some(40_000));

    let safe = Safe::with_revision(chain, SAFE, Revision::V141, ChainConfig::mainnet());
    let estimate = safe
        .gas_estimator()
        .estimate_safe_tx_gas(RECIPIENT, U256::ZERO, &Bytes::new(), Operation::Call)
        .await
        .unwrap();
    assert_eq!(estimate, 40_000 + RPC_ESTIMATE_OFFSET);
}

#[tokio::test]
async fn test_falls_back_to_rpc_estimate() {
    let chain = MockChain::new(1);
    chain.reverts::<ICompatibilityFallbackHandler::simulateCall>(SAFE);
    chain.set_rpc_estimate(Some(40_000));

    let safe = Safe::with_revision(chain, SAFE, Revision::V141, ChainConfig::mainnet());
    let estimate = safe
        .gas_estimator()
        .with_rpc_offset(10_000)
        .estimate_safe_tx_gas(RECIPIENT, U256::ZERO, &Bytes::new(), Operation::Call)
        .await
        .unwrap();
    assert_eq!(estimate, 50_000);
}

#[tokio::test]
async fn test_required_tx_gas_for_legacy_revisions() {
    for revision in [Revision::V100, Revision::V111, Revision::V120, Revision::V130] {
        let chain = MockChain::new(1);
        chain.on::<ISafe::requiredTxGasCall>(SAFE, |request| {
            assert_eq!(request.from, Some(SAFE));
            Err(Error::Reverted {
                data: required_tx_gas_revert(45_000),
                reason: None,
            })
        });
        chain.set_rpc_estimate(Some(21_000));

        let safe = Safe::with_revision(chain, SAFE, revision, ChainConfig::mainnet());
        let estimate = safe
            .estimate_tx_gas(RECIPIENT, U256::ZERO, &Bytes::new(), Operation::Call)
            .await
            .unwrap();

        assert_eq!(estimate, 45_000 + PROXY_GAS + OLD_CALL_GAS, "revision {revision}");
        assert_eq!(
            safe.client()
                .count::<ICompatibilityFallbackHandler::simulateCall>(SAFE),
            0
        );
    }
}

#[tokio::test]
async fn test_rpc_estimate_wins_for_calls_when_larger() {
    let chain = MockChain::new(1);
    chain.on::<ISafe::requiredTxGasCall>(SAFE, |_| {
        Err(Error::Reverted {
            data: required_tx_gas_revert(10_000),
            reason: None,
        })
    });
    chain.set_rpc_estimate(Some(80_000));
    let safe = Safe::with_revision(chain, SAFE, Revision::V130, ChainConfig::mainnet());

    let call = safe
        .estimate_tx_gas(RECIPIENT, U256::ZERO, &Bytes::new(), Operation::Call)
        .await
        .unwrap();
    assert_eq!(call, 80_000 + PROXY_GAS + OLD_CALL_GAS);

    let delegate = safe
        .estimate_tx_gas(RECIPIENT, U256::ZERO, &Bytes::new(), Operation::DelegateCall)
        .await
        .unwrap();
    assert_eq!(delegate, 10_000 + PROXY_GAS + OLD_CALL_GAS);
}

#[tokio::test]
async fn test_estimate_transaction_fills_gas_and_drops_signatures() {
    let (safe, _) = accessor_safe(MockChain::new(1), 30_000, 0);
    let data = Bytes::from(vec![0xab; 4]);

    let tx = safe
        .build_transaction(RECIPIENT, U256::from(1), data.clone(), Operation::Call)
        .await
        .unwrap()
        .with_signatures(vec![0u8; 65]);
    let tx = safe.estimate_transaction(tx).await.unwrap();

    let safe_tx_gas = 30_000 + PROXY_GAS + OLD_CALL_GAS;
    let base_gas = estimate_base_gas(
        1,
        U256::ZERO,
        &base_gas_calldata(RECIPIENT, U256::from(1), &data, Operation::Call, safe_tx_gas, Address::ZERO),
    );

    assert_eq!(tx.params.safe_tx_gas, U256::from(safe_tx_gas));
    assert_eq!(tx.params.base_gas, U256::from(base_gas));
    assert!(tx.signatures().is_empty());
    assert_eq!(tx.recommended_gas(), safe_tx_gas + base_gas + 75_000);
}
