//! Signature collection, canonical ordering and on-chain verification

use alloy::primitives::{address, Address, Bytes, FixedBytes, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolValue;
use safe_protocol::contracts::{IERC1271, IERC1271Legacy, EIP1271_LEGACY_MAGIC_VALUE, EIP1271_MAGIC_VALUE};
use safe_protocol::signing::{aggregate, parse_signatures};
use safe_protocol::{
    Error, ISafe, Operation, Revision, RevertKind, SafeSignature, SafeTx, SafeTxParams, SignatureScheme,
};

use crate::common::{uint, MockChain};

const SAFE: Address = address!("5afe5afe5afe5afe5afe5afe5afe5afe5afe5afe");
const APPROVER: Address = address!("8000000000000000000000000000000000000008");
const CONTRACT_OWNER: Address = address!("0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c");

fn transaction(revision: Revision) -> SafeTx {
    let params = SafeTxParams::new(
        address!("3000000000000000000000000000000000000003"),
        U256::from(1_000),
        vec![0x01u8, 0x02, 0x03],
        Operation::Call,
    );
    SafeTx::new(SAFE, 1, revision, params).with_nonce(U256::from(4))
}

#[derive(Clone, Copy)]
enum Step {
    Sign(usize),
    EthSign(usize),
    Approve,
    Contract,
}

async fn apply(tx: &mut SafeTx, signers: &[PrivateKeySigner], step: Step) {
    match step {
        Step::Sign(index) => {
            tx.sign(&signers[index]).await.unwrap();
        }
        Step::EthSign(index) => {
            tx.sign_eth(&signers[index]).await.unwrap();
        }
        Step::Approve => tx.add_signature(SafeSignature::approved_hash(APPROVER)).unwrap(),
        Step::Contract => tx
            .add_signature(SafeSignature::contract(CONTRACT_OWNER, vec![0xdeu8, 0xad, 0xbe, 0xef]))
            .unwrap(),
    }
}

fn permutations(steps: &[Step]) -> Vec<Vec<Step>> {
    if steps.len() <= 1 {
        return vec![steps.to_vec()];
    }
    let mut all = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        let mut rest = steps.to_vec();
        rest.remove(index);
        for mut tail in permutations(&rest) {
            tail.insert(0, *step);
            all.push(tail);
        }
    }
    all
}

#[tokio::test]
async fn test_signing_order_does_not_change_blob() {
    let signers = vec![PrivateKeySigner::random(), PrivateKeySigner::random()];
    let steps = [Step::Sign(0), Step::EthSign(1), Step::Approve, Step::Contract];

    let mut blobs = Vec::new();
    for order in permutations(&steps) {
        let mut tx = transaction(Revision::V141);
        for step in order {
            apply(&mut tx, &signers, step).await;
        }
        blobs.push(tx.signatures().clone());
    }

    assert_eq!(blobs.len(), 24);
    assert!(blobs.windows(2).all(|pair| pair[0] == pair[1]));

    let tx = transaction(Revision::V141).with_signatures(blobs[0].clone());
    let signers_on_blob = tx.signers().unwrap();
    let mut expected = vec![signers[0].address(), signers[1].address(), APPROVER, CONTRACT_OWNER];
    expected.sort();
    assert_eq!(signers_on_blob, expected);
}

#[tokio::test]
async fn test_parsed_blob_rebuilds_identically() {
    let signer = PrivateKeySigner::random();
    let mut tx = transaction(Revision::V130);
    apply(&mut tx, &[signer.clone()], Step::Sign(0)).await;
    apply(&mut tx, &[signer.clone()], Step::Contract).await;
    apply(&mut tx, &[signer.clone()], Step::Approve).await;

    let hash = tx.hash().unwrap();
    let parsed = parse_signatures(tx.signatures(), hash).unwrap();
    assert_eq!(parsed.len(), 3);
    assert_eq!(aggregate(&parsed).unwrap(), *tx.signatures());

    let contract = parsed
        .iter()
        .find(|signature| signature.scheme == SignatureScheme::Contract)
        .unwrap();
    assert_eq!(contract.owner, CONTRACT_OWNER);
    assert_eq!(
        contract.contract_signature.as_ref().map(|payload| &payload[..]),
        Some(&[0xdeu8, 0xad, 0xbe, 0xef][..])
    );
    // three static units precede the payload
    assert_eq!(contract.s, U256::from(3 * 65));

    let ecdsa = parsed.iter().find(|signature| signature.owner == signer.address()).unwrap();
    assert_eq!(ecdsa.scheme, SignatureScheme::Ecdsa);
}

#[tokio::test]
async fn test_resigning_is_a_no_op_and_unsign_removes() {
    let signer = PrivateKeySigner::random();
    let mut tx = transaction(Revision::V120);
    tx.sign(&signer).await.unwrap();
    let once = tx.signatures().clone();

    tx.sign(&signer).await.unwrap();
    assert_eq!(*tx.signatures(), once);

    assert!(tx.unsign(signer.address()).unwrap());
    assert!(tx.signatures().is_empty());
    assert!(!tx.unsign(signer.address()).unwrap());
}

#[tokio::test]
async fn test_signatures_bound_to_revision_hash() {
    let signer = PrivateKeySigner::random();
    let mut legacy = transaction(Revision::V100);
    legacy.sign(&signer).await.unwrap();

    // same payload hashed under a different domain recovers a different owner
    let current = transaction(Revision::V130).with_signatures(legacy.signatures().clone());
    assert_ne!(current.signers().unwrap(), vec![signer.address()]);
    assert_eq!(legacy.signers().unwrap(), vec![signer.address()]);
}

#[tokio::test]
async fn test_check_owners() {
    let signer = PrivateKeySigner::random();
    let mut tx = transaction(Revision::V141);
    tx.sign(&signer).await.unwrap();

    assert!(tx.check_owners(&[signer.address()]).is_ok());
    match tx.check_owners(&[APPROVER]) {
        Err(Error::NotOwner { owner, safe }) => {
            assert_eq!(owner, signer.address());
            assert_eq!(safe, SAFE);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_verify_signatures_on_chain() {
    let signer = PrivateKeySigner::random();
    let mut tx = transaction(Revision::V141);
    tx.sign(&signer).await.unwrap();
    tx.add_signature(SafeSignature::approved_hash(APPROVER)).unwrap();
    tx.add_signature(SafeSignature::contract(CONTRACT_OWNER, vec![0x01u8])).unwrap();

    let chain = MockChain::new(1);
    chain.returns::<ISafe::approvedHashesCall>(SAFE, uint(1));
    chain.returns::<IERC1271::isValidSignatureCall>(CONTRACT_OWNER, EIP1271_MAGIC_VALUE.abi_encode());
    assert!(tx.verify_signatures(&chain).await.unwrap().is_empty());

    let approved = chain.decoded::<ISafe::approvedHashesCall>(SAFE);
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].owner, APPROVER);
    assert_eq!(approved[0].hash, tx.hash().unwrap());

    let chain = MockChain::new(1);
    chain.returns::<ISafe::approvedHashesCall>(SAFE, uint(0));
    chain.returns::<IERC1271::isValidSignatureCall>(
        CONTRACT_OWNER,
        FixedBytes::<4>::ZERO.abi_encode(),
    );
    let mut invalid = tx.verify_signatures(&chain).await.unwrap();
    invalid.sort();
    assert_eq!(invalid, vec![CONTRACT_OWNER, APPROVER]);
}

#[tokio::test]
async fn test_legacy_contract_signature_gets_preimage() {
    let mut tx = transaction(Revision::V111);
    tx.add_signature(SafeSignature::contract(CONTRACT_OWNER, vec![0x01u8])).unwrap();

    let chain = MockChain::new(1);
    chain.reverts::<IERC1271::isValidSignatureCall>(CONTRACT_OWNER);
    chain.returns::<IERC1271Legacy::isValidSignatureCall>(
        CONTRACT_OWNER,
        EIP1271_LEGACY_MAGIC_VALUE.abi_encode(),
    );
    assert!(tx.verify_signatures(&chain).await.unwrap().is_empty());

    let legacy = chain.decoded::<IERC1271Legacy::isValidSignatureCall>(CONTRACT_OWNER);
    assert_eq!(legacy[0]._data, tx.hash_preimage().unwrap());
    assert_eq!(legacy[0]._signature, Bytes::from(vec![0x01u8]));
}

#[tokio::test]
async fn test_simulate_classifies_rejection() {
    let signer = PrivateKeySigner::random();
    let mut tx = transaction(Revision::V141);
    tx.sign(&signer).await.unwrap();

    let chain = MockChain::new(1);
    chain.returns::<ISafe::execTransactionCall>(SAFE, true.abi_encode());
    assert!(tx.simulate(&chain, signer.address()).await.unwrap());
    assert_eq!(chain.calls()[0].from, Some(signer.address()));

    let chain = MockChain::new(1);
    chain.on::<ISafe::execTransactionCall>(SAFE, |_| {
        Err(Error::Reverted {
            data: Bytes::new(),
            reason: Some("GS026".to_string()),
        })
    });
    match tx.simulate(&chain, signer.address()).await {
        Err(Error::SafeRejected { kind, .. }) => assert_eq!(kind, RevertKind::InvalidOwnerProvided),
        other => panic!("unexpected {other:?}"),
    }
}
