//! Local ECDSA signature producers

use alloy::primitives::B256;
use alloy::signers::Signer;

use super::signature::{SafeSignature, SignatureScheme};
use crate::error::Result;

/// Signs the raw Safe transaction hash.
///
/// Safe expects `v` to be 27 or 28 for these signatures.
pub async fn sign_hash<S: Signer + Sync>(signer: &S, hash: B256) -> Result<SafeSignature> {
    let signature = signer.sign_hash(&hash).await?;

    Ok(SafeSignature {
        r: signature.r(),
        s: signature.s(),
        v: if signature.v() { 28 } else { 27 },
        owner: signer.address(),
        scheme: SignatureScheme::Ecdsa,
        contract_signature: None,
    })
}

/// Signs the hash as a personal message (`"\x19Ethereum Signed Message:\n32" || hash`).
///
/// `v` is shifted by 4 (31 or 32) so the Safe knows to apply the prefix before recovery.
pub async fn eth_sign_hash<S: Signer + Sync>(signer: &S, hash: B256) -> Result<SafeSignature> {
    let signature = signer.sign_message(hash.as_slice()).await?;

    Ok(SafeSignature {
        r: signature.r(),
        s: signature.s(),
        v: if signature.v() { 32 } else { 31 },
        owner: signer.address(),
        scheme: SignatureScheme::EthSign,
        contract_signature: None,
    })
}
