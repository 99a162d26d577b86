//! On-chain checks for signatures whose owner is claimed rather than recovered

use alloy::primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy::sol_types::SolCall;
use tracing::debug;

use super::signature::{SafeSignature, SignatureScheme};
use crate::client::{CallRequest, ChainClient};
use crate::contracts::{
    IERC1271, IERC1271Legacy, ISafe, EIP1271_LEGACY_MAGIC_VALUE, EIP1271_MAGIC_VALUE,
};
use crate::error::{Error, Result};

/// Checks that a signature actually authorizes `safe_tx_hash`.
///
/// Recovered ECDSA signatures are valid by construction. Approved hashes are looked up in the
/// Safe's `approvedHashes` mapping. Contract signatures are passed to the owner contract, first
/// through the standard EIP-1271 entry point, then the legacy one with `preimage` (the EIP-712
/// encoded transaction data). A revert counts as an invalid signature; transport failures are
/// returned as errors.
pub async fn verify_signature<C: ChainClient>(
    client: &C,
    safe: Address,
    signature: &SafeSignature,
    safe_tx_hash: B256,
    preimage: &[u8],
) -> Result<bool> {
    match signature.scheme {
        SignatureScheme::Ecdsa | SignatureScheme::EthSign => Ok(true),
        SignatureScheme::ApprovedHash => {
            is_hash_approved(client, safe, signature.owner, safe_tx_hash).await
        }
        SignatureScheme::Contract => {
            let payload = signature.contract_signature.clone().unwrap_or_default();
            is_valid_contract_signature(client, signature.owner, safe_tx_hash, preimage, payload)
                .await
        }
    }
}

/// Whether `owner` called `approveHash(hash)` on the Safe
pub async fn is_hash_approved<C: ChainClient>(
    client: &C,
    safe: Address,
    owner: Address,
    hash: B256,
) -> Result<bool> {
    let call = ISafe::approvedHashesCall { owner, hash };
    let data = client.call(CallRequest::for_call(safe, &call)).await?;
    let approved = ISafe::approvedHashesCall::abi_decode_returns(&data)?;
    Ok(approved == U256::from(1))
}

async fn is_valid_contract_signature<C: ChainClient>(
    client: &C,
    owner: Address,
    hash: B256,
    preimage: &[u8],
    payload: Bytes,
) -> Result<bool> {
    let call = IERC1271::isValidSignatureCall {
        _hash: hash,
        _signature: payload.clone(),
    };
    if let Some(magic) = magic_value(client, owner, call.abi_encode()).await? {
        if magic == EIP1271_MAGIC_VALUE {
            return Ok(true);
        }
    }

    let legacy = IERC1271Legacy::isValidSignatureCall {
        _data: Bytes::copy_from_slice(preimage),
        _signature: payload,
    };
    let magic = magic_value(client, owner, legacy.abi_encode()).await?;
    debug!(%owner, ?magic, "checked legacy EIP-1271 signature");
    Ok(magic == Some(EIP1271_LEGACY_MAGIC_VALUE))
}

/// Returns the first four bytes returned by the owner, or `None` if the call reverted
async fn magic_value<C: ChainClient>(
    client: &C,
    owner: Address,
    calldata: Vec<u8>,
) -> Result<Option<FixedBytes<4>>> {
    match client.call(CallRequest::new(owner, calldata)).await {
        Ok(data) if data.len() >= 4 => Ok(Some(FixedBytes::from_slice(&data[..4]))),
        Ok(_) => Ok(None),
        Err(Error::Reverted { .. }) | Err(Error::OutOfGas) => Ok(None),
        Err(err) => Err(err),
    }
}
