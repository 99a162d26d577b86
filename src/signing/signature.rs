//! Packed Safe signatures: parsing, canonical ordering and re-serialization.
//!
//! A signature blob is a sequence of 65-byte `r || s || v` units, optionally followed by a
//! dynamic section holding EIP-1271 payloads for contract owners. The `v` byte selects the
//! scheme:
//!
//! | v      | scheme        | owner                                   |
//! |--------|---------------|-----------------------------------------|
//! | 0      | contract      | `r`; `s` is the offset of its payload   |
//! | 1      | approved hash | `r`; checked against `approvedHashes`   |
//! | > 30   | eth_sign      | recovered from the prefixed hash, `v-4` |
//! | other  | ECDSA         | recovered from the raw hash             |

use alloy::primitives::{Address, Bytes, Signature, B256, U256};
use serde::{Deserialize, Serialize};

use crate::address::address_from_word;
use crate::error::{Error, Result};

/// Length of the static part of every signature
pub const SIGNATURE_LEN: usize = 65;

/// How a signature proves approval of a transaction hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// Plain ECDSA over the Safe transaction hash
    Ecdsa,
    /// ECDSA over the personal-message (EIP-191) wrapped hash
    EthSign,
    /// On-chain `approveHash` by the owner or `msg.sender == owner`
    ApprovedHash,
    /// EIP-1271 signature checked by the owner contract
    Contract,
}

impl SignatureScheme {
    pub fn from_v(v: u8) -> Self {
        match v {
            0 => SignatureScheme::Contract,
            1 => SignatureScheme::ApprovedHash,
            v if v > 30 => SignatureScheme::EthSign,
            _ => SignatureScheme::Ecdsa,
        }
    }

    /// Whether the owner was recovered cryptographically rather than claimed in `r`
    pub fn is_recovered(&self) -> bool {
        matches!(self, SignatureScheme::Ecdsa | SignatureScheme::EthSign)
    }
}

/// A single owner's signature with its derived owner and scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeSignature {
    pub r: U256,
    pub s: U256,
    pub v: u8,
    pub owner: Address,
    pub scheme: SignatureScheme,
    /// EIP-1271 payload forwarded to the owner contract; only set for [`SignatureScheme::Contract`]
    pub contract_signature: Option<Bytes>,
}

impl SafeSignature {
    /// Decodes one 65-byte unit and recovers or reads its owner.
    ///
    /// Contract signatures are returned without payload; see [`parse_signatures`].
    pub fn from_bytes(chunk: &[u8], safe_tx_hash: B256) -> Result<Self> {
        if chunk.len() < SIGNATURE_LEN {
            return Err(Error::SignatureTooShort { len: chunk.len() });
        }
        let r = U256::from_be_slice(&chunk[..32]);
        let s = U256::from_be_slice(&chunk[32..64]);
        let v = chunk[64];
        Self::from_rsv(r, s, v, safe_tx_hash)
    }

    pub fn from_rsv(r: U256, s: U256, v: u8, safe_tx_hash: B256) -> Result<Self> {
        let scheme = SignatureScheme::from_v(v);
        let owner = match scheme {
            SignatureScheme::Contract | SignatureScheme::ApprovedHash => {
                address_from_word(B256::from(r.to_be_bytes::<32>()))
            }
            SignatureScheme::EthSign => {
                let signature = Signature::new(r, s, parity(v - 4)?);
                signature
                    .recover_address_from_msg(safe_tx_hash.as_slice())
                    .map_err(|e| invalid(0, e))?
            }
            SignatureScheme::Ecdsa => {
                let signature = Signature::new(r, s, parity(v)?);
                signature
                    .recover_address_from_prehash(&safe_tx_hash)
                    .map_err(|e| invalid(0, e))?
            }
        };

        Ok(Self {
            r,
            s,
            v,
            owner,
            scheme,
            contract_signature: None,
        })
    }

    /// Pre-validated signature for an owner that approved the hash on-chain or will send the tx
    pub fn approved_hash(owner: Address) -> Self {
        Self {
            r: U256::from_be_bytes(owner.into_word().0),
            s: U256::ZERO,
            v: 1,
            owner,
            scheme: SignatureScheme::ApprovedHash,
            contract_signature: None,
        }
    }

    /// EIP-1271 signature; the offset in `s` is assigned when aggregated
    pub fn contract(owner: Address, payload: impl Into<Bytes>) -> Self {
        Self {
            r: U256::from_be_bytes(owner.into_word().0),
            s: U256::ZERO,
            v: 0,
            owner,
            scheme: SignatureScheme::Contract,
            contract_signature: Some(payload.into()),
        }
    }

    /// The static `r || s || v` unit with `s` as stored
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        encode_rsv(self.r, self.s, self.v)
    }
}

fn encode_rsv(r: U256, s: U256, v: u8) -> [u8; SIGNATURE_LEN] {
    let mut out = [0u8; SIGNATURE_LEN];
    out[..32].copy_from_slice(&r.to_be_bytes::<32>());
    out[32..64].copy_from_slice(&s.to_be_bytes::<32>());
    out[64] = v;
    out
}

fn parity(v: u8) -> Result<bool> {
    match v {
        27 => Ok(false),
        28 => Ok(true),
        other => Err(Error::InvalidSignature {
            index: 0,
            reason: format!("unsupported v value {other}"),
        }),
    }
}

fn invalid(index: usize, err: impl std::fmt::Display) -> Error {
    Error::InvalidSignature {
        index,
        reason: err.to_string(),
    }
}

/// Splits a packed blob into signatures.
///
/// Trailing bytes shorter than a full unit are ignored, as some producers zero-pad the blob.
/// Parsing stops at the start of the dynamic section referenced by contract signatures.
pub fn parse_signatures(blob: &[u8], safe_tx_hash: B256) -> Result<Vec<SafeSignature>> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    if blob.len() < SIGNATURE_LEN {
        return Err(Error::SignatureTooShort { len: blob.len() });
    }

    let mut data_position = blob.len();
    let mut signatures = Vec::new();

    for (index, start) in (0..blob.len()).step_by(SIGNATURE_LEN).enumerate() {
        if start >= data_position {
            break;
        }
        let Some(chunk) = blob.get(start..start + SIGNATURE_LEN) else {
            break;
        };

        let mut signature = SafeSignature::from_bytes(chunk, safe_tx_hash).map_err(|e| match e {
            Error::InvalidSignature { reason, .. } => Error::InvalidSignature { index, reason },
            other => other,
        })?;

        if signature.scheme == SignatureScheme::Contract {
            let offset = dynamic_offset(signature.s, start, blob.len(), signature.owner)?;
            data_position = data_position.min(offset);
            signature.contract_signature = Some(read_dynamic(blob, offset, signature.owner)?);
        }
        signatures.push(signature);
    }

    Ok(signatures)
}

fn dynamic_offset(s: U256, start: usize, blob_len: usize, owner: Address) -> Result<usize> {
    let location = || Error::InvalidContractSignatureLocation {
        owner,
        offset: s.to_string(),
    };
    let offset: usize = s.try_into().map_err(|_| location())?;
    if offset < start + SIGNATURE_LEN || offset >= blob_len {
        return Err(location());
    }
    Ok(offset)
}

fn read_dynamic(blob: &[u8], offset: usize, owner: Address) -> Result<Bytes> {
    let location = || Error::InvalidContractSignatureLocation {
        owner,
        offset: offset.to_string(),
    };
    let len_word = blob.get(offset..offset + 32).ok_or_else(location)?;
    let len: usize = U256::from_be_slice(len_word).try_into().map_err(|_| location())?;
    let start = offset + 32;
    let payload = start
        .checked_add(len)
        .and_then(|end| blob.get(start..end))
        .ok_or_else(location)?;
    Ok(Bytes::copy_from_slice(payload))
}

/// Serializes signatures in the order the Safe contract requires: ascending by owner,
/// followed by the length-prefixed payloads of any contract signatures.
pub fn aggregate(signatures: &[SafeSignature]) -> Result<Bytes> {
    let mut sorted: Vec<&SafeSignature> = signatures.iter().collect();
    sorted.sort_by_key(|signature| signature.owner);

    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].owner == pair[1].owner) {
        return Err(Error::DuplicateOwner(pair[0].owner));
    }

    let mut static_part = Vec::with_capacity(sorted.len() * SIGNATURE_LEN);
    let mut dynamic_part = Vec::new();
    let mut dynamic_offset = sorted.len() * SIGNATURE_LEN;

    for signature in sorted {
        match (&signature.scheme, &signature.contract_signature) {
            (SignatureScheme::Contract, payload) => {
                let payload: &[u8] = payload.as_ref().map(|payload| &payload[..]).unwrap_or(&[]);
                static_part.extend_from_slice(&encode_rsv(
                    signature.r,
                    U256::from(dynamic_offset),
                    signature.v,
                ));
                dynamic_part.extend_from_slice(&U256::from(payload.len()).to_be_bytes::<32>());
                dynamic_part.extend_from_slice(payload);
                dynamic_offset += 32 + payload.len();
            }
            _ => static_part.extend_from_slice(&signature.to_bytes()),
        }
    }

    static_part.extend_from_slice(&dynamic_part);
    Ok(Bytes::from(static_part))
}

/// Inserts a signature at its sorted position in an existing blob.
///
/// An owner that already signed keeps its original signature and the blob is returned as is.
pub fn insert_signature(blob: &[u8], signature: SafeSignature, safe_tx_hash: B256) -> Result<Bytes> {
    let mut signatures = parse_signatures(blob, safe_tx_hash)?;
    if signatures.iter().any(|existing| existing.owner == signature.owner) {
        return Ok(Bytes::copy_from_slice(blob));
    }

    let position = signatures.partition_point(|existing| existing.owner < signature.owner);
    signatures.insert(position, signature);
    aggregate(&signatures)
}

/// Removes the signature of `owner`, returning the rebuilt blob and whether anything was removed
pub fn remove_signature(blob: &[u8], owner: Address, safe_tx_hash: B256) -> Result<(Bytes, bool)> {
    let mut signatures = parse_signatures(blob, safe_tx_hash)?;
    let before = signatures.len();
    signatures.retain(|signature| signature.owner != owner);
    if signatures.len() == before {
        return Ok((Bytes::copy_from_slice(blob), false));
    }
    Ok((aggregate(&signatures)?, true))
}
