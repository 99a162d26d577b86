//! Signature generation, packing and verification for Safe transactions

mod ecdsa;
mod signature;
mod verify;

pub use ecdsa::{eth_sign_hash, sign_hash};
pub use signature::{
    aggregate, insert_signature, parse_signatures, remove_signature, SafeSignature,
    SignatureScheme, SIGNATURE_LEN,
};
pub use verify::{is_hash_approved, verify_signature};
