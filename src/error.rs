//! Error types for safe-protocol

use std::fmt;

use alloy::primitives::{Address, Bytes};
use thiserror::Error;

use crate::version::Revision;

/// Result type alias for safe-protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when building, signing, estimating or executing Safe transactions
#[derive(Debug, Error)]
pub enum Error {
    /// Transport or node failure; never retried here
    #[error("Provider error: {0}")]
    Provider(String),

    /// Failed to fetch data from the blockchain
    #[error("Failed to fetch {what}: {reason}")]
    Fetch { what: &'static str, reason: String },

    /// A call reverted. `data` is the raw revert payload, possibly empty
    #[error("Execution reverted: {}", reason.as_deref().unwrap_or("no reason"))]
    Reverted { data: Bytes, reason: Option<String> },

    /// The node reported the call ran out of gas
    #[error("Out of gas")]
    OutOfGas,

    /// Address failed validation
    #[error("Invalid address {input}: {reason}")]
    InvalidAddress { input: String, reason: String },

    /// The transaction nonce was never set
    #[error("SafeTx nonce is not set")]
    MissingNonce,

    /// Signature blob shorter than a single signature
    #[error("Signature data too short: expected at least 65 bytes, got {len}")]
    SignatureTooShort { len: usize },

    /// A signature could not be decoded or its owner recovered
    #[error("Invalid signature at index {index}: {reason}")]
    InvalidSignature { index: usize, reason: String },

    /// Contract signature offset points inside the static part or past the blob
    #[error("Invalid contract signature location for {owner}: offset {offset}")]
    InvalidContractSignatureLocation { owner: Address, offset: String },

    /// More than one signature for the same owner
    #[error("Duplicate signature for owner {0}")]
    DuplicateOwner(Address),

    /// The signer is not an owner of the Safe
    #[error("Signer {owner} is not an owner of Safe {safe}")]
    NotOwner { owner: Address, safe: Address },

    /// Threshold of zero reported for a Safe that has owners
    #[error("Safe {safe} has {owners} owners but threshold 0")]
    ThresholdZeroWithOwners { safe: Address, owners: usize },

    /// The operation does not exist on this protocol revision
    #[error("{operation} is not supported by Safe {revision}")]
    Unsupported { operation: &'static str, revision: Revision },

    /// Gas estimation exhausted every strategy
    #[error("Cannot estimate gas: {0}")]
    CannotEstimateGas(String),

    /// The Safe contract rejected the transaction
    #[error("Safe rejected transaction ({kind}): {message}")]
    SafeRejected { kind: RevertKind, message: String },

    /// Transaction execution failed
    #[error("Execution failed: {reason}")]
    ExecutionFailed { reason: String },

    /// Signature generation failed
    #[error("Failed to sign: {0}")]
    Signing(String),

    /// ABI encoding/decoding error
    #[error("ABI error: {0}")]
    Abi(String),
}

impl Error {
    /// Whether this error is the distinctive outcome of a call that was given too little gas
    pub fn is_gas_shortfall(&self) -> bool {
        match self {
            Error::OutOfGas => true,
            Error::Reverted { data, .. } => data.is_empty(),
            _ => false,
        }
    }

    /// A revert carrying data and a decoded, non-empty reason
    pub fn is_explained_revert(&self) -> bool {
        matches!(
            self,
            Error::Reverted { data, reason: Some(reason) } if !data.is_empty() && !reason.is_empty()
        )
    }

    /// Converts a raw revert into a typed Safe rejection, leaving other errors untouched
    pub fn into_safe_rejection(self) -> Self {
        match self {
            Error::Reverted { data, reason } => {
                let message = reason.unwrap_or_else(|| data.to_string());
                Error::SafeRejected {
                    kind: RevertKind::classify(&message),
                    message,
                }
            }
            other => other,
        }
    }
}

/// On-chain rejection reasons raised by the Safe contracts.
///
/// Newer revisions revert with `GSxxx` codes, older ones with full strings; both map here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevertKind {
    CouldNotFinishInitialization,
    ThresholdNeedsToBeDefined,
    NotEnoughSafeTransactionGas,
    CouldNotPayGasWithEther,
    CouldNotPayGasWithToken,
    TransactionFailedWithoutGasPrice,
    SignaturesDataTooShort,
    InvalidContractSignatureLocation,
    HashNotApproved,
    InvalidOwnerProvided,
    InvalidSignaturesProvided,
    SignatureNotProvidedByOwner,
    OnlyOwnersCanApproveHash,
    MethodOnlyCallableFromSafe,
    ModuleManager,
    OwnerManager,
    Unknown,
}

const REVERT_REASONS: &[(&str, RevertKind)] = &[
    ("GS000", RevertKind::CouldNotFinishInitialization),
    ("GS001", RevertKind::ThresholdNeedsToBeDefined),
    ("Could not pay gas costs with ether", RevertKind::CouldNotPayGasWithEther),
    ("GS011", RevertKind::CouldNotPayGasWithEther),
    ("Could not pay gas costs with token", RevertKind::CouldNotPayGasWithToken),
    ("GS012", RevertKind::CouldNotPayGasWithToken),
    ("GS013", RevertKind::TransactionFailedWithoutGasPrice),
    ("Hash has not been approved", RevertKind::HashNotApproved),
    ("Hash not approved", RevertKind::HashNotApproved),
    ("GS025", RevertKind::HashNotApproved),
    ("Invalid contract signature location", RevertKind::InvalidContractSignatureLocation),
    ("Invalid contract signature provided", RevertKind::InvalidContractSignatureLocation),
    ("GS021", RevertKind::InvalidContractSignatureLocation),
    ("GS022", RevertKind::InvalidContractSignatureLocation),
    ("GS023", RevertKind::InvalidContractSignatureLocation),
    ("GS024", RevertKind::InvalidContractSignatureLocation),
    ("Invalid owner provided", RevertKind::InvalidOwnerProvided),
    ("Invalid owner address provided", RevertKind::InvalidOwnerProvided),
    ("GS026", RevertKind::InvalidOwnerProvided),
    ("Invalid signatures provided", RevertKind::InvalidSignaturesProvided),
    ("Not enough gas to execute safe transaction", RevertKind::NotEnoughSafeTransactionGas),
    ("GS010", RevertKind::NotEnoughSafeTransactionGas),
    ("Only owners can approve a hash", RevertKind::OnlyOwnersCanApproveHash),
    ("GS030", RevertKind::OnlyOwnersCanApproveHash),
    ("GS031", RevertKind::MethodOnlyCallableFromSafe),
    ("Signature not provided by owner", RevertKind::SignatureNotProvidedByOwner),
    ("Signatures data too short", RevertKind::SignaturesDataTooShort),
    ("GS020", RevertKind::SignaturesDataTooShort),
    ("GS100", RevertKind::ModuleManager),
    ("GS101", RevertKind::ModuleManager),
    ("GS102", RevertKind::ModuleManager),
    ("GS103", RevertKind::ModuleManager),
    ("GS104", RevertKind::ModuleManager),
    ("Invalid module address provided", RevertKind::ModuleManager),
    ("Invalid prevModule, module pair provided", RevertKind::ModuleManager),
    ("Method can only be called from an enabled module", RevertKind::ModuleManager),
    ("Module has already been added", RevertKind::ModuleManager),
    ("GS200", RevertKind::OwnerManager),
    ("GS201", RevertKind::OwnerManager),
    ("GS202", RevertKind::OwnerManager),
    ("GS203", RevertKind::OwnerManager),
    ("GS204", RevertKind::OwnerManager),
    ("GS205", RevertKind::OwnerManager),
    ("Address is already an owner", RevertKind::OwnerManager),
    ("Invalid prevOwner, owner pair provided", RevertKind::OwnerManager),
    ("New owner count needs to be larger than new threshold", RevertKind::OwnerManager),
    ("Threshold cannot exceed owner count", RevertKind::OwnerManager),
    ("Threshold needs to be greater than 0", RevertKind::OwnerManager),
];

impl RevertKind {
    /// Classifies a revert message by the first known reason it contains
    pub fn classify(message: &str) -> Self {
        REVERT_REASONS
            .iter()
            .find(|(reason, _)| message.contains(reason))
            .map(|(_, kind)| *kind)
            .unwrap_or(RevertKind::Unknown)
    }
}

impl fmt::Display for RevertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RevertKind::CouldNotFinishInitialization => "could not finish initialization",
            RevertKind::ThresholdNeedsToBeDefined => "threshold needs to be defined",
            RevertKind::NotEnoughSafeTransactionGas => "not enough safe transaction gas",
            RevertKind::CouldNotPayGasWithEther => "could not pay gas costs with ether",
            RevertKind::CouldNotPayGasWithToken => "could not pay gas costs with token",
            RevertKind::TransactionFailedWithoutGasPrice => {
                "transaction failed with gas price and safe tx gas empty"
            }
            RevertKind::SignaturesDataTooShort => "signatures data too short",
            RevertKind::InvalidContractSignatureLocation => "invalid contract signature location",
            RevertKind::HashNotApproved => "hash has not been approved",
            RevertKind::InvalidOwnerProvided => "invalid owner provided",
            RevertKind::InvalidSignaturesProvided => "invalid signatures provided",
            RevertKind::SignatureNotProvidedByOwner => "signature not provided by owner",
            RevertKind::OnlyOwnersCanApproveHash => "only owners can approve a hash",
            RevertKind::MethodOnlyCallableFromSafe => "method can only be called from this contract",
            RevertKind::ModuleManager => "module manager",
            RevertKind::OwnerManager => "owner manager",
            RevertKind::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

impl From<alloy::transports::RpcError<alloy::transports::TransportErrorKind>> for Error {
    fn from(err: alloy::transports::RpcError<alloy::transports::TransportErrorKind>) -> Self {
        Error::Provider(err.to_string())
    }
}

impl From<alloy::contract::Error> for Error {
    fn from(err: alloy::contract::Error) -> Self {
        Error::Provider(err.to_string())
    }
}

impl From<alloy::signers::Error> for Error {
    fn from(err: alloy::signers::Error) -> Self {
        Error::Signing(err.to_string())
    }
}

impl From<alloy::sol_types::Error> for Error {
    fn from(err: alloy::sol_types::Error) -> Self {
        Error::Abi(err.to_string())
    }
}
