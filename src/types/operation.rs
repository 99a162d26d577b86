//! The `operation` byte of Safe and MultiSend transactions

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the Safe reaches `to`.
///
/// Encoded as a single byte everywhere: in the EIP-712 struct, in `execTransaction`, in
/// `requiredTxGas` and in each packed MultiSend entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Operation {
    #[default]
    Call = 0,
    /// Runs the target's code against the Safe's storage
    DelegateCall = 1,
    /// Only accepted by gas simulation; `execTransaction` rejects it
    Create = 2,
}

impl Operation {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        [Operation::Call, Operation::DelegateCall, Operation::Create]
            .into_iter()
            .find(|operation| operation.as_u8() == value)
    }

    pub fn is_delegate_call(&self) -> bool {
        *self == Operation::DelegateCall
    }
}

impl From<Operation> for u8 {
    fn from(operation: Operation) -> Self {
        operation.as_u8()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Call => f.write_str("call"),
            Operation::DelegateCall => f.write_str("delegatecall"),
            Operation::Create => f.write_str("create"),
        }
    }
}
