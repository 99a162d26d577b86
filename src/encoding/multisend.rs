//! MultiSend transaction encoding
//!
//! The MultiSend contract expects transactions to be encoded in a packed format:
//! - operation: 1 byte (0 = Call, 1 = DelegateCall)
//! - to: 20 bytes
//! - value: 32 bytes
//! - data length: 32 bytes
//! - data: variable length

use alloy::primitives::{Address, Bytes, U256};

use crate::error::{Error, Result};
use crate::types::Operation;

const HEADER_LEN: usize = 1 + 20 + 32 + 32;

/// One inner transaction of a MultiSend batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSendTx {
    pub operation: Operation,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl MultiSendTx {
    pub fn call(to: Address, value: U256, data: impl Into<Bytes>) -> Self {
        Self {
            operation: Operation::Call,
            to,
            value,
            data: data.into(),
        }
    }

    pub fn delegate_call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            operation: Operation::DelegateCall,
            to,
            value: U256::ZERO,
            data: data.into(),
        }
    }

    /// Packed encoding of this transaction
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(HEADER_LEN + self.data.len());
        encoded.push(self.operation.as_u8());
        encoded.extend_from_slice(self.to.as_slice());
        encoded.extend_from_slice(&self.value.to_be_bytes::<32>());
        encoded.extend_from_slice(&U256::from(self.data.len()).to_be_bytes::<32>());
        encoded.extend_from_slice(&self.data);
        encoded
    }
}

/// Encodes multiple transactions for MultiSend
pub fn encode_multisend_data(txs: &[MultiSendTx]) -> Bytes {
    let mut encoded = Vec::new();

    for tx in txs {
        encoded.extend(tx.encode());
    }

    Bytes::from(encoded)
}

/// Splits packed MultiSend data back into its transactions
pub fn decode_multisend_data(data: &[u8]) -> Result<Vec<MultiSendTx>> {
    let mut txs = Vec::new();
    let mut cursor = 0;

    while cursor < data.len() {
        let header = data
            .get(cursor..cursor + HEADER_LEN)
            .ok_or_else(|| Error::Abi(format!("truncated MultiSend header at byte {cursor}")))?;

        let operation = Operation::from_u8(header[0])
            .ok_or_else(|| Error::Abi(format!("invalid MultiSend operation {}", header[0])))?;
        let to = Address::from_slice(&header[1..21]);
        let value = U256::from_be_slice(&header[21..53]);
        let data_len: usize = U256::from_be_slice(&header[53..85])
            .try_into()
            .map_err(|_| Error::Abi("MultiSend data length overflows".to_string()))?;

        let start = cursor + HEADER_LEN;
        let payload = start
            .checked_add(data_len)
            .and_then(|end| data.get(start..end))
            .ok_or_else(|| Error::Abi(format!("truncated MultiSend data at byte {start}")))?;

        txs.push(MultiSendTx {
            operation,
            to,
            value,
            data: Bytes::copy_from_slice(payload),
        });
        cursor = start + data_len;
    }

    Ok(txs)
}
