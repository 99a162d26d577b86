//! Checksum address parsing and normalization

use alloy::primitives::{Address, B256};

use crate::contracts::SENTINEL_ADDRESS;
use crate::error::{Error, Result};

/// Parses an address, requiring a valid EIP-55 checksum
pub fn parse_checksummed(input: &str) -> Result<Address> {
    Address::parse_checksummed(input, None).map_err(|e| Error::InvalidAddress {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Parses an address without checking its checksum
pub fn parse_address(input: &str) -> Result<Address> {
    input.parse::<Address>().map_err(|e| Error::InvalidAddress {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// EIP-55 checksummed hex form
pub fn to_checksum(address: Address) -> String {
    address.to_checksum(None)
}

/// Takes the low 20 bytes of a 32-byte word (storage slots, signature `r` values)
pub fn address_from_word(word: B256) -> Address {
    Address::from_word(word)
}

/// True for the zero address and the linked-list sentinel
pub fn is_null_address(address: Address) -> bool {
    address == Address::ZERO || address == SENTINEL_ADDRESS
}
