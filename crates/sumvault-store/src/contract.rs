//! Encoding for the on-chain summary contract's `bytes` argument
//!
//! The contract stores whatever bytes it is given. Envelopes go in as
//! their UTF-8 bytes, hex-encoded with a `0x` prefix.

use crate::{Result, StoreError};

/// `envelope` -> `0x<utf8 hex>`
pub fn to_contract_bytes(envelope: &str) -> String {
    format!("0x{}", hex::encode(envelope.as_bytes()))
}

/// `0x<utf8 hex>` -> envelope string
pub fn from_contract_bytes(bytes: &str) -> Result<String> {
    let clean = bytes
        .strip_prefix("0x")
        .ok_or_else(|| StoreError::InvalidContractBytes("missing 0x prefix".into()))?;
    let raw = hex::decode(clean).map_err(|e| StoreError::InvalidContractBytes(e.to_string()))?;
    String::from_utf8(raw).map_err(|e| StoreError::InvalidContractBytes(e.to_string()))
}
