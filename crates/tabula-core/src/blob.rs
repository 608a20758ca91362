//! Binary blob codec.
//!
//! Blob attributes accept any `Value`; the codec packs it into a compact
//! binary form before storage (inline or in an external store) and unpacks
//! it on retrieval.

use crate::error::{Error, Result};
use crate::value::Value;

pub fn pack(value: &Value) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Serde(format!("blob pack failed: {e}")))
}

pub fn unpack(bytes: &[u8]) -> Result<Value> {
    bincode::deserialize(bytes).map_err(|e| Error::Serde(format!("blob unpack failed: {e}")))
}
