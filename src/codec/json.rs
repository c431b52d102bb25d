//! JSON codec using `serde_json`.

use super::{Codec, Value};
use crate::error::Result;

/// JSON codec (serialization code 1).
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, values: &[Value]) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(values)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
