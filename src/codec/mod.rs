//! Codec module - serialization of ordered argument/result sequences.
//!
//! Every payload on the wire is an ordered list of heterogeneous values.
//! The dynamic element type is [`Value`]; typed arguments and results are
//! converted with [`to_values`] and [`from_values`].
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (code 0)
//! - [`JsonCodec`] - JSON using `serde_json` (code 1)
//!
//! # Example
//!
//! ```
//! use wirecall::codec::{codec_for, from_values, to_values};
//! use wirecall::protocol::Serialization;
//!
//! let codec = codec_for(Serialization::MsgPack);
//! let bytes = codec.encode(&to_values(&(1u64, "ss")).unwrap()).unwrap();
//! let (id, name): (u64, String) = from_values(codec.decode(&bytes).unwrap()).unwrap();
//! assert_eq!((id, name.as_str()), (1, "ss"));
//! ```

mod json;
mod msgpack;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;
pub use serde_json::Value;

use crate::error::Result;
use crate::protocol::Serialization;

/// Serializer for an ordered sequence of values.
pub trait Codec: Send + Sync + 'static {
    /// Encode the sequence to bytes.
    fn encode(&self, values: &[Value]) -> Result<Vec<u8>>;

    /// Decode bytes produced by [`Codec::encode`].
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>>;
}

static MSGPACK: MsgPackCodec = MsgPackCodec;
static JSON: JsonCodec = JsonCodec;

/// Resolve the codec registered for a serialization code.
pub fn codec_for(serialization: Serialization) -> &'static dyn Codec {
    match serialization {
        Serialization::MsgPack => &MSGPACK,
        Serialization::Json => &JSON,
    }
}

/// Spread a typed value into positional values.
///
/// Tuples and sequences become one value per element, `()` becomes the
/// empty list, anything else becomes a single value. Wrap a lone sequence
/// argument in a 1-tuple to keep it as one value.
pub fn to_values<T: Serialize + ?Sized>(value: &T) -> Result<Vec<Value>> {
    Ok(match serde_json::to_value(value)? {
        Value::Array(values) => values,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

/// Collect positional values into a typed value.
///
/// Inverse of [`to_values`]: a single value is accepted either as a
/// 1-element tuple or as the bare value.
pub fn from_values<T: DeserializeOwned>(mut values: Vec<Value>) -> Result<T> {
    match values.len() {
        0 => match serde_json::from_value(Value::Null) {
            Ok(v) => Ok(v),
            Err(_) => Ok(serde_json::from_value(Value::Array(values))?),
        },
        1 => match serde_json::from_value(Value::Array(values.clone())) {
            Ok(v) => Ok(v),
            Err(_) => Ok(serde_json::from_value(values.remove(0))?),
        },
        _ => Ok(serde_json::from_value(Value::Array(values))?),
    }
}
