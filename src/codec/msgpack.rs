//! MsgPack codec using `rmp-serde`.
//!
//! Structs are written with `to_vec_named` (struct-as-map) so the payload
//! stays self-describing: the receiving side decodes into dynamic values
//! without knowing the target type.

use super::{Codec, Value};
use crate::error::Result;

/// MessagePack codec, the default binary serialization.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode_value<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    #[inline]
    pub fn decode_value<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

impl Codec for MsgPackCodec {
    fn encode(&self, values: &[Value]) -> Result<Vec<u8>> {
        Self::encode_value(values)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>> {
        Self::decode_value(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_values;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestStruct {
        id: u32,
        name: String,
        active: bool,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = TestStruct {
            id: 42,
            name: "test".to_string(),
            active: true,
        };

        let encoded = MsgPackCodec::encode_value(&original).unwrap();
        let decoded: TestStruct = MsgPackCodec::decode_value(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_sequence_is_msgpack_array() {
        let values = to_values(&("hello", 1i32, false)).unwrap();
        let encoded = MsgPackCodec.encode(&values).unwrap();

        // fixarray with 3 elements
        assert_eq!(encoded[0], 0x93);
        assert_eq!(MsgPackCodec.decode(&encoded).unwrap(), values);
    }

    #[test]
    fn test_struct_inside_sequence_is_map_format() {
        let values = to_values(&(TestStruct { id: 1, name: "x".into(), active: false },)).unwrap();
        let encoded = MsgPackCodec.encode(&values).unwrap();

        // fixarray(1) followed by fixmap(3)
        assert_eq!(encoded[0], 0x91);
        assert_eq!(encoded[1], 0x83);
    }

    #[test]
    fn test_negative_and_float_values_survive() {
        let values = to_values(&(-12345i64, 3.5f64, Option::<i32>::None)).unwrap();
        let decoded = MsgPackCodec.decode(&MsgPackCodec.encode(&values).unwrap()).unwrap();

        assert_eq!(decoded[0].as_i64(), Some(-12345));
        assert_eq!(decoded[1].as_f64(), Some(3.5));
        assert!(decoded[2].is_null());
    }

    #[test]
    fn test_empty_sequence() {
        let encoded = MsgPackCodec.encode(&[]).unwrap();
        assert_eq!(encoded, vec![0x90]);
        assert!(MsgPackCodec.decode(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        assert!(MsgPackCodec.decode(b"not valid msgpack").is_err());
    }
}
