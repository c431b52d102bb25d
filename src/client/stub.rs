//! Typed call stubs bound to one `Object.Method`.

use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Client;
use crate::codec::{to_values, Value};
use crate::error::{RpcError, Result};
use crate::handler::OUTPUT_ARITY;

/// Split `"Object.Method"` into its two non-empty parts.
///
/// ```
/// use wirecall::client::parse_service_path;
///
/// assert_eq!(parse_service_path("User.SayHello").unwrap(), ("User", "SayHello"));
/// assert!(parse_service_path("User").is_err());
/// assert!(parse_service_path("a.b.c").is_err());
/// ```
pub fn parse_service_path(path: &str) -> Result<(&str, &str)> {
    let mut parts = path.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(object), Some(method), None) if !object.is_empty() && !method.is_empty() => {
            Ok((object, method))
        }
        _ => Err(RpcError::Format(format!(
            "service path {path:?} must look like Object.Method"
        ))),
    }
}

/// Callable handle for one remote method.
///
/// `A` is the argument tuple (or a single serializable value), `R` the
/// type of the method's value output. A `null` value output decodes as
/// `R::default()`.
pub struct Stub<A, R> {
    client: Client,
    object: String,
    method: String,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A, R> Stub<A, R> {
    pub(crate) fn new(client: Client, object: &str, method: &str) -> Self {
        Self {
            client,
            object: object.to_string(),
            method: method.to_string(),
            _marker: PhantomData,
        }
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl<A, R> Clone for Stub<A, R> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            object: self.object.clone(),
            method: self.method.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A, R> Stub<A, R>
where
    A: Serialize,
    R: DeserializeOwned + Default,
{
    /// Call with the client's configured deadline.
    pub async fn call(&self, args: A) -> Result<R> {
        let deadline = self.client.config().read_timeout;
        self.call_timeout(args, deadline).await
    }

    /// Call with an explicit deadline; `None` waits until the connection ends.
    pub async fn call_timeout(&self, args: A, deadline: Option<Duration>) -> Result<R> {
        let values = to_values(&args)?;
        let outputs = self
            .client
            .invoke(&self.object, &self.method, &values, deadline)
            .await?;
        decode_outputs(&self.object, &self.method, outputs)
    }
}

/// Interpret a `[value, error]` output list.
///
/// A list of the wrong length is logged and yields the zero value.
fn decode_outputs<R>(object: &str, method: &str, mut outputs: Vec<Value>) -> Result<R>
where
    R: DeserializeOwned + Default,
{
    if outputs.len() != OUTPUT_ARITY {
        tracing::warn!(
            object,
            method,
            got = outputs.len(),
            expected = OUTPUT_ARITY,
            "result count mismatch, using zero value"
        );
        return Ok(R::default());
    }

    let error = outputs.pop().unwrap_or(Value::Null);
    let value = outputs.pop().unwrap_or(Value::Null);

    match error {
        Value::Null => {}
        Value::String(message) => return Err(RpcError::Remote(message)),
        other => return Err(RpcError::Remote(other.to_string())),
    }

    match value {
        Value::Null => Ok(R::default()),
        value => Ok(serde_json::from_value(value)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct Info {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Id")]
        id: u64,
    }

    #[test]
    fn test_parse_service_path() {
        assert_eq!(parse_service_path("User.GetUserIds").unwrap(), ("User", "GetUserIds"));

        for bad in ["", "User", ".Method", "User.", "a.b.c", "."] {
            assert!(
                matches!(parse_service_path(bad), Err(RpcError::Format(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_decode_value_and_null_error() {
        let outputs = vec![serde_json::json!({ "Name": "ss", "Id": 1 }), Value::Null];
        let info: Info = decode_outputs("User", "GetUserInfoById", outputs).unwrap();
        assert_eq!(info, Info { name: "ss".into(), id: 1 });
    }

    #[test]
    fn test_decode_remote_error() {
        let outputs = vec![Value::Null, Value::from("user not found")];
        let err = decode_outputs::<Info>("User", "GetUserInfoById", outputs).unwrap_err();
        assert!(matches!(err, RpcError::Remote(msg) if msg == "user not found"));
    }

    #[test]
    fn test_decode_null_value_is_zero() {
        let ids: Vec<u64> = decode_outputs("User", "GetUserIds", vec![Value::Null, Value::Null]).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_decode_wrong_arity_is_zero() {
        let one: String = decode_outputs("User", "SayHello", vec![Value::from("hi")]).unwrap();
        assert_eq!(one, "");

        let three: u64 =
            decode_outputs("A", "B", vec![Value::from(1), Value::Null, Value::Null]).unwrap();
        assert_eq!(three, 0);
    }

    #[test]
    fn test_decode_type_mismatch_is_codec_error() {
        let err = decode_outputs::<u64>("A", "B", vec![Value::from("nope"), Value::Null]).unwrap_err();
        assert!(matches!(err, RpcError::Codec(_)));
    }
}
