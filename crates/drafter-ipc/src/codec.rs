use drafter_core::Response;
use serde::Serialize;
use serde_json::{Deserializer, Value};

use crate::ClientError;

/// Serializes a value to compact JSON bytes for wire transmission.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ClientError> {
    serde_json::to_vec(value).map_err(|err| ClientError::Encode(err.to_string()))
}

/// Decodes a buffer that must hold exactly one JSON response.
pub fn decode_response(bytes: &[u8]) -> Result<Response, ClientError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ClientError::Decode("empty response".to_string()));
    }

    let value: Value =
        serde_json::from_slice(bytes).map_err(|err| ClientError::Decode(err.to_string()))?;
    response_from_value(value)
}

/// Decodes the first complete JSON value at the start of `bytes`.
///
/// Returns `Ok(None)` while the buffer holds only a truncated value, and the
/// number of bytes consumed on success.
pub fn decode_prefix(bytes: &[u8]) -> Result<Option<(Response, usize)>, ClientError> {
    match split_value(bytes)? {
        Some((value, consumed)) => Ok(Some((response_from_value(value)?, consumed))),
        None => Ok(None),
    }
}

/// Splits the first complete JSON value off the start of `bytes`.
///
/// Only malformed JSON is an error here; the value's shape is checked by
/// [`response_from_value`].
pub fn split_value(bytes: &[u8]) -> Result<Option<(Value, usize)>, ClientError> {
    let mut values = Deserializer::from_slice(bytes).into_iter::<Value>();

    match values.next() {
        None => Ok(None),
        Some(Ok(value)) => Ok(Some((value, values.byte_offset()))),
        Some(Err(err)) if err.is_eof() => Ok(None),
        Some(Err(err)) => Err(ClientError::Decode(err.to_string())),
    }
}

/// Interprets a decoded JSON value as a response object.
pub fn response_from_value(value: Value) -> Result<Response, ClientError> {
    if !value.is_object() {
        return Err(ClientError::Protocol(format!(
            "expected a JSON object, got {}",
            kind_of(&value)
        )));
    }
    serde_json::from_value(value).map_err(|err| ClientError::Protocol(err.to_string()))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
