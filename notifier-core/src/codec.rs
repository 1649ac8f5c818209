//! Codec for JSON-RPC frames
//!
//! Thin, typed wrappers around serde_json that map failures onto the
//! notifier error taxonomy:
//!
//! - Text that is not JSON, or JSON that is not a JSON-RPC envelope, decodes
//!   to `Error::JsonRpc(-32700 Parse error)`. The server answers such frames
//!   with an error response instead of dropping the connection.
//! - Typed decoding (`decode_as`, `decode_response`) fails with
//!   `Error::Serialization`; callers decide whether that means a bad request
//!   or a contract skew.
//!
//! [`extract_id`] recovers the `id` of a frame that failed to decode so the
//! error can still be correlated by the peer.
//!
//! # Examples
//!
//! ```rust
//! use notifier_core::{codec, JsonRpcRequest, Id};
//!
//! let request = JsonRpcRequest::new("rpc.describe", None, Id::Number(1));
//! let json = codec::encode_request(&request).unwrap();
//!
//! let decoded = codec::decode(&json).unwrap();
//! assert!(decoded.is_request());
//! ```

use crate::error::{Error, JsonRpcErrorData, Result};
use crate::types::{Id, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
use serde::{Deserialize, Serialize};

/// Encode any serializable message to a JSON string
///
/// # Errors
///
/// Returns `Error::Serialization` if the value cannot be represented as JSON
/// (for example a map with non-string keys).
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a text frame into a JSON-RPC message
///
/// Arrays are rejected: notifier never batches, so a JSON array is as
/// meaningless as invalid JSON.
///
/// # Errors
///
/// `Error::JsonRpc` carrying a `-32700` parse error.
///
/// # Examples
///
/// ```rust
/// use notifier_core::codec;
///
/// assert!(codec::decode(r#"{"jsonrpc":"2.0","method":"m"}"#).unwrap().is_notification());
/// assert!(codec::decode("not json").is_err());
/// ```
pub fn decode(data: &str) -> Result<JsonRpcMessage> {
    let parse_error = || Error::JsonRpc(JsonRpcErrorData::parse_error());

    let value: serde_json::Value = serde_json::from_str(data).map_err(|_| parse_error())?;
    let object = value.as_object().ok_or_else(parse_error)?;

    // The envelope's keys decide its kind; a frame with a malformed `method`
    // must not fall through to the response shape.
    let message = if object.contains_key("method") {
        if object.contains_key("id") {
            serde_json::from_value(value).map(JsonRpcMessage::Request)
        } else {
            serde_json::from_value(value).map(JsonRpcMessage::Notification)
        }
    } else if object.contains_key("result") || object.contains_key("error") {
        serde_json::from_value(value).map(JsonRpcMessage::Response)
    } else {
        return Err(parse_error());
    };

    message.map_err(|_| parse_error())
}

/// Decode a JSON string directly into a specific type
///
/// # Errors
///
/// Returns `Error::Serialization` if the JSON doesn't match `T`.
///
/// ```rust
/// use notifier_core::{codec, UserRequest};
///
/// let req: UserRequest = codec::decode_as(r#"{"name":"Ada"}"#).unwrap();
/// assert_eq!(req.name, "Ada");
/// ```
pub fn decode_as<'de, T: Deserialize<'de>>(data: &'de str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a JSON-RPC request
pub fn encode_request(req: &JsonRpcRequest) -> Result<String> {
    encode(req)
}

/// Encode a JSON-RPC response
pub fn encode_response(resp: &JsonRpcResponse) -> Result<String> {
    encode(resp)
}

/// Decode a frame the caller knows to be a response
///
/// An explicit `"result": null` is kept as `Some(Value::Null)` so that
/// methods returning unit are distinguishable from a response that carries
/// no result at all.
///
/// ```rust
/// use notifier_core::codec;
///
/// let resp = codec::decode_response(r#"{"jsonrpc":"2.0","result":null,"id":1}"#).unwrap();
/// assert!(resp.is_well_formed());
/// ```
pub fn decode_response(data: &str) -> Result<JsonRpcResponse> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))?;
    let has_result = value
        .as_object()
        .map_or(false, |object| object.contains_key("result"));

    let mut response: JsonRpcResponse =
        serde_json::from_value(value).map_err(|e| Error::Serialization(e.to_string()))?;
    if has_result && response.result.is_none() {
        response.result = Some(serde_json::Value::Null);
    }
    Ok(response)
}

/// Best-effort recovery of the `id` field from an undecodable frame
///
/// Returns `None` when the text is not a JSON object or the `id` member is
/// missing or not a valid id type.
///
/// ```rust
/// use notifier_core::{codec, Id};
///
/// assert_eq!(codec::extract_id(r#"{"id":7,"jsonrpc":1}"#), Some(Id::Number(7)));
/// assert_eq!(codec::extract_id("{broken"), None);
/// ```
pub fn extract_id(data: &str) -> Option<Id> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    let id = value.as_object()?.get("id")?.clone();
    serde_json::from_value(id).ok()
}
