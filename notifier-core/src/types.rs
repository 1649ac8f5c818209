//! JSON-RPC 2.0 envelope types
//!
//! Every frame exchanged between the notifier client and server is one of
//! these envelopes, serialized as a single WebSocket text message.
//!
//! # Message Types
//!
//! 1. **Request**: a call that expects exactly one response, correlated by `id`
//! 2. **Notification**: a call without `id`; the server never answers it
//! 3. **Response**: the outcome of a request, carrying `result` or `error`
//!
//! Batches are not part of the notifier wire: one request produces one
//! response, always.
//!
//! # Request IDs
//!
//! The client allocates numeric ids from a per-channel counter. Strings and
//! `null` are still accepted on decode so that responses to malformed frames
//! (which carry `null`) can be represented.

use crate::error::JsonRpcErrorData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version string carried in every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request ID
///
/// Serialized untagged, so `Id::Number(7)` is written as `7` and
/// `Id::Null` as `null`. `Hash + Eq` make it usable as a pending-map key.
///
/// # Examples
///
/// ```rust
/// use notifier_core::Id;
///
/// let id: Id = 42i64.into();
/// assert_eq!(id.to_string(), "42");
///
/// let named: Id = "call-1".into();
/// assert_eq!(named.to_string(), "\"call-1\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier
    String(String),
    /// Numeric identifier, used by the notifier client
    Number(i64),
    /// Null identifier, used when the request id could not be recovered
    Null,
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

impl From<u64> for Id {
    // Client counters start at 1 and never approach i64::MAX.
    fn from(n: u64) -> Self {
        Id::Number(n as i64)
    }
}

/// JSON-RPC 2.0 request message
///
/// # Examples
///
/// ```rust
/// use notifier_core::{JsonRpcRequest, Id};
/// use serde_json::json;
///
/// let req = JsonRpcRequest::new(
///     "NotificationService.run",
///     Some(json!({"name": "Ada"})),
///     Id::Number(1),
/// );
/// assert_eq!(req.jsonrpc, "2.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Wire method name, e.g. `NotificationService.run`
    pub method: String,
    /// Method parameters, omitted from the frame when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Correlation id echoed back in the response
    pub id: Id,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request
    ///
    /// # Arguments
    ///
    /// * `method` - Wire method name
    /// * `params` - Optional parameters
    /// * `id` - Correlation id
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 notification message
///
/// A request without an `id`. The server dispatches it to the registered
/// handler and discards the outcome; no response frame is ever written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Wire method name
    pub method: String,
    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC 2.0 notification
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message
///
/// Carries exactly one of `result` or `error`. The factory methods enforce
/// this on construction; [`JsonRpcResponse::is_well_formed`] checks it on
/// frames received from the wire.
///
/// # Examples
///
/// ```rust
/// use notifier_core::{JsonRpcResponse, JsonRpcErrorData, Id};
/// use serde_json::json;
///
/// let ok = JsonRpcResponse::success(json!({"id": 1}), Id::Number(3));
/// assert!(ok.is_success());
///
/// let failed = JsonRpcResponse::error(JsonRpcErrorData::parse_error(), Id::Null);
/// assert!(failed.is_error());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method result on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error object on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorData>,
    /// Id of the request being answered, `null` when it could not be read
    pub id: Id,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(result: serde_json::Value, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(error: JsonRpcErrorData, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Returns true if `result` is present
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    /// Returns true if `error` is present
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Exactly one of `result` and `error` is set, and the version is "2.0"
    pub fn is_well_formed(&self) -> bool {
        self.jsonrpc == JSONRPC_VERSION && (self.result.is_some() != self.error.is_some())
    }
}

/// Any JSON-RPC 2.0 message that can appear on the notifier wire
///
/// Deserialized untagged, trying the variants in declaration order: a frame
/// with `method` and `id` is a request, `method` without `id` is a
/// notification, anything else with an `id` is a response.
///
/// Untagged matching alone is lenient about malformed requests;
/// [`codec::decode`](crate::codec::decode) picks the variant from the
/// envelope's keys first and reports a parse error instead.
///
/// ```rust
/// use notifier_core::{codec, JsonRpcMessage};
///
/// let msg = codec::decode(r#"{"jsonrpc":"2.0","method":"rpc.describe","id":1}"#).unwrap();
/// assert!(matches!(msg, JsonRpcMessage::Request(_)));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// A request message (expects a response)
    Request(JsonRpcRequest),
    /// A notification message (no response expected)
    Notification(JsonRpcNotification),
    /// A response message
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(_))
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, JsonRpcMessage::Response(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_display() {
        assert_eq!(Id::String("test".to_string()).to_string(), "\"test\"");
        assert_eq!(Id::Number(42).to_string(), "42");
        assert_eq!(Id::Null.to_string(), "null");
    }

    #[test]
    fn test_null_id_serializes_as_null() {
        let resp = JsonRpcResponse::error(JsonRpcErrorData::parse_error(), Id::Null);
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value["id"].is_null());
        assert_eq!(value["error"]["code"], -32700);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_request_serialization_omits_missing_params() {
        let req = JsonRpcRequest::new("rpc.describe", None, Id::Number(1));
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"method\":\"rpc.describe\""));
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_notification_has_no_id() {
        let notif = JsonRpcNotification::new("NotificationService.run", Some(json!({"name": "x"})));
        let json = serde_json::to_string(&notif).unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_response_well_formed() {
        let ok = JsonRpcResponse::success(json!({}), Id::Number(1));
        assert!(ok.is_well_formed());

        let mut both = ok.clone();
        both.error = Some(JsonRpcErrorData::internal_error("x"));
        assert!(!both.is_well_formed());

        let neither: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1})).unwrap();
        assert!(!neither.is_well_formed());

        let mut wrong_version = JsonRpcResponse::success(json!(1), Id::Number(1));
        wrong_version.jsonrpc = "1.0".into();
        assert!(!wrong_version.is_well_formed());
    }

    #[test]
    fn test_message_variant_detection() {
        let request: JsonRpcMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "m", "id": 1})).unwrap();
        assert!(request.is_request());

        let notification: JsonRpcMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "m"})).unwrap();
        assert!(notification.is_notification());

        let response: JsonRpcMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "result": 5, "id": 1})).unwrap();
        assert!(response.is_response());
    }
}
