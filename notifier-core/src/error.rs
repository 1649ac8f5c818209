//! Error types for notifier
//!
//! This module defines the two error types shared by every notifier crate:
//!
//! - **Error**: Application-level errors used inside the workspace (uses thiserror)
//! - **JsonRpcErrorData**: Wire-format errors carried in JSON-RPC responses
//!
//! # Error Taxonomy
//!
//! The RPC layer surfaces a small set of typed failures to its callers:
//!
//! - `Bind`: the server cannot acquire its listening socket (fatal)
//! - `Unavailable`: the client cannot reach a ready channel (recoverable)
//! - `Timeout`: a call exceeded its deadline; the channel stays usable
//! - `InvalidResponse`: received bytes do not match the wire contract
//! - `CallerInput`: a malformed external request, never retried
//! - `Cancelled`: the server abandoned the call while draining
//!
//! Transport exceptions never leak past the client: they are folded into one
//! of the variants above before reaching the gateway.
//!
//! # Wire Error Codes
//!
//! JSON-RPC 2.0 reserves:
//! - `-32700`: Parse error (invalid JSON)
//! - `-32600`: Invalid request (missing required fields)
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//!
//! notifier adds one implementation-defined server error:
//! - `-32001`: Call cancelled (abandoned during a server drain)
//!
//! # Examples
//!
//! ```rust
//! use notifier_core::{Error, JsonRpcErrorData};
//!
//! let error = Error::MethodNotFound("unknownMethod".into());
//! assert!(error.to_string().contains("unknownMethod"));
//!
//! let wire = JsonRpcErrorData::method_not_found("unknownMethod");
//! assert_eq!(wire.code, -32601);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for notifier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wire code for a call abandoned by a draining server
pub const CALL_CANCELLED_CODE: i32 = -32001;

/// Application-level error type for notifier operations
///
/// # Error Categories
///
/// - **RPC taxonomy**: Bind, Unavailable, Timeout, InvalidResponse, CallerInput, Cancelled
/// - **Protocol errors**: JsonRpc, InvalidRequest, MethodNotFound, InvalidParams
/// - **Transport errors**: WebSocket, Io, ConnectionClosed
/// - **Processing errors**: Serialization, Internal
/// - **Startup errors**: Config
///
/// The enum is `Clone` so a single failure can be fanned out to every
/// pending call when a channel drops.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// JSON-RPC protocol error received from the remote peer
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    /// The server could not bind its listening address
    ///
    /// Fatal at startup: the process is expected to exit non-zero.
    #[error("Failed to bind {addr}: {reason}")]
    Bind {
        /// Address that was requested
        addr: String,
        /// Underlying OS error
        reason: String,
    },

    /// The client could not reach a ready channel
    ///
    /// Raised when the connect deadline expires, the target refuses the
    /// connection, or the channel drops while a call is pending.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded its deadline
    ///
    /// Per-call only; the underlying channel remains usable.
    #[error("Request timeout")]
    Timeout,

    /// Received bytes could not be decoded against the wire contract
    ///
    /// Usually a configuration or version skew between client and server.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Malformed external request (for example a missing `name`)
    #[error("Invalid caller input: {0}")]
    CallerInput(String),

    /// The server abandoned the call during a graceful drain
    #[error("Call cancelled: {0}")]
    Cancelled(String),

    /// Required configuration is missing, malformed or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Input/output error
    #[error("IO error: {0}")]
    Io(String),

    /// Invalid JSON-RPC request format
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Method not found in the server's registration table
    ///
    /// Maps to JSON-RPC error code -32601.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid method parameters
    ///
    /// Maps to JSON-RPC error code -32602.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Internal error
    ///
    /// Maps to JSON-RPC error code -32603.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Connection was closed
    #[error("Connection closed")]
    ConnectionClosed,
}

impl Error {
    /// Convert a remote error object into the matching typed failure
    ///
    /// A `-32001` response means the server gave up on the call while
    /// draining; everything else stays a plain protocol error.
    pub fn from_remote(data: JsonRpcErrorData) -> Self {
        if data.code == CALL_CANCELLED_CODE {
            Error::Cancelled(data.message)
        } else {
            Error::JsonRpc(data)
        }
    }

    /// Whether the failure is local to one call and leaves the channel usable
    pub fn is_per_call(&self) -> bool {
        matches!(
            self,
            Error::Timeout | Error::InvalidResponse(_) | Error::JsonRpc(_) | Error::Cancelled(_)
        )
    }

    /// Convert a handler-side error into the wire error object sent back to the caller
    pub fn to_error_data(&self) -> JsonRpcErrorData {
        match self {
            Error::JsonRpc(data) => data.clone(),
            Error::MethodNotFound(method) => JsonRpcErrorData::method_not_found(method),
            Error::InvalidParams(msg) | Error::CallerInput(msg) => {
                JsonRpcErrorData::invalid_params(msg.clone())
            }
            Error::InvalidRequest(msg) => JsonRpcErrorData::invalid_request(msg.clone()),
            Error::Cancelled(msg) => JsonRpcErrorData::call_cancelled(msg.clone()),
            other => JsonRpcErrorData::internal_error(other.to_string()),
        }
    }
}

/// JSON-RPC 2.0 error object (`code`, `message`, optional `data`)
///
/// This structure is the exact wire format for errors and appears in the
/// `error` field of a `JsonRpcResponse`.
///
/// # Examples
///
/// ```rust
/// use notifier_core::JsonRpcErrorData;
/// use serde_json::json;
///
/// let error = JsonRpcErrorData::method_not_found("NotificationService.send");
/// assert_eq!(error.code, -32601);
///
/// let custom = JsonRpcErrorData::with_data(
///     -32000,
///     "Upstream rejected the call",
///     json!({"retryable": false})
/// );
/// assert!(custom.data.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code indicating the error type
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Optional additional error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    /// Create a new JSON-RPC error with code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new JSON-RPC error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create a parse error (-32700)
    ///
    /// Per spec: "Invalid JSON was received by the server."
    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    /// Create an invalid request error (-32600)
    ///
    /// Per spec: "The JSON sent is not a valid Request object."
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(-32600, msg)
    }

    /// Create a method not found error (-32601)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use notifier_core::JsonRpcErrorData;
    ///
    /// let error = JsonRpcErrorData::method_not_found("calculateFoo");
    /// assert_eq!(error.message, "Method not found: calculateFoo");
    /// ```
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(-32602, msg)
    }

    /// Create an internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(-32603, msg)
    }

    /// Create a call cancelled error (-32001)
    ///
    /// Sent by a draining server for calls it abandons at the drain deadline.
    pub fn call_cancelled(msg: impl Into<String>) -> Self {
        Self::new(CALL_CANCELLED_CODE, msg)
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    /// Formats as "[code] message", e.g. "[-32601] Method not found: x"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
