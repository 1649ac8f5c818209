//! Core building blocks shared by every notifier crate
//!
//! - **contract**: the notification wire contract (`UserRequest`,
//!   `NotificationResponse`, `ServiceDescriptor`, contract fingerprint)
//! - **types** / **codec**: JSON-RPC 2.0 envelopes and their encoding
//! - **error**: the error taxonomy used across the workspace
//! - **config**: environment configuration for the binaries
//! - **observability**: tracing subscriber and OpenTelemetry export
//!
//! The crate is transport-agnostic. `notifier-server` and `notifier-client`
//! carry these envelopes as WebSocket text frames.
//!
//! # Example
//!
//! ```rust
//! use notifier_core::{codec, contract, Id, JsonRpcRequest, UserRequest};
//!
//! let params = serde_json::to_value(UserRequest::new("Ada")).unwrap();
//! let request = JsonRpcRequest::new(contract::RUN_METHOD, Some(params), Id::Number(1));
//!
//! let json = codec::encode_request(&request).unwrap();
//! assert!(codec::decode(&json).unwrap().is_request());
//! ```

pub mod codec;
pub mod config;
pub mod contract;
pub mod error;
pub mod observability;
pub mod types;

pub use config::{GatewayConfig, ServerConfig};
pub use contract::{DescribeResult, NotificationResponse, ServiceDescriptor, UserRequest};
pub use error::{Error, JsonRpcErrorData, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{Id, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
