//! The notification wire contract
//!
//! Shared by client and server so both sides agree on:
//!
//! - the message shapes ([`UserRequest`], [`NotificationResponse`])
//! - the wire method name (`NotificationService.run`)
//! - the static [`ServiceDescriptor`]
//! - a contract [`fingerprint`] used to detect mismatched builds
//!
//! # Wire Encoding
//!
//! ```text
//! --> {"jsonrpc":"2.0","method":"NotificationService.run","params":{"name":"Ada"},"id":1}
//! <-- {"jsonrpc":"2.0","result":{"id":1,"message":"Hello, Ada","timestamp":"2026-01-01T12:00:00.000Z"},"id":1}
//! ```
//!
//! The server also answers `rpc.describe` with a [`DescribeResult`], which
//! lets a client confirm it was built against the same contract.

use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Package namespace of the notification service
pub const PACKAGE: &str = "interface";

/// Service name
pub const SERVICE: &str = "NotificationService";

/// Method name within the service
pub const METHOD: &str = "run";

/// Fully qualified wire method, `<service>.<method>`
pub const RUN_METHOD: &str = "NotificationService.run";

/// Built-in method returning the server's contract identity
pub const DESCRIBE_METHOD: &str = "rpc.describe";

/// Fixed `id` of every greeting response
pub const NOTIFICATION_ID: i64 = 1;

/// Input to `NotificationService.run`
///
/// `name` is required. A params object without it fails to decode, which
/// the server reports as invalid params.
///
/// ```rust
/// use notifier_core::UserRequest;
///
/// let req = UserRequest::new("Ada");
/// assert_eq!(serde_json::to_value(&req).unwrap()["name"], "Ada");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRequest {
    pub name: String,
}

impl UserRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Output of `NotificationService.run`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResponse {
    /// Always [`NOTIFICATION_ID`]
    pub id: i64,
    /// `"Hello, " + name`
    pub message: String,
    /// Creation time, RFC 3339 in UTC with nanosecond precision
    pub timestamp: String,
}

impl NotificationResponse {
    /// Build the greeting for `request` stamped at `now`
    ///
    /// ```rust
    /// use notifier_core::{NotificationResponse, UserRequest};
    ///
    /// let resp = NotificationResponse::greeting(&UserRequest::new("Ada"), chrono::Utc::now());
    /// assert_eq!(resp.id, 1);
    /// assert_eq!(resp.message, "Hello, Ada");
    /// ```
    pub fn greeting(request: &UserRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: NOTIFICATION_ID,
            message: format!("Hello, {}", request.name),
            timestamp: format_timestamp(now),
        }
    }

    /// Parse `timestamp` back into a point in time
    pub fn parsed_timestamp(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Format a timestamp the way it travels on the wire
///
/// Full precision, so the parsed value orders exactly like the clock reading
/// it came from.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a wire timestamp
///
/// # Errors
///
/// `Error::InvalidResponse` when the text is not RFC 3339.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidResponse(format!("timestamp {:?}: {}", text, e)))
}

/// Static metadata identifying where and what the service is
///
/// Loaded once at process start and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub package: String,
    pub service: String,
    pub method: String,
    /// Address the server listens on or the client targets
    pub endpoint: String,
}

impl ServiceDescriptor {
    /// Descriptor of the notification service at `endpoint`
    pub fn notification(endpoint: impl Into<String>) -> Self {
        Self {
            package: PACKAGE.to_string(),
            service: SERVICE.to_string(),
            method: METHOD.to_string(),
            endpoint: endpoint.into(),
        }
    }

    /// `<package>.<service>`, e.g. `interface.NotificationService`
    pub fn qualified_service(&self) -> String {
        format!("{}.{}", self.package, self.service)
    }

    /// Method name as it appears in JSON-RPC frames
    pub fn wire_method(&self) -> String {
        format!("{}.{}", self.service, self.method)
    }
}

/// Result of the built-in `rpc.describe` method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeResult {
    /// Qualified service name
    pub service: String,
    /// Primary wire method
    pub method: String,
    /// Contract fingerprint of the server build
    pub fingerprint: String,
    /// Every method in the server's registration table, sorted
    pub methods: Vec<String>,
}

impl DescribeResult {
    /// Describe the notification contract with the given registered methods
    pub fn notification(mut methods: Vec<String>) -> Self {
        methods.sort();
        methods.dedup();
        Self {
            service: format!("{}.{}", PACKAGE, SERVICE),
            method: RUN_METHOD.to_string(),
            fingerprint: fingerprint(),
            methods,
        }
    }

    /// Check this (remote) description against the local build
    ///
    /// # Errors
    ///
    /// `Error::Config` when the fingerprints differ or the remote table
    /// lacks the `run` method.
    pub fn ensure_compatible(&self) -> Result<()> {
        let local = fingerprint();
        if self.fingerprint != local {
            return Err(Error::Config(format!(
                "contract mismatch: server {} speaks {:?}, client expects {:?}",
                self.service, self.fingerprint, local
            )));
        }
        if !self.methods.iter().any(|m| m == RUN_METHOD) {
            return Err(Error::Config(format!(
                "contract mismatch: server {} does not register {}",
                self.service, RUN_METHOD
            )));
        }
        Ok(())
    }
}

// Field lists in wire order: (name, type).
const USER_REQUEST_FIELDS: &[(&str, &str)] = &[("name", "string")];
const NOTIFICATION_RESPONSE_FIELDS: &[(&str, &str)] =
    &[("id", "int64"), ("message", "string"), ("timestamp", "string")];

/// Contract fingerprint of this build
///
/// A canonical signature of the method and the field names/types of both
/// messages. Any change to the contract changes the string.
///
/// ```rust
/// let fp = notifier_core::contract::fingerprint();
/// assert!(fp.starts_with("interface.NotificationService/run("));
/// ```
pub fn fingerprint() -> String {
    fn fields(list: &[(&str, &str)]) -> String {
        list.iter()
            .map(|(name, ty)| format!("{}:{}", name, ty))
            .collect::<Vec<_>>()
            .join(",")
    }

    format!(
        "{}.{}/{}(UserRequest{{{}}})->NotificationResponse{{{}}}",
        PACKAGE,
        SERVICE,
        METHOD,
        fields(USER_REQUEST_FIELDS),
        fields(NOTIFICATION_RESPONSE_FIELDS)
    )
}
