//! Handler trait and adapters for registered methods
//!
//! Every entry in the server's registration table is a [`Handler`]: a
//! type-erased async function from optional JSON params to a JSON result.
//!
//! # Creating Handlers
//!
//! 1. **from_fn**: wrap an async closure over raw `serde_json::Value`
//! 2. **from_typed_fn**: wrap an async closure over serde types; params that
//!    fail to decode become `Error::InvalidParams` (wire code -32602)
//!
//! Handlers must not keep per-call state: the server runs every call on its
//! own task, so one handler can be executing many calls at once.
//!
//! # Examples
//!
//! ```rust
//! use notifier_server::{from_fn, from_typed_fn};
//! use notifier_core::{NotificationResponse, UserRequest};
//!
//! let ping = from_fn(|_params| async move { Ok(serde_json::json!("pong")) });
//!
//! let greet = from_typed_fn(|req: UserRequest| async move {
//!     Ok(NotificationResponse::greeting(&req, chrono::Utc::now()))
//! });
//! ```

use notifier_core::{Error, Result};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by every handler
///
/// Boxing gives all handlers one concrete type so they can live in the
/// same table.
pub type HandlerResult = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A method implementation stored in the registration table
///
/// Errors are converted into wire errors by the connection task:
/// - `Error::InvalidParams` / `Error::CallerInput` → -32602
/// - `Error::MethodNotFound` → -32601
/// - anything else → -32603
pub trait Handler: Send + Sync {
    /// Run the method with the request's params (`None` when absent)
    fn handle(&self, params: Option<Value>) -> HandlerResult;
}

/// Adapter from an async closure to [`Handler`]
pub struct AsyncHandler<F, Fut>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    func: F,
}

impl<F, Fut> AsyncHandler<F, Fut>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Handler for AsyncHandler<F, Fut>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn handle(&self, params: Option<Value>) -> HandlerResult {
        Box::pin((self.func)(params))
    }
}

/// Create a handler from an async function over raw JSON
///
/// # Examples
///
/// ```rust
/// use notifier_server::from_fn;
///
/// let echo = from_fn(|params| async move { Ok(params.unwrap_or_default()) });
/// ```
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Box::new(AsyncHandler::new(func))
}

/// Create a handler from an async function over serde types
///
/// Absent params are decoded from `null`, which only succeeds for types
/// that accept it (`()`, `Option<_>`).
///
/// # Error Handling
///
/// - params that do not decode into `P` → `Error::InvalidParams`
/// - a result that cannot be serialized → `Error::Serialization`
/// - errors from `func` pass through unchanged
pub fn from_typed_fn<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: serde::de::DeserializeOwned + Send + 'static,
    R: serde::Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let func = Arc::new(func);

    from_fn(move |params: Option<Value>| {
        let func = Arc::clone(&func);
        async move {
            let params: P = serde_json::from_value(params.unwrap_or(Value::Null))
                .map_err(|e| Error::InvalidParams(e.to_string()))?;

            let result = func(params).await?;

            serde_json::to_value(result).map_err(|e| Error::Serialization(e.to_string()))
        }
    })
}
