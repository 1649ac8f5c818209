//! Explicit method registration table
//!
//! The router maps wire method names to [`Handler`]s. Registration happens
//! while the server is being built; once the server starts, the table is
//! shared read-only between connection tasks (cloning a `Router` clones an
//! `Arc`).
//!
//! # Built-in Methods
//!
//! [`Router::with_describe`] adds `rpc.describe`, which returns the
//! server's contract fingerprint and the full method list. `ServerBuilder`
//! calls it as the last registration step so the list is complete.
//!
//! # Examples
//!
//! ```rust
//! use notifier_server::{from_fn, Router};
//!
//! let mut router = Router::new();
//! router.register("ping", from_fn(|_| async { Ok(serde_json::json!("pong")) }));
//!
//! assert!(router.has_method("ping"));
//! ```

use crate::handler::{from_fn, Handler};
use notifier_core::contract::DESCRIBE_METHOD;
use notifier_core::{DescribeResult, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registration table of wire methods
#[derive(Clone)]
pub struct Router {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(HashMap::new()),
        }
    }

    /// Register a handler, replacing any previous handler for `method`
    pub fn register(&mut self, method: impl Into<String>, handler: Box<dyn Handler>) {
        let method = method.into();
        let handlers = Arc::make_mut(&mut self.handlers);
        if handlers.insert(method.clone(), Arc::from(handler)).is_some() {
            tracing::warn!(method = %method, "Handler replaced");
        }
    }

    /// Get the handler registered for `method`
    pub fn get(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// All registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.handlers.keys().cloned().collect();
        methods.sort();
        methods
    }

    /// Register `rpc.describe` answering with this table's contract identity
    pub fn with_describe(mut self) -> Self {
        let mut methods = self.methods();
        methods.push(DESCRIBE_METHOD.to_string());
        let describe = DescribeResult::notification(methods);

        self.register(
            DESCRIBE_METHOD,
            from_fn(move |_params| {
                let describe = describe.clone();
                async move {
                    serde_json::to_value(describe).map_err(|e| Error::Serialization(e.to_string()))
                }
            }),
        );
        self
    }

    /// Dispatch a call to its handler
    ///
    /// # Errors
    ///
    /// `Error::MethodNotFound` when `method` is not registered; otherwise
    /// whatever the handler returns.
    pub async fn route(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let handler = self
            .get(method)
            .ok_or_else(|| Error::MethodNotFound(method.to_string()))?;

        handler.handle(params).await
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
