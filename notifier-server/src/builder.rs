//! Server builder
//!
//! Fluent configuration for an [`RpcServer`]:
//! - the bind address
//! - the registration table (`handler`, `service`)
//! - the drain timeout used by `ServerHandle::stop`
//! - optional OpenTelemetry metrics
//!
//! `build()` binds the listener, so a busy or forbidden address surfaces as
//! `Error::Bind` before anything is served.
//!
//! # Examples
//!
//! ```rust,no_run
//! use notifier_server::{NotificationService, RpcServer};
//! use std::time::Duration;
//!
//! # async fn example() -> notifier_core::Result<()> {
//! let handle = RpcServer::builder()
//!     .bind_str("127.0.0.1:50051")?
//!     .service(NotificationService::new())
//!     .drain_timeout(Duration::from_secs(5))
//!     .start()
//!     .await?;
//!
//! let report = handle.stop().await;
//! # Ok(())
//! # }
//! ```

use crate::{Handler, NotificationService, RpcServer, Router, ServerHandle, ServerMetrics};
use notifier_core::config::DEFAULT_DRAIN_TIMEOUT;
use notifier_core::contract::RUN_METHOD;
use notifier_core::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Builder for [`RpcServer`]
pub struct ServerBuilder {
    addr: Option<SocketAddr>,
    router: Router,
    drain_timeout: Duration,
    metrics: bool,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            addr: None,
            router: Router::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            metrics: false,
        }
    }

    /// Set the listen address
    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Set the listen address from a string
    ///
    /// # Errors
    ///
    /// `Error::Config` if `addr` is not a socket address.
    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address {:?}: {}", addr, e)))?;
        self.addr = Some(addr);
        Ok(self)
    }

    /// Register a handler for a wire method
    pub fn handler(mut self, method: impl Into<String>, handler: Box<dyn Handler>) -> Self {
        self.router.register(method, handler);
        self
    }

    /// Register the notification service under `NotificationService.run`
    pub fn service(self, service: NotificationService) -> Self {
        self.handler(RUN_METHOD, service.into_handler())
    }

    /// Replace the registration table wholesale
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// How long `stop()` waits for in-flight calls before abandoning them
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Record `ServerMetrics` on the global meter provider
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    /// Bind the listener and produce a server ready to start
    ///
    /// `rpc.describe` is added to the registration table here, after every
    /// other method, so its method list is complete.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if no address was set
    /// - `Error::Bind` if the address cannot be bound
    pub async fn build(self) -> Result<RpcServer> {
        let addr = self
            .addr
            .ok_or_else(|| Error::Config("No bind address specified".to_string()))?;

        let listener = TcpListener::bind(addr).await.map_err(|e| Error::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        let local_addr = listener.local_addr().map_err(|e| Error::Io(e.to_string()))?;
        let router = self.router.with_describe();

        tracing::info!(
            addr = %local_addr,
            methods = ?router.methods(),
            "Server listening"
        );

        Ok(RpcServer {
            listener,
            local_addr,
            router,
            drain_timeout: self.drain_timeout,
            metrics: self.metrics.then(|| Arc::new(ServerMetrics::new())),
        })
    }

    /// Build and start in one step
    pub async fn start(self) -> Result<ServerHandle> {
        Ok(self.build().await?.start())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
