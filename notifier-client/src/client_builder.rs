//! Client builder
//!
//! ```rust,no_run
//! use notifier_client::ClientBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> notifier_core::Result<()> {
//! // Lazy: no I/O until the first call
//! let client = ClientBuilder::new("ws://127.0.0.1:50051")
//!     .connect_timeout(Duration::from_secs(1))
//!     .call_timeout(Duration::from_secs(5))
//!     .build();
//!
//! // Eager: fail fast if the server is unreachable
//! let client2 = ClientBuilder::new("ws://127.0.0.1:50051")
//!     .with_metrics()
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::{ClientMetrics, RpcClient};
use notifier_core::config::{DEFAULT_CALL_TIMEOUT, DEFAULT_CONNECT_TIMEOUT};
use notifier_core::{GatewayConfig, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`RpcClient`]
pub struct ClientBuilder {
    url: String,
    connect_timeout: Duration,
    call_timeout: Duration,
    metrics: bool,
}

impl ClientBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            metrics: false,
        }
    }

    /// Builder preloaded with the target and timeouts of a gateway config
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.target_url.clone())
            .connect_timeout(config.connect_timeout)
            .call_timeout(config.call_timeout)
    }

    /// Deadline for the channel to become Ready (default 3 s)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Deadline for a response once a call is issued (default 10 s)
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Record OpenTelemetry metrics through the global meter provider
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    /// Build an idle client; the channel opens on the first call
    pub fn build(self) -> RpcClient {
        let metrics = self.metrics.then(|| Arc::new(ClientMetrics::new()));
        RpcClient::new(self.url, self.connect_timeout, self.call_timeout, metrics)
    }

    /// Build and open the channel immediately
    pub async fn connect(self) -> Result<RpcClient> {
        let client = self.build();
        client.connect().await?;
        Ok(client)
    }
}
