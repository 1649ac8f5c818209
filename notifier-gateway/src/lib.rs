//! HTTP gateway in front of the notification service
//!
//! A thin boundary adapter: it validates the query, issues one
//! `NotificationService.run` call through a [`NotificationCaller`], and maps
//! the outcome onto an HTTP status.
//!
//! ```rust,no_run
//! use notifier_client::{ClientBuilder, NotificationClient};
//! use notifier_gateway::{bind, Gateway};
//! use std::sync::Arc;
//!
//! # async fn example() -> notifier_core::Result<()> {
//! let client = NotificationClient::new(ClientBuilder::new("ws://127.0.0.1:50051").build());
//! let gateway = Arc::new(Gateway::new(client));
//!
//! let (addr, server) = bind("127.0.0.1:3000".parse().unwrap(), gateway, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })?;
//! println!("gateway on http://{}", addr);
//! server.await;
//! # Ok(())
//! # }
//! ```

mod gateway;
mod routes;

pub use gateway::{Gateway, GatewayError, NotificationCaller, NotificationQuery};
pub use routes::{notification, ping, routes};

use notifier_core::{Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// Bind the HTTP listener and return the server future
///
/// The future resolves once `shutdown` fires and open requests finish.
///
/// # Errors
///
/// `Error::Bind` if `addr` cannot be bound.
pub fn bind(
    addr: SocketAddr,
    gateway: Arc<Gateway>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>)> {
    let (bound, server) = warp::serve(routes(gateway))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| Error::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

    tracing::info!(addr = %bound, "Gateway listening");
    Ok((bound, server))
}
