//! WebSocket JSON-RPC server hosting the notification service
//!
//! # Core Features
//!
//! - **WebSocket Transport**: JSON-RPC 2.0 envelopes as text frames
//! - **Registration Table**: explicit method → handler mapping ([`Router`])
//! - **Concurrent Calls**: every call runs on its own task
//! - **Graceful Drain**: `stop()` finishes in-flight calls up to a deadline
//! - **Observability**: tracing spans per connection and call, optional metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use notifier_server::{NotificationService, RpcServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = RpcServer::builder()
//!         .bind_str("127.0.0.1:50051")?
//!         .service(NotificationService::new())
//!         .start()
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     let report = handle.stop().await;
//!     println!("completed={} abandoned={}", report.completed, report.abandoned);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Accept task**: owns the listener and one task per connection
//! - **Connection tasks**: decode frames, spawn call tasks, write responses
//! - **Call tasks**: run the handler, racing the drain abandon signal
//!
//! Dropping a [`ServerHandle`] without calling `stop()` leaves the server
//! running in the background for the life of the runtime.

mod builder;
mod connection;
mod handler;
mod lifecycle;
mod metrics;
mod notification;
mod router;

pub use builder::ServerBuilder;
pub use connection::{CLOSE_GRACE, HANDSHAKE_TIMEOUT};
pub use handler::{from_fn, from_typed_fn, Handler, HandlerResult};
pub use lifecycle::{DrainReport, ServerState};
pub use metrics::ServerMetrics;
pub use notification::NotificationService;
pub use router::Router;

use connection::CallContext;
use lifecycle::Lifecycle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};

/// A bound, not yet started server
///
/// Produced by [`ServerBuilder::build`]. The listener is already bound, so
/// [`RpcServer::local_addr`] reports the real port even when binding to 0.
pub struct RpcServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
    drain_timeout: Duration,
    metrics: Option<Arc<ServerMetrics>>,
}

impl RpcServer {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The registration table this server will serve
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Spawn the accept loop; the server is **Serving** on return
    pub fn start(self) -> ServerHandle {
        let lifecycle = Lifecycle::new(self.metrics.clone());
        let ctx = CallContext {
            router: self.router,
            lifecycle: Arc::clone(&lifecycle),
            metrics: self.metrics,
        };

        let accept_task = tokio::spawn(accept_loop(self.listener, ctx));

        tracing::info!(addr = %self.local_addr, "Server started");

        ServerHandle {
            lifecycle,
            local_addr: self.local_addr,
            drain_timeout: self.drain_timeout,
            accept_task,
        }
    }
}

#[tracing::instrument(skip(listener, ctx), name = "server.accept")]
async fn accept_loop(listener: TcpListener, ctx: CallContext) {
    let mut connections = JoinSet::new();
    let mut state_rx = ctx.lifecycle.subscribe_state();
    let mut next_conn_id: u64 = 0;

    loop {
        tokio::select! {
            _ = state_rx.wait_for(|state| *state != ServerState::Serving) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let conn_id = next_conn_id;
                    next_conn_id += 1;
                    tracing::info!(conn_id = conn_id, peer = %peer, "New connection accepted");
                    // Calls are multiplexed on one socket; don't hold small frames back.
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::warn!(conn_id = conn_id, error = %e, "Failed to set TCP_NODELAY");
                    }

                    let conn_ctx = ctx.clone();
                    connections.spawn(async move {
                        if let Err(e) = connection::handle_connection(stream, conn_id, conn_ctx).await {
                            tracing::warn!(conn_id = conn_id, error = %e, "Connection error");
                        }
                    });
                    if let Some(m) = &ctx.metrics {
                        m.record_connection(connections.len() as i64);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    if let Some(m) = &ctx.metrics {
                        m.record_error("accept");
                    }
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {
                if let Some(m) = &ctx.metrics {
                    m.record_disconnection(connections.len() as i64);
                }
            }
        }
    }

    drop(listener);
    tracing::info!(open = connections.len(), "Listener closed, waiting for connections");

    while connections.join_next().await.is_some() {}
}

/// Control handle of a started server
pub struct ServerHandle {
    lifecycle: Arc<Lifecycle>,
    local_addr: SocketAddr,
    drain_timeout: Duration,
    accept_task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receiver that observes every state transition, including those made
    /// by a `stop()` running on another task
    pub fn watch_state(&self) -> tokio::sync::watch::Receiver<ServerState> {
        self.lifecycle.subscribe_state()
    }

    /// Number of calls currently executing
    pub fn in_flight(&self) -> usize {
        self.lifecycle.in_flight()
    }

    /// Stop gracefully: **Serving → Draining → Stopped**
    ///
    /// The listener stops accepting and connections stop reading. In-flight
    /// calls get `drain_timeout` to finish; the rest are abandoned and
    /// answered with `-32001 Call cancelled`. Connections then get
    /// [`CLOSE_GRACE`] to flush and close before they are aborted, so a peer
    /// that stalls mid-handshake or stops reading cannot hold `stop` open.
    #[tracing::instrument(skip(self), fields(addr = %self.local_addr))]
    pub async fn stop(mut self) -> DrainReport {
        let pending = self.lifecycle.in_flight();
        tracing::info!(in_flight = pending, "Draining server");
        self.lifecycle.begin_drain();

        if tokio::time::timeout(self.drain_timeout, self.lifecycle.wait_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.lifecycle.in_flight(),
                timeout_ms = self.drain_timeout.as_millis() as u64,
                "Drain deadline reached, abandoning calls"
            );
            self.lifecycle.abandon_remaining();
            self.lifecycle.wait_idle().await;
        }

        match tokio::time::timeout(CLOSE_GRACE, &mut self.accept_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Accept task failed"),
            Err(_) => {
                tracing::warn!(
                    grace_ms = CLOSE_GRACE.as_millis() as u64,
                    "Connections did not close in time, aborting them"
                );
                // Dropping the accept loop's JoinSet aborts every connection task.
                self.accept_task.abort();
                let _ = (&mut self.accept_task).await;
            }
        }

        let report = self.lifecycle.finish();
        tracing::info!(
            completed = report.completed,
            abandoned = report.abandoned,
            "Server stopped"
        );
        report
    }
}
