//! notifier - a typed notification RPC over WebSocket
//!
//! This is the composition root: it re-exports the workspace crates and
//! hosts the two binaries, `notification-server` and `notification-gateway`.
//!
//! # Architecture
//!
//! - **notifier-core**: wire contract, JSON-RPC envelopes, errors, config,
//!   observability
//! - **notifier-server**: WebSocket JSON-RPC server with graceful drain
//! - **notifier-client**: lazily connected client and typed stub
//! - **notifier-gateway**: HTTP adapter (`GET /notification?name=`)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use notifier::{ClientBuilder, NotificationClient, NotificationService, RpcServer};
//! use notifier::core::UserRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = RpcServer::builder()
//!         .bind_str("127.0.0.1:50051")?
//!         .service(NotificationService::new())
//!         .start()
//!         .await?;
//!
//!     let stub = NotificationClient::new(ClientBuilder::new("ws://127.0.0.1:50051").build());
//!     let response = stub.run(UserRequest::new("Ada")).await?;
//!     println!("{}", response.message);
//!
//!     handle.stop().await;
//!     Ok(())
//! }
//! ```

pub use notifier_client as client;
pub use notifier_core as core;
pub use notifier_gateway as gateway;
pub use notifier_server as server;

pub use notifier_client::{ClientBuilder, NotificationClient, RpcClient};
pub use notifier_gateway::Gateway;
pub use notifier_server::{NotificationService, RpcServer, ServerHandle};

/// Resolve on Ctrl-C, or on SIGTERM where there is one
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
