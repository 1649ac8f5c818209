//! Notification server
//!
//! Serves `NotificationService.run` over WebSocket JSON-RPC until Ctrl-C or
//! SIGTERM, then drains in-flight calls.
//!
//! # Configuration
//!
//! - `NOTIFIER_LISTEN_ADDR` (required), e.g. `127.0.0.1:50051`
//! - `NOTIFIER_DRAIN_TIMEOUT_MS` (default 5000)
//! - `RUST_LOG` log filter, `OTEL_EXPORTER_OTLP_ENDPOINT` enables OTLP export
//!
//! Exits non-zero when the configuration is missing or malformed, or when
//! the listen address cannot be bound.
//!
//! ```bash
//! NOTIFIER_LISTEN_ADDR=127.0.0.1:50051 cargo run --bin notification-server
//! ```

use anyhow::Context;
use notifier::core::{init_observability, shutdown_observability, ObservabilityConfig, ServerConfig};
use notifier::{NotificationService, RpcServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let observability = ObservabilityConfig::from_env("notification-server")
        .with_version(env!("CARGO_PKG_VERSION"));
    let export = observability.export_enabled();
    init_observability(observability).map_err(|e| anyhow::anyhow!(e))?;

    let result = run(export).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Server exited with an error");
    }

    shutdown_observability();
    result
}

async fn run(metrics: bool) -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("invalid server configuration")?;

    let mut builder = RpcServer::builder()
        .bind(config.listen_addr)
        .drain_timeout(config.drain_timeout)
        .service(NotificationService::new());
    if metrics {
        builder = builder.with_metrics();
    }

    let handle = builder
        .start()
        .await
        .with_context(|| format!("cannot serve on {}", config.listen_addr))?;

    tracing::info!(
        addr = %handle.local_addr(),
        drain_timeout_ms = config.drain_timeout.as_millis() as u64,
        "Notification server ready"
    );

    notifier::shutdown_signal().await;

    let report = handle.stop().await;
    tracing::info!(
        completed = report.completed,
        abandoned = report.abandoned,
        "Notification server stopped"
    );
    Ok(())
}
