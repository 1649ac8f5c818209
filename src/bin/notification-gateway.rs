//! Notification gateway
//!
//! Serves `GET /` and `GET /notification?name=<s>` over HTTP and forwards
//! each notification request as one RPC call to the notification server.
//!
//! # Configuration
//!
//! - `NOTIFIER_TARGET_URL` (required), e.g. `ws://127.0.0.1:50051`
//! - `GATEWAY_LISTEN_ADDR` (default `127.0.0.1:3000`)
//! - `NOTIFIER_CONNECT_TIMEOUT_MS` (default 3000)
//! - `NOTIFIER_CALL_TIMEOUT_MS` (default 10000)
//! - `RUST_LOG` log filter, `OTEL_EXPORTER_OTLP_ENDPOINT` enables OTLP export
//!
//! At startup the gateway asks the server to describe its contract and
//! exits non-zero if it does not match this build. An unreachable server
//! only produces a warning; requests then answer 503 until it comes up.

use anyhow::Context;
use notifier::core::{
    init_observability, shutdown_observability, Error, GatewayConfig, ObservabilityConfig,
};
use notifier::{ClientBuilder, Gateway, NotificationClient};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let observability = ObservabilityConfig::from_env("notification-gateway")
        .with_version(env!("CARGO_PKG_VERSION"));
    let export = observability.export_enabled();
    init_observability(observability).map_err(|e| anyhow::anyhow!(e))?;

    let result = run(export).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Gateway exited with an error");
    }

    shutdown_observability();
    result
}

async fn run(metrics: bool) -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("invalid gateway configuration")?;

    let mut builder = ClientBuilder::from_config(&config);
    if metrics {
        builder = builder.with_metrics();
    }
    let notifications = NotificationClient::new(builder.build());

    match notifications.verify().await {
        Ok(described) => tracing::info!(
            service = %described.service,
            methods = ?described.methods,
            "Contract check passed"
        ),
        Err(Error::Unavailable(reason)) => tracing::warn!(
            target_url = %config.target_url,
            reason = %reason,
            "Server unreachable, contract check skipped"
        ),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("contract check against {} failed", config.target_url))
        }
    }

    let gateway = Arc::new(Gateway::new(notifications.clone()));
    let (addr, server) =
        notifier::gateway::bind(config.listen_addr, gateway, notifier::shutdown_signal())
            .context("cannot start the HTTP listener")?;

    tracing::info!(addr = %addr, target_url = %config.target_url, "Notification gateway ready");
    server.await;

    notifications.client().close().await;
    tracing::info!("Notification gateway stopped");
    Ok(())
}
