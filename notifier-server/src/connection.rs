//! Per-connection and per-call tasks
//!
//! # Task Model
//!
//! Each accepted connection runs:
//! - a **read loop** that decodes frames and spawns one task per call
//! - a **send task** that writes encoded responses from an mpsc channel
//!
//! Calls never block the read loop, so a slow handler does not delay other
//! calls multiplexed on the same connection. Responses are written in
//! completion order; the client matches them by id.
//!
//! # Malformed Frames
//!
//! Frames that fail to decode are answered with `-32700 Parse error`,
//! using the id recovered from the raw text when there is one and `null`
//! otherwise. The connection stays open.
//!
//! # Draining
//!
//! When the server leaves `Serving`, the read loop stops taking new frames,
//! waits for the connection's own calls to be answered, and then closes the
//! WebSocket. A peer still in the handshake is dropped at once. A peer that
//! stops reading can stall the send task; [`ServerHandle::stop`] aborts such
//! connections after [`CLOSE_GRACE`].
//!
//! [`ServerHandle::stop`]: crate::ServerHandle::stop

use crate::lifecycle::{CallGuard, Lifecycle, ServerState};
use crate::metrics::ServerMetrics;
use crate::router::Router;
use futures::{SinkExt, StreamExt};
use notifier_core::{
    codec, Error, Id, JsonRpcErrorData, JsonRpcMessage, JsonRpcResponse, Result,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::{accept_async, tungstenite::Message};

type Outgoing = mpsc::UnboundedSender<Message>;

/// Longest a peer may take to complete the WebSocket handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long connections get to flush and close once calls have drained
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Everything a call task needs, cheap to clone
#[derive(Clone)]
pub(crate) struct CallContext {
    pub(crate) router: Router,
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) metrics: Option<Arc<ServerMetrics>>,
}

/// Serve one TCP connection until the peer leaves or the server drains
#[tracing::instrument(skip(stream, ctx), fields(conn_id = conn_id))]
pub(crate) async fn handle_connection(
    stream: TcpStream,
    conn_id: u64,
    ctx: CallContext,
) -> Result<()> {
    let mut state_rx = ctx.lifecycle.subscribe_state();

    let ws_stream = tokio::select! {
        _ = state_rx.wait_for(|state| *state != ServerState::Serving) => {
            tracing::debug!("Server draining, dropping connection before handshake");
            return Ok(());
        }
        accepted = tokio::time::timeout(HANDSHAKE_TIMEOUT, accept_async(stream)) => match accepted {
            Ok(ws_stream) => ws_stream.map_err(|e| Error::WebSocket(e.to_string()))?,
            Err(_) => return Err(Error::WebSocket("handshake timed out".to_string())),
        },
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Held in a JoinSet so aborting this connection also aborts the writer.
    let mut writer = JoinSet::new();
    writer.spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                tracing::warn!(error = %e, "Error sending frame");
                return;
            }
        }
        // Channel closed: every call on this connection has been answered.
        let _ = ws_sender.close().await;
    });

    let mut calls = JoinSet::new();

    loop {
        tokio::select! {
            _ = state_rx.wait_for(|state| *state != ServerState::Serving) => {
                tracing::debug!("Server draining, no longer reading calls");
                break;
            }
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(&text, &ctx, &tx, &mut calls),
                Some(Ok(Message::Binary(_))) => {
                    reply_parse_error(Id::Null, &tx, &ctx.metrics);
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Connection closed by client");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket error");
                    if let Some(m) = &ctx.metrics {
                        m.record_error("websocket");
                    }
                    break;
                }
            },
            Some(joined) = calls.join_next(), if !calls.is_empty() => {
                log_join_error(joined);
            }
        }
    }

    while let Some(joined) = calls.join_next().await {
        log_join_error(joined);
    }

    drop(tx);
    if let Some(Err(e)) = writer.join_next().await {
        tracing::error!(error = %e, "Send task failed");
    }

    tracing::info!("Connection finished");
    Ok(())
}

fn log_join_error(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Call task failed");
    }
}

/// Decode one text frame and start the call it carries
fn dispatch(text: &str, ctx: &CallContext, tx: &Outgoing, calls: &mut JoinSet<()>) {
    let message = match codec::decode(text) {
        Ok(message) => message,
        Err(e) => {
            let id = codec::extract_id(text).unwrap_or(Id::Null);
            tracing::debug!(error = %e, id = %id, "Undecodable frame");
            reply_parse_error(id, tx, &ctx.metrics);
            return;
        }
    };

    match message {
        JsonRpcMessage::Request(request) => {
            let guard = ctx.lifecycle.begin_call();
            calls.spawn(run_call(
                ctx.clone(),
                request.method,
                request.params,
                Some(request.id),
                tx.clone(),
                guard,
            ));
        }
        JsonRpcMessage::Notification(notification) => {
            let guard = ctx.lifecycle.begin_call();
            calls.spawn(run_call(
                ctx.clone(),
                notification.method,
                notification.params,
                None,
                tx.clone(),
                guard,
            ));
        }
        JsonRpcMessage::Response(response) => {
            tracing::warn!(id = %response.id, "Ignoring response frame sent to server");
        }
    }
}

fn reply_parse_error(id: Id, tx: &Outgoing, metrics: &Option<Arc<ServerMetrics>>) {
    if let Some(m) = metrics {
        m.record_error("parse_error");
    }
    send_response(&JsonRpcResponse::error(JsonRpcErrorData::parse_error(), id), tx);
}

fn send_response(response: &JsonRpcResponse, tx: &Outgoing) {
    match codec::encode_response(response) {
        Ok(text) => {
            if tx.send(Message::Text(text)).is_err() {
                tracing::debug!(id = %response.id, "Connection gone before response was sent");
            }
        }
        Err(e) => tracing::error!(error = %e, id = %response.id, "Failed to encode response"),
    }
}

/// Execute one call and answer it unless it is a notification
///
/// `id` is `None` for notifications. The handler races the abandon signal;
/// if the server gives up first the handler future is dropped and the
/// caller receives `-32001`.
#[tracing::instrument(skip(ctx, params, tx, guard), fields(method = %method))]
async fn run_call(
    ctx: CallContext,
    method: String,
    params: Option<serde_json::Value>,
    id: Option<Id>,
    tx: Outgoing,
    mut guard: CallGuard,
) {
    let start = Instant::now();

    let outcome = tokio::select! {
        biased;
        result = ctx.router.route(&method, params) => Some(result),
        _ = guard.abandoned() => None,
    };

    let (error, status) = match outcome {
        Some(Ok(result)) => {
            if let Some(id) = &id {
                send_response(&JsonRpcResponse::success(result, id.clone()), &tx);
            }
            guard.completed();
            (None, "success")
        }
        Some(Err(e)) => {
            tracing::debug!(error = %e, "Call failed");
            let data = e.to_error_data();
            if let Some(id) = &id {
                send_response(&JsonRpcResponse::error(data.clone(), id.clone()), &tx);
            }
            guard.completed();
            (Some(data.code), "error")
        }
        None => {
            tracing::warn!("Call abandoned at drain deadline");
            if let Some(id) = &id {
                let data = JsonRpcErrorData::call_cancelled("Server stopped before the call finished");
                send_response(&JsonRpcResponse::error(data, id.clone()), &tx);
            }
            guard.cancelled();
            (None, "cancelled")
        }
    };

    if let Some(m) = &ctx.metrics {
        m.record_request(&method, status, start.elapsed().as_secs_f64());
        if let Some(code) = error {
            m.record_error(error_type(code));
        }
    }
}

fn error_type(code: i32) -> &'static str {
    match code {
        -32601 => "method_not_found",
        -32602 => "invalid_params",
        -32600 => "invalid_request",
        _ => "internal",
    }
}
