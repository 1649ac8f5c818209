//! Mock servers for notifier-client integration tests
//!
//! [`MockWsServer`] speaks just enough WebSocket to drive the client: every
//! text frame is handed to a handler on its own task, so slow replies never
//! block fast ones. [`SilentServer`] accepts TCP but never completes the
//! WebSocket handshake, which is how connect deadlines are exercised.

#![allow(dead_code)]

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use notifier_core::contract::{DescribeResult, DESCRIBE_METHOD, RUN_METHOD};
use notifier_core::{NotificationResponse, UserRequest};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// What the mock does with one inbound frame
pub enum Reply {
    Frame(String),
    Nothing,
    /// Drop the connection without answering
    Close,
}

/// Mock WebSocket server for client testing
pub struct MockWsServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    message_rx: mpsc::UnboundedReceiver<String>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl MockWsServer {
    /// Start a mock whose handler receives each frame parsed as JSON
    /// (`Value::Null` if it is not JSON)
    pub async fn with_handler<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Reply> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let (msg_tx, message_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(handler);

        let counter = Arc::clone(&connections);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let handler = Arc::clone(&handler);
                let msg_tx = msg_tx.clone();

                tokio::spawn(async move {
                    let Ok(ws) = accept_async(stream).await else {
                        return;
                    };
                    let (mut write, mut read) = ws.split();
                    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Option<String>>();

                    let writer = tokio::spawn(async move {
                        while let Some(Some(frame)) = out_rx.recv().await {
                            if write.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        let _ = write.close().await;
                    });

                    while let Some(Ok(msg)) = read.next().await {
                        let Message::Text(text) = msg else {
                            continue;
                        };
                        let _ = msg_tx.send(text.clone());
                        let value = serde_json::from_str(&text).unwrap_or(Value::Null);

                        let handler = Arc::clone(&handler);
                        let out_tx = out_tx.clone();
                        tokio::spawn(async move {
                            match (*handler)(value).await {
                                Reply::Frame(frame) => {
                                    let _ = out_tx.send(Some(frame));
                                }
                                Reply::Nothing => {}
                                Reply::Close => {
                                    let _ = out_tx.send(None);
                                }
                            }
                        });
                    }
                    drop(out_tx);
                    let _ = writer.await;
                });
            }
        });

        Self {
            addr,
            connections,
            message_rx,
            accept_task,
        }
    }

    /// A mock that implements the notification contract
    ///
    /// Requests whose name starts with `slow` are answered after `delay`.
    pub async fn notification(delay: Duration) -> Self {
        Self::with_handler(move |request| async move { notification_reply(request, delay).await })
            .await
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// WebSocket connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next frame received by the server, if one arrives within 5 s
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Stop accepting new connections
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }
}

/// Contract-conformant reply to one request
pub async fn notification_reply(request: Value, delay: Duration) -> Reply {
    let id = request["id"].clone();
    match request["method"].as_str() {
        Some(RUN_METHOD) => {
            let Ok(user) = serde_json::from_value::<UserRequest>(request["params"].clone()) else {
                return Reply::Frame(mock_error_response(id, -32602, "Invalid params"));
            };
            if user.name.starts_with("slow") {
                tokio::time::sleep(delay).await;
            }
            let response = NotificationResponse::greeting(&user, Utc::now());
            Reply::Frame(mock_response(id, serde_json::to_value(response).unwrap()))
        }
        Some(DESCRIBE_METHOD) => {
            let described = DescribeResult::notification(vec![
                RUN_METHOD.to_string(),
                DESCRIBE_METHOD.to_string(),
            ]);
            Reply::Frame(mock_response(id, serde_json::to_value(described).unwrap()))
        }
        Some(other) => Reply::Frame(mock_error_response(
            id,
            -32601,
            &format!("Method not found: {}", other),
        )),
        None => Reply::Nothing,
    }
}

/// Accepts TCP connections and never answers the WebSocket handshake
pub struct SilentServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    task: tokio::task::JoinHandle<()>,
}

impl SilentServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(stream);
            }
        });

        Self {
            addr,
            accepted,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for SilentServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// URL of a local port with nothing listening on it
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}

pub fn mock_response(id: Value, result: Value) -> String {
    json!({"jsonrpc": "2.0", "result": result, "id": id}).to_string()
}

pub fn mock_error_response(id: Value, code: i32, message: &str) -> String {
    json!({"jsonrpc": "2.0", "error": {"code": code, "message": message}, "id": id}).to_string()
}
