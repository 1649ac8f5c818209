//! JSON-RPC client over a lazily opened WebSocket channel
//!
//! # Channel Lifecycle
//!
//! 1. **Build**: `ClientBuilder::build()` returns an idle client, no I/O
//! 2. **First call**: opens the channel within `connect_timeout`
//! 3. **Reuse**: every later call shares the same channel
//! 4. **Loss**: if the server closes the channel, pending calls fail with
//!    `Unavailable` and the client returns to Idle; the next call reconnects
//! 5. **Close**: `close()` shuts the channel down explicitly
//!
//! # Cloning
//!
//! `RpcClient` is cheaply cloneable. All clones share one channel, one
//! pending map and one state machine, so it can be handed to many tasks.
//!
//! # Concurrency
//!
//! Concurrent first calls share a single connect attempt: the channel slot
//! is behind an async mutex, and callers that queued behind a failed attempt
//! receive that attempt's error instead of starting their own. Each request
//! is written as one frame under the sink lock, and a dedicated receive task
//! routes responses to callers by id.

use crate::connection_state::{ChannelState, ConnectionManager};
use crate::metrics::ClientMetrics;
use crate::request::RequestManager;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use notifier_core::contract::{DescribeResult, DESCRIBE_METHOD};
use notifier_core::{codec, Error, Id, JsonRpcRequest, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// JSON-RPC client bound to one target URL
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    url: String,
    connect_timeout: Duration,
    call_timeout: Duration,
    slot: Mutex<ChannelSlot>,
    /// Bumped when a connect attempt finishes; read before queueing on `slot`
    attempts: AtomicU64,
    state: Arc<ConnectionManager>,
    metrics: Option<Arc<ClientMetrics>>,
}

#[derive(Default)]
struct ChannelSlot {
    channel: Option<Arc<Channel>>,
    last_failure: Option<Error>,
}

/// One open WebSocket connection
struct Channel {
    sink: Mutex<SplitSink<WsStream, Message>>,
    requests: Arc<RequestManager>,
    open: Arc<AtomicBool>,
    receiver: JoinHandle<()>,
}

impl Channel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, frame: String) -> Result<()> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(frame)).await.map_err(|e| {
            self.open.store(false, Ordering::SeqCst);
            Error::Unavailable(format!("failed to send request: {}", e))
        })
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

/// Keeps the in-flight count honest even when the call future is dropped
struct ActiveCall<'a> {
    state: &'a ConnectionManager,
}

impl<'a> ActiveCall<'a> {
    fn start(state: &'a ConnectionManager) -> Self {
        state.call_started();
        Self { state }
    }
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.state.call_finished();
    }
}

impl RpcClient {
    pub(crate) fn new(
        url: String,
        connect_timeout: Duration,
        call_timeout: Duration,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        let state = Arc::new(ConnectionManager::new(url.clone()));
        Self {
            inner: Arc::new(ClientInner {
                url,
                connect_timeout,
                call_timeout,
                slot: Mutex::new(ChannelSlot::default()),
                attempts: AtomicU64::new(0),
                state,
                metrics,
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn connect_timeout(&self) -> Duration {
        self.inner.connect_timeout
    }

    pub fn call_timeout(&self) -> Duration {
        self.inner.call_timeout
    }

    /// Current channel state
    pub fn state(&self) -> ChannelState {
        self.inner.state.state()
    }

    /// Calls issued through this client that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.inner.state.in_flight()
    }

    /// Open the channel now instead of on the first call
    ///
    /// # Errors
    ///
    /// `Error::Unavailable` if the channel cannot reach Ready within the
    /// connect deadline.
    pub async fn connect(&self) -> Result<()> {
        self.ensure_channel().await.map(|_| ())
    }

    /// Make a typed call
    ///
    /// `()` as params sends a request without `params`.
    ///
    /// # Errors
    ///
    /// - `Error::Unavailable`: no channel within the connect deadline, or the
    ///   channel dropped while the call was pending
    /// - `Error::Timeout`: no response within the call timeout; the channel
    ///   stays usable and a late response is discarded
    /// - `Error::InvalidResponse`: the response does not match the contract
    /// - `Error::JsonRpc` / `Error::Cancelled`: the server answered with an error
    #[tracing::instrument(skip(self, params), fields(url = %self.inner.url))]
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let start = Instant::now();
        let outcome = self
            .call_raw(method, params)
            .await
            .and_then(|value| decode_result(method, value));

        if let Some(m) = &self.inner.metrics {
            let status = match &outcome {
                Ok(_) => "success",
                Err(e) => {
                    m.record_error(error_kind(e));
                    "error"
                }
            };
            m.record_request(method, status, start.elapsed().as_secs_f64());
            m.update_channel_state(self.state());
        }

        outcome
    }

    /// Make a call and return the raw JSON result
    pub async fn call_raw<P: Serialize>(&self, method: &str, params: P) -> Result<Value> {
        let params = match serde_json::to_value(params)
            .map_err(|e| Error::Serialization(e.to_string()))?
        {
            Value::Null => None,
            value => Some(value),
        };

        let _active = ActiveCall::start(&self.inner.state);
        let channel = self.ensure_channel().await?;

        let mut pending = channel.requests.register();
        if !channel.is_open() {
            return Err(Error::Unavailable("channel closed".to_string()));
        }

        let id = pending.id;
        let request = JsonRpcRequest::new(method, params, Id::Number(id as i64));
        let frame = codec::encode_request(&request)?;

        let exchange = async {
            channel.send(frame).await?;
            match (&mut pending.rx).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Unavailable(
                    "channel closed before the response arrived".to_string(),
                )),
            }
        };

        match tokio::time::timeout(self.inner.call_timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    id = id,
                    method = method,
                    timeout_ms = self.inner.call_timeout.as_millis() as u64,
                    "Call timed out"
                );
                Err(Error::Timeout)
            }
        }
    }

    /// Fetch the server's contract description
    pub async fn describe(&self) -> Result<DescribeResult> {
        self.call(DESCRIBE_METHOD, ()).await
    }

    /// Close the channel
    ///
    /// Pending calls fail with `Unavailable`. The client is Idle afterwards
    /// and the next call opens a new channel.
    #[tracing::instrument(skip(self), fields(url = %self.inner.url))]
    pub async fn close(&self) {
        let mut slot = self.inner.slot.lock().await;
        slot.last_failure = None;
        self.inner.state.closed();
        self.publish_state();

        let Some(channel) = slot.channel.take() else {
            return;
        };
        channel.open.store(false, Ordering::SeqCst);

        {
            let mut sink = channel.sink.lock().await;
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "Close frame not delivered");
            }
        }

        let failed = channel
            .requests
            .fail_all(Error::Unavailable("client closed".to_string()));
        tracing::info!(failed_calls = failed, "Channel closed by client");
    }

    fn publish_state(&self) {
        if let Some(m) = &self.inner.metrics {
            m.update_channel_state(self.inner.state.state());
        }
    }

    async fn ensure_channel(&self) -> Result<Arc<Channel>> {
        let seen = self.inner.attempts.load(Ordering::SeqCst);
        let mut slot = self.inner.slot.lock().await;

        if let Some(channel) = &slot.channel {
            if channel.is_open() {
                return Ok(Arc::clone(channel));
            }
        }

        // Someone else attempted while we queued; share its failure.
        if self.inner.attempts.load(Ordering::SeqCst) != seen {
            if let Some(error) = &slot.last_failure {
                return Err(error.clone());
            }
        }

        slot.channel = None;
        let opened = self.open_channel().await;
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        match opened {
            Ok(channel) => {
                slot.last_failure = None;
                slot.channel = Some(Arc::clone(&channel));
                Ok(channel)
            }
            Err(e) => {
                slot.last_failure = Some(e.clone());
                Err(e)
            }
        }
    }

    #[tracing::instrument(skip(self), fields(url = %self.inner.url), name = "client.connect")]
    async fn open_channel(&self) -> Result<Arc<Channel>> {
        let inner = &self.inner;
        inner.state.connecting();
        self.publish_state();
        tracing::info!("Connecting to server");

        // Nagle off: concurrent calls share this socket and must not wait on each other.
        let connecting = connect_async_with_config(inner.url.as_str(), None, true);
        let ws = match tokio::time::timeout(inner.connect_timeout, connecting).await {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                return Err(self.connect_failed(format!("cannot connect to {}: {}", inner.url, e)))
            }
            Err(_) => {
                return Err(self.connect_failed(format!(
                    "no channel to {} within {} ms",
                    inner.url,
                    inner.connect_timeout.as_millis()
                )))
            }
        };

        let generation = inner.state.connected();
        self.publish_state();
        if let Some(m) = &inner.metrics {
            m.record_connect("connected");
        }
        tracing::info!(generation = generation, "Channel ready");

        let (sink, stream) = ws.split();
        let requests = RequestManager::new();
        let open = Arc::new(AtomicBool::new(true));

        let receiver = tokio::spawn(receive_loop(
            stream,
            Arc::clone(&requests),
            Arc::clone(&open),
            Arc::clone(&inner.state),
            generation,
            inner.metrics.clone(),
        ));

        Ok(Arc::new(Channel {
            sink: Mutex::new(sink),
            requests,
            open,
            receiver,
        }))
    }

    fn connect_failed(&self, reason: String) -> Error {
        tracing::warn!(reason = %reason, "Connect failed");
        self.inner.state.failed();
        self.publish_state();
        if let Some(m) = &self.inner.metrics {
            m.record_connect("failed");
        }
        Error::Unavailable(reason)
    }
}

#[tracing::instrument(skip_all, fields(generation = generation), name = "client.receive")]
async fn receive_loop(
    mut stream: SplitStream<WsStream>,
    requests: Arc<RequestManager>,
    open: Arc<AtomicBool>,
    state: Arc<ConnectionManager>,
    generation: u64,
    metrics: Option<Arc<ClientMetrics>>,
) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => route_frame(&text, &requests),
            Some(Ok(Message::Binary(_))) => {
                tracing::warn!("Binary frame from server ignored; contract skew suspected");
            }
            Some(Ok(Message::Close(_))) => break "closed by server".to_string(),
            Some(Ok(_)) => {}
            Some(Err(e)) => break format!("transport error: {}", e),
            None => break "stream ended".to_string(),
        }
    };

    open.store(false, Ordering::SeqCst);
    let failed = requests.fail_all(Error::Unavailable(format!("channel lost: {}", reason)));

    if state.channel_closed(generation) {
        if let Some(m) = &metrics {
            m.update_channel_state(state.state());
        }
    }

    tracing::info!(reason = %reason, failed_calls = failed, "Channel closed");
}

fn route_frame(text: &str, requests: &RequestManager) {
    let response = match codec::decode_response(text) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Undecodable frame from server; client and server may be out of sync"
            );
            if let Some(Id::Number(id)) = codec::extract_id(text) {
                requests.complete(id as u64, Err(Error::InvalidResponse(e.to_string())));
            }
            return;
        }
    };

    let id = match response.id {
        Id::Number(id) if id > 0 => id as u64,
        other => {
            tracing::warn!(id = %other, error = ?response.error, "Response without a call id");
            return;
        }
    };

    let well_formed = response.jsonrpc == notifier_core::types::JSONRPC_VERSION;
    let outcome = match (well_formed, response.result, response.error) {
        (true, Some(result), None) => Ok(result),
        (true, None, Some(error)) => Err(Error::from_remote(error)),
        _ => {
            tracing::warn!(id = id, "Malformed response envelope; contract skew suspected");
            Err(Error::InvalidResponse(
                "response must carry exactly one of result and error".to_string(),
            ))
        }
    };

    if !requests.complete(id, outcome) {
        tracing::debug!(id = id, "Late or unknown response discarded");
    }
}

fn decode_result<R: DeserializeOwned>(method: &str, value: Value) -> Result<R> {
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(
            method = method,
            error = %e,
            "Result does not match the wire contract; client and server may be out of sync"
        );
        Error::InvalidResponse(e.to_string())
    })
}

fn error_kind(error: &Error) -> &'static str {
    match error {
        Error::Unavailable(_) => "unavailable",
        Error::Timeout => "timeout",
        Error::InvalidResponse(_) => "invalid_response",
        Error::Cancelled(_) => "cancelled",
        Error::JsonRpc(_) => "remote",
        _ => "other",
    }
}
