//! Server lifecycle and in-flight call tracking
//!
//! ```text
//! Serving ──stop()──▶ Draining ──(idle or drain deadline)──▶ Stopped
//! ```
//!
//! While **Draining**, the accept loop has stopped, connections no longer
//! read new calls, and calls already running are given `drain_timeout` to
//! finish. Calls still running at the deadline observe the abandon signal
//! and are answered with `-32001 Call cancelled`.
//!
//! Each call holds a [`CallGuard`] for its whole lifetime. Dropping the
//! guard (including on panic) decrements the in-flight count, which is what
//! `stop()` waits on.

use crate::metrics::ServerMetrics;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle state of a started server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Accepting connections and calls
    Serving,
    /// Finishing in-flight calls, accepting nothing new
    Draining,
    /// All calls finished or abandoned, listener released
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Serving => write!(f, "serving"),
            ServerState::Draining => write!(f, "draining"),
            ServerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Outcome of a graceful stop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Calls that finished normally after `stop()` was requested
    pub completed: usize,
    /// Calls cut off at the drain deadline
    pub abandoned: usize,
}

pub(crate) struct Lifecycle {
    state: watch::Sender<ServerState>,
    abandon: watch::Sender<bool>,
    in_flight: watch::Sender<usize>,
    drained_completed: AtomicUsize,
    drained_abandoned: AtomicUsize,
    metrics: Option<Arc<ServerMetrics>>,
}

impl Lifecycle {
    pub(crate) fn new(metrics: Option<Arc<ServerMetrics>>) -> Arc<Self> {
        Arc::new(Self {
            state: watch::channel(ServerState::Serving).0,
            abandon: watch::channel(false).0,
            in_flight: watch::channel(0).0,
            drained_completed: AtomicUsize::new(0),
            drained_abandoned: AtomicUsize::new(0),
            metrics,
        })
    }

    pub(crate) fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    pub(crate) fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    pub(crate) fn begin_drain(&self) {
        self.state.send_replace(ServerState::Draining);
    }

    pub(crate) fn abandon_remaining(&self) {
        self.abandon.send_replace(true);
    }

    pub(crate) fn finish(&self) -> DrainReport {
        self.state.send_replace(ServerState::Stopped);
        let report = DrainReport {
            completed: self.drained_completed.load(Ordering::SeqCst),
            abandoned: self.drained_abandoned.load(Ordering::SeqCst),
        };
        if let Some(m) = &self.metrics {
            m.record_drain(report.completed, report.abandoned);
        }
        report
    }

    /// Resolve once no call is executing
    pub(crate) async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Register a new call; the returned guard must live until it is answered
    pub(crate) fn begin_call(self: &Arc<Self>) -> CallGuard {
        let mut now = 0;
        self.in_flight.send_modify(|count| {
            *count += 1;
            now = *count;
        });
        if let Some(m) = &self.metrics {
            m.record_in_flight(now);
        }
        CallGuard {
            lifecycle: Arc::clone(self),
            abandon: self.abandon.subscribe(),
        }
    }
}

/// Token held by one executing call
pub(crate) struct CallGuard {
    lifecycle: Arc<Lifecycle>,
    abandon: watch::Receiver<bool>,
}

impl CallGuard {
    /// Resolve when the server gives up on in-flight calls
    pub(crate) async fn abandoned(&mut self) {
        let _ = self.abandon.wait_for(|abandon| *abandon).await;
    }

    pub(crate) fn completed(self) {
        if self.lifecycle.state() != ServerState::Serving {
            self.lifecycle.drained_completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn cancelled(self) {
        self.lifecycle.drained_abandoned.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        let mut now = 0;
        self.lifecycle.in_flight.send_modify(|count| {
            *count = count.saturating_sub(1);
            now = *count;
        });
        if let Some(m) = &self.lifecycle.metrics {
            m.record_in_flight(now);
        }
    }
}
