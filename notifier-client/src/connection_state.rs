//! Channel state tracking
//!
//! # Channel States
//!
//! - **Idle**: no channel; nothing has been attempted, or the server closed it
//! - **Connecting**: a connect attempt is running
//! - **Ready**: connected, no call in flight
//! - **Calling**: connected, at least one call in flight
//! - **Failed**: the last connect attempt did not reach Ready
//!
//! # State Transitions
//!
//! ```text
//! Idle ──call──▶ Connecting ──▶ Ready ⇄ Calling
//!  ▲                  │            │
//!  │                  ▼            │ server closes
//!  │               Failed          │
//!  └────── next call retries ◀─────┘
//! ```
//!
//! There is no background reconnection. Leaving `Failed` or `Idle` only
//! happens when a caller issues the next call.
//!
//! Each channel gets a generation number when it is opened. Close events
//! from a channel that has already been replaced are ignored, so a slow
//! receive task cannot knock a fresh channel back to Idle.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

/// Observable state of the client's channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Ready,
    Calling,
    Failed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Ready => "ready",
            ChannelState::Calling => "calling",
            ChannelState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Connection-level state: everything except Ready/Calling, which is
/// derived from the in-flight count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Idle,
    Connecting,
    Connected,
    Failed,
}

/// Tracks the channel state machine of one client
pub struct ConnectionManager {
    link: RwLock<LinkState>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    url: String,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            link: RwLock::new(LinkState::Idle),
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current state, with Ready/Calling resolved from in-flight calls
    pub fn state(&self) -> ChannelState {
        let link = self
            .link
            .read()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner());

        match link {
            LinkState::Idle => ChannelState::Idle,
            LinkState::Connecting => ChannelState::Connecting,
            LinkState::Failed => ChannelState::Failed,
            LinkState::Connected if self.in_flight() > 0 => ChannelState::Calling,
            LinkState::Connected => ChannelState::Ready,
        }
    }

    /// Number of calls currently issued through this client
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn set(&self, state: LinkState) {
        match self.link.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    pub fn connecting(&self) {
        self.set(LinkState::Connecting);
    }

    /// Mark a new channel as open and return its generation
    pub fn connected(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set(LinkState::Connected);
        generation
    }

    pub fn failed(&self) {
        self.set(LinkState::Failed);
    }

    /// The channel of `generation` closed; back to Idle if it is still current
    ///
    /// Returns whether the state changed.
    pub fn channel_closed(&self, generation: u64) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        let mut changed = false;
        let mut apply = |link: &mut LinkState| {
            if *link == LinkState::Connected {
                *link = LinkState::Idle;
                changed = true;
            }
        };
        match self.link.write() {
            Ok(mut guard) => apply(&mut guard),
            Err(poisoned) => apply(&mut poisoned.into_inner()),
        }
        changed
    }

    /// Explicit close by the owner: forget the current channel
    pub fn closed(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.set(LinkState::Idle);
    }

    pub(crate) fn call_started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn call_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_and_call_transitions() {
        let manager = ConnectionManager::new("ws://127.0.0.1:1");
        assert_eq!(manager.state(), ChannelState::Idle);

        manager.connecting();
        assert_eq!(manager.state(), ChannelState::Connecting);

        manager.connected();
        assert_eq!(manager.state(), ChannelState::Ready);

        manager.call_started();
        manager.call_started();
        assert_eq!(manager.state(), ChannelState::Calling);

        manager.call_finished();
        assert_eq!(manager.state(), ChannelState::Calling);
        manager.call_finished();
        assert_eq!(manager.state(), ChannelState::Ready);
    }

    #[test]
    fn test_failed_then_retry() {
        let manager = ConnectionManager::new("ws://127.0.0.1:1");
        manager.connecting();
        manager.failed();
        assert_eq!(manager.state(), ChannelState::Failed);

        manager.connecting();
        manager.connected();
        assert_eq!(manager.state(), ChannelState::Ready);
    }

    #[test]
    fn test_stale_close_is_ignored() {
        let manager = ConnectionManager::new("ws://127.0.0.1:1");
        let first = manager.connected();
        let second = manager.connected();

        assert!(!manager.channel_closed(first));
        assert_eq!(manager.state(), ChannelState::Ready);

        assert!(manager.channel_closed(second));
        assert_eq!(manager.state(), ChannelState::Idle);
    }

    #[test]
    fn test_explicit_close_invalidates_generation() {
        let manager = ConnectionManager::new("ws://127.0.0.1:1");
        let generation = manager.connected();
        manager.closed();
        assert_eq!(manager.state(), ChannelState::Idle);
        assert!(!manager.channel_closed(generation));
    }

    #[test]
    fn test_pending_calls_while_failed_report_failed() {
        let manager = ConnectionManager::new("ws://127.0.0.1:1");
        manager.call_started();
        manager.failed();
        assert_eq!(manager.state(), ChannelState::Failed);
    }
}
