//! Pending-call correlation
//!
//! # Call Lifecycle
//!
//! 1. **Register**: allocate the next id and a oneshot channel
//! 2. **Send**: the request frame goes out on the shared sink
//! 3. **Wait**: the caller awaits the receiver, bounded by the call timeout
//! 4. **Complete**: the receive task routes the response by id
//!
//! The pending map is a `std::sync::Mutex`: every critical section is a
//! single map operation and never awaits. That lets [`PendingCall`] remove
//! its own entry in `Drop`, so a timed-out or cancelled caller leaves
//! nothing behind and a late response for it is simply discarded.

use notifier_core::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

type Responder = oneshot::Sender<Result<Value>>;

/// Pending calls of one channel
pub(crate) struct RequestManager {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, Responder>>,
}

impl RequestManager {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        })
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, Responder>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocate an id and register a waiter for it
    pub(crate) fn register(self: &Arc<Self>) -> PendingCall {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id, tx);
        PendingCall {
            id,
            rx,
            manager: Arc::clone(self),
        }
    }

    /// Deliver the outcome of call `id`
    ///
    /// Returns false when nobody is waiting any more (timed out, cancelled
    /// or never issued).
    pub(crate) fn complete(&self, id: u64, outcome: Result<Value>) -> bool {
        match self.pending().remove(&id) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Fail every pending call, used when the channel goes away
    pub(crate) fn fail_all(&self, error: Error) -> usize {
        let drained: Vec<Responder> = self.pending().drain().map(|(_, tx)| tx).collect();
        let count = drained.len();
        for tx in drained {
            let _ = tx.send(Err(error.clone()));
        }
        count
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending().len()
    }

    fn forget(&self, id: u64) {
        self.pending().remove(&id);
    }
}

/// A registered call waiting for its response
pub(crate) struct PendingCall {
    pub(crate) id: u64,
    pub(crate) rx: oneshot::Receiver<Result<Value>>,
    manager: Arc<RequestManager>,
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.manager.forget(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let manager = RequestManager::new();
        let a = manager.register();
        let b = manager.register();
        assert!(b.id > a.id);
        assert_eq!(manager.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_register_and_complete() {
        let manager = RequestManager::new();
        let mut call = manager.register();

        assert!(manager.complete(call.id, Ok(serde_json::json!(42))));
        assert_eq!(manager.pending_count(), 0);

        let value = (&mut call.rx).await.unwrap().unwrap();
        assert_eq!(value, serde_json::json!(42));
    }

    #[test]
    fn test_dropped_call_is_forgotten() {
        let manager = RequestManager::new();
        let call = manager.register();
        let id = call.id;
        drop(call);

        assert_eq!(manager.pending_count(), 0);
        assert!(!manager.complete(id, Ok(Value::Null)));
    }

    #[tokio::test]
    async fn test_fail_all() {
        let manager = RequestManager::new();
        let mut a = manager.register();
        let mut b = manager.register();

        assert_eq!(manager.fail_all(Error::Unavailable("gone".into())), 2);

        for call in [&mut a, &mut b] {
            let outcome = (&mut call.rx).await.unwrap();
            assert!(matches!(outcome, Err(Error::Unavailable(_))));
        }
    }

    #[test]
    fn test_unknown_id_is_discarded() {
        let manager = RequestManager::new();
        assert!(!manager.complete(999, Ok(Value::Null)));
    }
}
