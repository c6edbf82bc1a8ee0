//! Seams for the document store and identity collaborators.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::transaction::LedgerData;

/// Stable identifier of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies the current user once known.
pub trait IdentityProvider {
    fn current_user(&self) -> Option<UserId>;
}

/// A fixed user, e.g. one read from configuration.
impl IdentityProvider for Option<UserId> {
    fn current_user(&self) -> Option<UserId> {
        self.clone()
    }
}

/// Receiving end of a document change feed. `None` means the document is
/// gone. Dropping it closes the feed for the producer.
#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<Option<LedgerData>>,
    open: Arc<AtomicBool>,
}

/// Producing end of a [`Subscription`].
#[derive(Debug, Clone)]
pub struct SnapshotSender {
    tx: Sender<Option<LedgerData>>,
    open: Arc<AtomicBool>,
}

impl Subscription {
    pub fn channel() -> (SnapshotSender, Subscription) {
        let (tx, rx) = mpsc::channel();
        let open = Arc::new(AtomicBool::new(true));
        (
            SnapshotSender {
                tx,
                open: Arc::clone(&open),
            },
            Subscription { rx, open },
        )
    }

    pub fn try_recv(&self) -> Result<Option<LedgerData>, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<LedgerData>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.open.store(false, Ordering::Release);
    }
}

impl SnapshotSender {
    /// False once the subscriber has gone away.
    pub fn send(&self, snapshot: Option<LedgerData>) -> bool {
        !self.is_closed() && self.tx.send(snapshot).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        !self.open.load(Ordering::Acquire)
    }
}

/// Per-user ledger documents.
pub trait DocumentStore: Send + Sync {
    /// `None` when the user has no document yet.
    fn fetch(&self, user: &UserId) -> Result<Option<LedgerData>, StoreError>;

    /// Merge `data` into the user's document, creating it if needed.
    fn save(&self, user: &UserId, data: &LedgerData) -> Result<(), StoreError>;

    /// Receive every subsequent change to the user's document.
    fn subscribe(&self, user: &UserId) -> Result<Subscription, StoreError>;
}

/// In-process store; subscribers are notified synchronously on save.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<UserId, LedgerData>>,
    subscribers: Mutex<HashMap<UserId, Vec<SnapshotSender>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn fetch(&self, user: &UserId) -> Result<Option<LedgerData>, StoreError> {
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(docs.get(user).cloned())
    }

    fn save(&self, user: &UserId, data: &LedgerData) -> Result<(), StoreError> {
        self.docs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user.clone(), data.clone());

        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = subs.get_mut(user) {
            list.retain(|tx| tx.send(Some(data.clone())));
        }
        Ok(())
    }

    fn subscribe(&self, user: &UserId) -> Result<Subscription, StoreError> {
        let (tx, rx) = Subscription::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(user.clone())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.fetch(&UserId::new("u1")).unwrap().is_none());
    }

    #[test]
    fn test_save_notifies_only_that_user() {
        let store = MemoryStore::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let rx_alice = store.subscribe(&alice).unwrap();
        let rx_bob = store.subscribe(&bob).unwrap();

        let data = LedgerData {
            start_balance: 10,
            ..Default::default()
        };
        store.save(&alice, &data).unwrap();

        assert_eq!(rx_alice.try_recv().unwrap(), Some(data.clone()));
        assert!(rx_bob.try_recv().is_err());
        assert_eq!(store.fetch(&alice).unwrap(), Some(data));
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let store = MemoryStore::new();
        let user = UserId::new("u");
        drop(store.subscribe(&user).unwrap());
        store.save(&user, &LedgerData::default()).unwrap();
        assert!(store.subscribers.lock().unwrap()[&user].is_empty());
    }

    #[test]
    fn test_sender_sees_dropped_subscription() {
        let (tx, rx) = Subscription::channel();
        assert!(!tx.is_closed());
        assert!(tx.send(None));
        assert_eq!(rx.try_recv().unwrap(), None);

        drop(rx);
        assert!(tx.is_closed());
        assert!(!tx.send(None));
    }

    #[test]
    fn test_option_identity() {
        let none: Option<UserId> = None;
        assert!(none.current_user().is_none());
        assert_eq!(Some(UserId::new("x")).current_user(), Some(UserId::new("x")));
    }
}
