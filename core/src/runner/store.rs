//! Domain state storage and the external mutation handle

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::types::{Snapshot, Value};

/// Callback posted whenever the state changes (installed by the host)
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

/// Holds the current domain state snapshot of one runner
///
/// The state is never mutated in place: every change stores a new `Arc`
/// and bumps `version`.
pub struct StateStore {
    tx: watch::Sender<Snapshot>,
    version: AtomicU64,
    notifier: Mutex<Option<Notifier>>,
}

impl StateStore {
    pub fn new(initial: Value) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self {
            tx,
            version: AtomicU64::new(0),
            notifier: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Replace the state with `updater(current)`, returning the new snapshot
    pub fn update<F>(&self, updater: F) -> Snapshot
    where
        F: FnOnce(&Value) -> Value,
    {
        self.tx.send_modify(|snapshot| {
            *snapshot = Arc::new(updater(&**snapshot));
            self.version.fetch_add(1, Ordering::SeqCst);
        });
        self.current()
    }

    /// Store an externally supplied snapshot as-is
    pub fn put(&self, snapshot: Snapshot) {
        // Same Arc means same state; subscribers are not woken for it
        self.tx.send_if_modified(|current| {
            if Arc::ptr_eq(current, &snapshot) {
                return false;
            }
            *current = snapshot;
            self.version.fetch_add(1, Ordering::SeqCst);
            true
        });
    }

    pub fn set_notifier(&self, notifier: Notifier) {
        *self.notifier.lock() = Some(notifier);
    }

    /// Post a retrigger, if anyone listens
    pub fn notify(&self) {
        let notifier = self.notifier.lock().clone();
        if let Some(notifier) = notifier {
            notifier();
        }
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("version", &self.version())
            .field("state", &self.current())
            .finish()
    }
}

/// External mutation handle of a runner-owned state
///
/// Cloning keeps the identity: all clones point at the same store, so callers
/// can close over a setter across renders. A mutation through the setter is
/// indistinguishable from the program's own `SetState`.
#[derive(Clone)]
pub struct StateSetter {
    store: Arc<StateStore>,
}

impl StateSetter {
    pub(crate) fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Apply an updater to the current state and post a retrigger
    pub fn set<F>(&self, updater: F) -> Snapshot
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = self.store.update(updater);
        self.store.notify();
        next
    }

    /// Replace the state wholesale
    pub fn replace(&self, state: Value) -> Snapshot {
        self.set(move |_| state)
    }

    /// True when both handles mutate the same runner state
    pub fn same_as(&self, other: &StateSetter) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}

impl fmt::Debug for StateSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("version", &self.store.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_update_replaces_snapshot_identity() {
        let store = StateStore::new(json!({"name": ""}));
        let before = store.current();

        let after = store.update(|s| crate::operator::merge(s, json!({"name": "Ann"})));

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, json!({"name": ""}));
        assert_eq!(*after, json!({"name": "Ann"}));
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn test_put_same_snapshot_keeps_version() {
        let store = StateStore::new(json!(1));
        let rx = store.subscribe();
        let snapshot = store.current();
        store.put(snapshot);
        assert_eq!(store.version(), 0);
        assert!(!rx.has_changed().unwrap());

        store.put(Arc::new(json!(2)));
        assert_eq!(store.version(), 1);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_setter_notifies_and_keeps_identity() {
        let store = Arc::new(StateStore::new(json!({})));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        store.set_notifier(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let setter = StateSetter::new(store.clone());
        let copy = setter.clone();
        copy.replace(json!({"isSubmitting": true}));

        assert!(setter.same_as(&copy));
        assert!(!setter.same_as(&StateSetter::new(Arc::new(StateStore::new(json!({}))))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(*store.current(), json!({"isSubmitting": true}));
    }

    #[tokio::test]
    async fn test_subscribers_see_new_snapshots() {
        let store = StateStore::new(json!(0));
        let mut rx = store.subscribe();

        store.update(|_| json!(1));

        rx.changed().await.unwrap();
        assert_eq!(**rx.borrow(), json!(1));
    }
}
