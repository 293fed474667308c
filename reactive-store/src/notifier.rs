//! A small reactive value broadcaster.
//!
//! A value behind a lock plus a list of notification callbacks invoked
//! on every write. Deliberately simpler than a full signal — no
//! dependency tracking, no reactive-context integration — because the
//! only consumers are `is-subscribed-observable`, `source-count`, and the
//! registry mutation stream, none of which participate in the signal
//! graph itself.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    fn fresh() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        WatcherId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A value that reports every update to its registered watchers.
///
/// Used internally for `is-subscribed-observable` (`Notifier<bool>`),
/// `source-count` (`Notifier<usize>`), and the per-store registry
/// mutation stream (`Notifier<RegistryEvent>`, see `crate::store`).
pub struct Notifier<T: Clone + Send + Sync + 'static> {
    value: RwLock<T>,
    watchers: RwLock<Vec<(WatcherId, Box<dyn Fn(&T) + Send + Sync>)>>,
}

impl<T: Clone + Send + Sync + 'static> Notifier<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: RwLock::new(initial),
            watchers: RwLock::new(Vec::new()),
        }
    }

    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Overwrite the value and notify every watcher, unconditionally
    /// (callers decide whether the new value actually differs before
    /// calling this — see `ControlledSubject`'s observer-count tracking,
    /// which only calls `set` on 0↔non-zero transitions).
    pub fn set(&self, value: T) {
        *self.value.write() = value.clone();
        for (_, watch) in self.watchers.read().iter() {
            watch(&value);
        }
    }

    /// Register a watcher, invoked with every subsequent value. Returns a
    /// handle that can be passed to `unwatch`.
    pub fn watch<F>(&self, f: F) -> WatcherId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = WatcherId::fresh();
        self.watchers.write().push((id, Box::new(f)));
        id
    }

    pub fn unwatch(&self, id: WatcherId) {
        self.watchers.write().retain(|(w, _)| *w != id);
    }
}

/// Ref-counted handle so `Notifier` can be shared between a subject and
/// anything observing it (e.g. a parent/child delegation) without extra
/// plumbing.
pub type SharedNotifier<T> = Arc<Notifier<T>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as O};

    #[test]
    fn watchers_see_updates() {
        let n = Notifier::new(0usize);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        n.watch(move |v| seen2.store(*v, O::SeqCst));

        assert_eq!(seen.load(O::SeqCst), 0);
        n.set(5);
        assert_eq!(seen.load(O::SeqCst), 5);
        assert_eq!(n.get(), 5);
    }

    #[test]
    fn unwatch_stops_notifications() {
        let n = Notifier::new(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let id = n.watch(move |_| {
            calls2.fetch_add(1, O::SeqCst);
        });

        n.set(true);
        assert_eq!(calls.load(O::SeqCst), 1);

        n.unwatch(id);
        n.set(false);
        assert_eq!(calls.load(O::SeqCst), 1);
    }
}
