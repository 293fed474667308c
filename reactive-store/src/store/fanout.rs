//! Gated typed event fan-out: the machinery behind
//! `Store::add_n_typed_event_source`.
//!
//! One upstream observable emits `(Symbol, T)` pairs tagged by which
//! target event id they belong to; `FanOutCore` demultiplexes them to
//! whichever per-id route is currently registered. When a `gate` event id
//! is supplied, the shared upstream is only actually subscribed while the
//! gate has at least one observer — implemented by watching the gate's
//! `is-subscribed-observable` directly, independent of how many of the N
//! per-id routes are themselves registered: other routes can be
//! subscribed the whole time and still see nothing until the gate gains
//! an observer.

use crate::id::Symbol;
use crate::observable::{Observable, Observer, Subscription};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct FanOutCoreState<T> {
    routes: HashMap<Symbol, Observer<T>>,
    upstream_sub: Option<Subscription>,
    gate_sub: Option<Subscription>,
}

/// Shared machinery behind one `add_n_typed_event_source` call. One
/// `FanOutCore` backs exactly one upstream subscription, however many
/// target ids route off of it.
pub(crate) struct FanOutCore<T> {
    upstream: Observable<(Symbol, T)>,
    gate: Option<Observable<bool>>,
    state: Mutex<FanOutCoreState<T>>,
    remaining: AtomicUsize,
}

impl<T: Clone + Send + 'static> FanOutCore<T> {
    pub(crate) fn new(upstream: Observable<(Symbol, T)>, gate: Option<Observable<bool>>, route_count: usize) -> Arc<Self> {
        let core = Arc::new(Self {
            upstream,
            gate,
            state: Mutex::new(FanOutCoreState {
                routes: HashMap::new(),
                upstream_sub: None,
                gate_sub: None,
            }),
            remaining: AtomicUsize::new(route_count),
        });

        match &core.gate {
            Some(gate_obs) => {
                let watch_core = core.clone();
                let gate_sub = gate_obs.subscribe(Observer::from_next(move |open: bool| {
                    if open {
                        watch_core.subscribe_upstream();
                    } else {
                        watch_core.unsubscribe_upstream();
                    }
                }));
                core.state.lock().gate_sub = Some(gate_sub);
            }
            None => core.subscribe_upstream(),
        }

        core
    }

    fn subscribe_upstream(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.upstream_sub.is_some() {
            return;
        }
        let this = self.clone();
        let sub = self.upstream.subscribe(Observer::new(
            move |(id, value): (Symbol, T)| this.route(id, value),
            |_| {},
            || {},
        ));
        state.upstream_sub = Some(sub);
    }

    fn unsubscribe_upstream(&self) {
        if let Some(sub) = self.state.lock().upstream_sub.take() {
            sub.unsubscribe();
        }
    }

    fn route(&self, id: Symbol, value: T) {
        if let Some(observer) = self.state.lock().routes.get(&id) {
            observer.next(value);
        }
    }

    /// Register the per-id route for one of the N target ids. Returns a
    /// subscription that deregisters the route and, once every route has
    /// been torn down, releases the shared upstream and gate watch.
    pub(crate) fn register(self: &Arc<Self>, id: Symbol, observer: Observer<T>) -> Subscription {
        self.state.lock().routes.insert(id, observer);

        let this = self.clone();
        Subscription::new(move || {
            this.state.lock().routes.remove(&id);
            if this.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                this.unsubscribe_upstream();
                if let Some(sub) = this.state.lock().gate_sub.take() {
                    sub.unsubscribe();
                }
            }
        })
    }
}

/// Handle returned by `Store::add_n_typed_event_source`: one fresh source
/// id per target event id, all backed by the same `FanOutCore`.
pub struct FanOutHandle {
    pub(crate) ids: Vec<Symbol>,
}

impl FanOutHandle {
    /// The per-target-id source ids minted for this fan-out, in the same
    /// order the target event ids were supplied.
    pub fn source_ids(&self) -> &[Symbol] {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::Subscription as Sub;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn gate_controls_whether_upstream_is_subscribed() {
        let subscribed = Arc::new(AtomicBool::new(false));
        let s2 = subscribed.clone();
        let upstream: Observable<(Symbol, i32)> = Observable::new(move |_observer| {
            s2.store(true, Ordering::SeqCst);
            Sub::noop()
        });

        let gate_open = Arc::new(AtomicBool::new(false));
        let gate_watchers: Arc<StdMutex<Vec<Box<dyn Fn(bool) + Send>>>> = Arc::new(StdMutex::new(Vec::new()));
        let gw = gate_watchers.clone();
        let go = gate_open.clone();
        let gate: Observable<bool> = Observable::new(move |observer: Observer<bool>| {
            observer.next(go.load(Ordering::SeqCst));
            gw.lock().unwrap().push(Box::new(move |v| observer.next(v)));
            Sub::noop()
        });

        let core = FanOutCore::new(upstream, Some(gate), 1);
        assert!(!subscribed.load(Ordering::SeqCst));

        gate_open.store(true, Ordering::SeqCst);
        for w in gate_watchers.lock().unwrap().iter() {
            w(true);
        }
        assert!(subscribed.load(Ordering::SeqCst));

        let id = Symbol::fresh();
        let seen = Arc::new(StdMutex::new(None));
        let seen2 = seen.clone();
        let _sub = core.register(id, Observer::from_next(move |v| *seen2.lock().unwrap() = Some(v)));
    }
}
