//! The minimal cold-observable abstraction the rest of the crate is built
//! on: subscribe/next/error/complete plus per-subscription disposal.
//!
//! What's actually needed out of a reactive-streams library, reduced to
//! its essentials, is just this: cold/hot streams, per-subscription
//! disposal, and two composable operators equivalent to
//! share-with-replay-latest-and-distinct and share-without-replay. This
//! module provides exactly the first two; the two sharing operators are
//! implemented directly on `ControlledSubject` rather than as generic
//! combinators, since the only thing in this crate that ever needs them
//! is a subject's own downstream pipe.

use crate::error::StoreError;
use std::sync::Arc;

/// The three callbacks a subscriber provides, exactly mirroring an RxJS
/// observer.
///
/// The callbacks are held as `Arc<dyn Fn>` rather than boxed `FnMut`/
/// `FnOnce`, which makes `Observer` itself cheap to clone. `ControlledSubject`
/// relies on this: it snapshots its observer list out from under its lock
/// before invoking any of them, so a callback that re-enters the subject
/// (the cyclic-behavior-graph case) never finds the lock still held by
/// its own caller. Callers needing mutable state inside a callback
/// supply their own interior mutability (`Mutex`, `RefCell`, atomics).
///
/// `error`/`complete` are only ever invoked once per observer in practice
/// — `ControlledSubject` removes an observer from its map before calling
/// either — but that is a calling-convention guarantee, not one enforced
/// by the type.
#[derive(Clone)]
pub struct Observer<T> {
    on_next: Arc<dyn Fn(T) + Send + Sync>,
    on_error: Arc<dyn Fn(StoreError) + Send + Sync>,
    on_complete: Arc<dyn Fn() + Send + Sync>,
}

impl<T> Observer<T> {
    pub fn new<N, E, C>(next: N, error: E, complete: C) -> Self
    where
        N: Fn(T) + Send + Sync + 'static,
        E: Fn(StoreError) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        Self {
            on_next: Arc::new(next),
            on_error: Arc::new(error),
            on_complete: Arc::new(complete),
        }
    }

    /// An observer that only cares about values, ignoring error/complete.
    pub fn from_next<N>(next: N) -> Self
    where
        N: Fn(T) + Send + Sync + 'static,
    {
        Self::new(next, |_| {}, || {})
    }

    pub fn next(&self, value: T) {
        (self.on_next)(value);
    }

    pub fn error(&self, err: StoreError) {
        (self.on_error)(err);
    }

    pub fn complete(&self) {
        (self.on_complete)();
    }
}

/// A disposer for one subscription. Unlike `Drop`-cleanup guards elsewhere
/// in the ecosystem, this does *not* unsubscribe on drop — matching the
/// original source's `Subscription` objects, which are inert until
/// `.unsubscribe()` is called. Dropping one silently leaks the
/// subscription, so callers that want guaranteed cleanup must call
/// `unsubscribe` explicitly (`ControlledSubject` and `Store` always do,
/// internally, for every upstream source they own).
#[must_use = "a Subscription does nothing until unsubscribe() is called"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(dispose: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// A subscription with nothing to clean up (e.g. `Observable::never`).
    pub fn noop() -> Self {
        Self { dispose: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(d) = self.dispose.take() {
            d();
        }
    }
}

/// A cold observable: a function from `Observer<T>` to `Subscription`.
/// Calling `subscribe` runs the function, which may emit synchronously,
/// stash the observer for later emission, or both.
pub struct Observable<T> {
    subscribe_fn: Arc<dyn Fn(Observer<T>) -> Subscription + Send + Sync>,
}

impl<T: 'static> Observable<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Observer<T>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            subscribe_fn: Arc::new(f),
        }
    }

    pub fn subscribe(&self, observer: Observer<T>) -> Subscription {
        (self.subscribe_fn)(observer)
    }

    /// An observable that never emits and never completes. Used as the
    /// placeholder upstream for `add_state`, whose only purpose is to
    /// carry an initial value through the normal source machinery.
    pub fn never() -> Self
    where
        T: Send,
    {
        Self::new(|_observer: Observer<T>| Subscription::noop())
    }

    /// An observable that completes immediately without emitting.
    pub fn empty() -> Self
    where
        T: Send,
    {
        Self::new(|observer: Observer<T>| {
            observer.complete();
            Subscription::noop()
        })
    }

    /// An observable that emits `value` once, synchronously, then
    /// completes.
    pub fn of(value: T) -> Self
    where
        T: Clone + Send,
    {
        Self::new(move |observer: Observer<T>| {
            observer.next(value.clone());
            observer.complete();
            Subscription::noop()
        })
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe_fn: self.subscribe_fn.clone(),
        }
    }
}
