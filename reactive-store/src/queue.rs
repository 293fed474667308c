//! The delayed event queue: a FIFO that defers event deliveries by one
//! cooperative turn so synchronous reducer chains cannot reorder events.
//!
//! This requires two guarantees:
//!
//! 1. an item scheduled while the queue is draining is appended, not
//!    interleaved;
//! 2. an item scheduled inside a subscriber callback of a prior item is
//!    observed *after* any items already queued at the time of that
//!    callback.
//!
//! Both fall out of a plain FIFO drained by whichever call to `schedule`
//! finds the queue idle: that call pops and runs items one at a time,
//! including any appended mid-drain by the very callbacks it is running,
//! until the queue is empty. A callback can never "jump the line" ahead of
//! items that were already queued before it ran.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Job = Box<dyn FnOnce() + Send>;

struct Inner {
    pending: Mutex<VecDeque<Job>>,
    draining: AtomicBool,
}

/// A FIFO shared by a store and all of its descendants.
#[derive(Clone)]
pub struct DelayedEventQueue {
    inner: Arc<Inner>,
}

impl DelayedEventQueue {
    pub fn new() -> Self {
        Self::with_capacity(16)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(VecDeque::with_capacity(capacity)),
                draining: AtomicBool::new(false),
            }),
        }
    }

    /// Place `f` at the tail of the queue. If no drain is currently in
    /// progress, this call becomes the drain loop and runs jobs — this
    /// one and any enqueued by it — until the queue is empty.
    pub fn schedule<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.pending.lock().push_back(Box::new(f));
        self.drain_if_idle();
    }

    fn drain_if_idle(&self) {
        if self.inner.draining.swap(true, Ordering::AcqRel) {
            // Some frame further up the call stack already owns the
            // drain loop; it will reach the job we just pushed.
            return;
        }

        loop {
            let next = self.inner.pending.lock().pop_front();
            match next {
                Some(job) => job(),
                None => break,
            }
        }

        self.inner.draining.store(false, Ordering::Release);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

impl Default for DelayedEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The future returned by `Store::dispatch`. Resolves to `true` once the
/// dispatched value has been delivered through the queue to every
/// observer that was subscribed at dispatch time, or immediately to
/// `false` if the event had no observers (in which case nothing was ever
/// enqueued).
pub struct DispatchCompletion {
    receiver: Option<tokio::sync::oneshot::Receiver<bool>>,
    immediate: Option<bool>,
}

impl DispatchCompletion {
    pub(crate) fn pending(receiver: tokio::sync::oneshot::Receiver<bool>) -> Self {
        Self {
            receiver: Some(receiver),
            immediate: None,
        }
    }

    pub(crate) fn ready(value: bool) -> Self {
        Self {
            receiver: None,
            immediate: Some(value),
        }
    }
}

impl std::future::Future for DispatchCompletion {
    type Output = bool;

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<bool> {
        use std::future::Future;

        if let Some(v) = self.immediate.take() {
            return std::task::Poll::Ready(v);
        }

        let receiver = self
            .receiver
            .as_mut()
            .expect("DispatchCompletion polled after completion");

        match std::pin::Pin::new(receiver).poll(cx) {
            std::task::Poll::Ready(Ok(v)) => std::task::Poll::Ready(v),
            // The sender was dropped without sending, which only happens
            // if the scheduled delivery job panicked. Treat that as "not
            // delivered".
            std::task::Poll::Ready(Err(_)) => std::task::Poll::Ready(false),
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}
