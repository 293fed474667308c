//! Source records: the immutable-shape descriptor attaching one input
//! stream to one controlled subject.

use crate::id::{InitialValue, Symbol};
use crate::observable::{Observable, Subscription};

/// A source-id is just a [`Symbol`]: for `add_behavior`'s own implicit
/// source the source-id equals the signal's own symbol; for reducers it
/// equals the triggering event's symbol; for `add_event_source` and
/// `connect` it is freshly minted.
pub type SourceId = Symbol;

/// Where a source record sits in the per-source subscription state
/// machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Not subscribed; eligible to become `Subscribed` once its
    /// laziness condition is met.
    Idle,
    /// A subscribe is in flight. This doubles as the re-entrancy guard:
    /// while in this state, a nested attempt to subscribe the same
    /// record (triggered synchronously from within the subscribe call
    /// itself, as happens in cyclic behavior graphs) is a no-op.
    Subscribing,
    /// The upstream subscription is live.
    Subscribed,
    /// Erased — explicit removal, upstream completion, or upstream
    /// error. A record in this state is about to be dropped from its
    /// owning subject's source set.
    Removed,
}

/// One input stream attached to one controlled subject.
pub struct SourceRecord<T> {
    pub id: SourceId,
    pub observable: Observable<T>,
    pub lazy: bool,
    pub initial: InitialValue<T>,
    pub state: SourceState,
    initial_consumed: bool,
    upstream: Option<Subscription>,
}

impl<T> SourceRecord<T> {
    pub fn new(id: SourceId, observable: Observable<T>, lazy: bool, initial: InitialValue<T>) -> Self {
        Self {
            id,
            observable,
            lazy,
            initial,
            state: SourceState::Idle,
            initial_consumed: false,
            upstream: None,
        }
    }

    /// Take the initial value for one-time emission, if present and not
    /// already consumed. Unlike a destructive take, the slot's
    /// configuration (`self.initial`) survives so `ResetHandle` can
    /// reconstruct an equivalent fresh record later.
    pub fn pending_initial(&mut self) -> Option<InitialValue<T>>
    where
        T: Clone,
    {
        if self.initial_consumed || self.initial.is_none() {
            None
        } else {
            self.initial_consumed = true;
            Some(self.initial.clone())
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.state == SourceState::Subscribed
    }

    pub fn store_upstream(&mut self, sub: Subscription) {
        self.upstream = Some(sub);
        self.state = SourceState::Subscribed;
    }

    /// Tear down the live upstream subscription, if any, and move back to
    /// `Idle`. A no-op if nothing is currently subscribed (idempotent, as
    /// `remove-source` requires).
    pub fn unsubscribe_upstream(&mut self) {
        if let Some(sub) = self.upstream.take() {
            sub.unsubscribe();
        }
        if self.state != SourceState::Removed {
            self.state = SourceState::Idle;
        }
    }
}
