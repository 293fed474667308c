//! The two delegation shapes a child store layers over its parent.
//!
//! Behaviors delegate by *switching*: a child subscriber observes its own
//! subject once the child has attached at least one source, otherwise the
//! parent's stream. Once a child has ever been sourced it stays cut over
//! for good — it never switches back just because that source later
//! completes. Events delegate by *merging*: a child subscriber observes
//! both its own subject and the parent's merged stream (recursively) at
//! once, since a dispatch on either side is meaningful to a child
//! observer.

use crate::observable::{Observable, Observer, Subscription};
use crate::subject::ControlledSubject;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Builds the switching behavior stream: if the child's own subject has
/// at least one source, subscribe it; else delegate to the parent's
/// `get_behavior`.
///
/// The switch is driven by `own`'s `source_count_observable` (which fires
/// immediately on subscribe, giving the initial routing decision for
/// free), but `source_count_observable` is a *live* signal — it reports
/// the same transient zero a one-shot source produces the instant it
/// completes and is torn down (`on_source_complete` -> `remove_source` ->
/// a reentrant notification, synchronously, from inside the very
/// `subscribe` call this function makes to switch onto `own` in the
/// first place). Switching back to the parent on that transient zero
/// would replay the parent's stale cached value right after the child's
/// own value, instead of staying put. `latched` turns the child-source
/// condition into a one-way gate: once the child has ever carried a
/// source, this stream stays on `own` for good, matching spec's "child
/// adds its own source... cuts the child over... without a
/// re-subscribe" — cutting over is not expected to cut back.
pub(crate) fn delegating_behavior<T>(own: Arc<ControlledSubject<T>>, parent: Observable<T>) -> Observable<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    Observable::new(move |observer: Observer<T>| {
        let own = own.clone();
        let parent = parent.clone();
        let active: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let latched = Arc::new(AtomicBool::new(false));
        let routed_to_parent = Arc::new(AtomicBool::new(false));

        let own_for_switch = own.clone();
        let parent_for_switch = parent.clone();
        let active_for_switch = active.clone();
        let observer_for_switch = observer.clone();
        let latched_for_switch = latched.clone();
        let routed_to_parent_for_switch = routed_to_parent.clone();
        let count_sub = own.source_count_observable().subscribe(Observer::from_next(move |count: usize| {
            if latched_for_switch.load(Ordering::Acquire) {
                // Already committed to `own`; a source completing and
                // being torn down reports a transient zero here, but it
                // must not cut back to the parent.
                return;
            }

            let want_own = count > 0;
            if want_own {
                // Set *before* subscribing below: the subscribe call can
                // synchronously drive this very watcher again (a source
                // that fires once and completes immediately), and that
                // reentrant call must see the gate already closed.
                latched_for_switch.store(true, Ordering::Release);
            } else if routed_to_parent_for_switch.swap(true, Ordering::AcqRel) {
                // Already delegating to the parent and still unsourced —
                // nothing changed, and resubscribing would replay the
                // parent's last value a second time.
                return;
            }

            let forward = observer_for_switch.clone();
            let forward_err = observer_for_switch.clone();
            let forward_complete = observer_for_switch.clone();
            let new_sub = if want_own {
                own_for_switch.observable().subscribe(Observer::new(
                    move |v| forward.next(v),
                    move |e| forward_err.error(e),
                    move || forward_complete.complete(),
                ))
            } else {
                parent_for_switch.subscribe(Observer::new(
                    move |v| forward.next(v),
                    move |e| forward_err.error(e),
                    move || forward_complete.complete(),
                ))
            };

            let mut guard = active_for_switch.lock();
            if let Some(old) = guard.take() {
                old.unsubscribe();
            }
            *guard = Some(new_sub);
        }));

        Subscription::new(move || {
            count_sub.unsubscribe();
            if let Some(s) = active.lock().take() {
                s.unsubscribe();
            }
        })
    })
}

/// Builds the merged event stream: the child's own event stream merged
/// with the parent's (recursively). Dispatch on either side is observed;
/// nothing is delegated away.
pub(crate) fn merged_events<T>(own: Observable<T>, parent: Option<Observable<T>>) -> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    let Some(parent) = parent else {
        return own;
    };

    Observable::new(move |observer: Observer<T>| {
        let own_next = observer.clone();
        let own_sub = own.subscribe(Observer::from_next(move |v| own_next.next(v)));

        let parent_next = observer.clone();
        let parent_sub = parent.subscribe(Observer::from_next(move |v| parent_next.next(v)));

        Subscription::new(move || {
            own_sub.unsubscribe();
            parent_sub.unsubscribe();
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{InitialValue, Symbol};
    use crate::queue::DelayedEventQueue;
    use crate::source::SourceRecord;
    use crate::subject::SubjectKind;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn delegates_to_parent_until_child_gets_a_source() {
        let queue = DelayedEventQueue::new();
        let parent_subject: Arc<ControlledSubject<i32>> =
            ControlledSubject::new(Symbol::fresh(), SubjectKind::Behavior, queue.clone());
        parent_subject.next(5);

        let child_subject: Arc<ControlledSubject<i32>> =
            ControlledSubject::new(Symbol::fresh(), SubjectKind::Behavior, queue.clone());

        let seen = Arc::new(AtomicI32::new(-1));
        let seen2 = seen.clone();
        let stream = delegating_behavior(child_subject.clone(), parent_subject.observable());
        let _sub = stream.subscribe(Observer::from_next(move |v| seen2.store(v, Ordering::SeqCst)));
        assert_eq!(seen.load(Ordering::SeqCst), 5);

        child_subject
            .add_source(SourceRecord::new(
                Symbol::fresh(),
                crate::observable::Observable::of(6),
                false,
                InitialValue::none(),
            ))
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn merges_own_and_parent_events() {
        let queue = DelayedEventQueue::new();
        let parent_subject: Arc<ControlledSubject<i32>> =
            ControlledSubject::new(Symbol::fresh(), SubjectKind::Event, queue.clone());
        let child_subject: Arc<ControlledSubject<i32>> =
            ControlledSubject::new(Symbol::fresh(), SubjectKind::Event, queue.clone());

        let seen: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let stream = merged_events(child_subject.observable(), Some(parent_subject.observable()));
        let _sub = stream.subscribe(Observer::from_next(move |v| seen2.lock().push(v)));

        parent_subject.next(1);
        child_subject.next(2);

        assert_eq!(*seen.lock(), vec![1, 2]);
    }
}
