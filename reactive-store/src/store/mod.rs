//! The store: the public façade over the registries, the reducer/state
//! mechanism, and the parent/child hierarchy.
//!
//! A `Store` owns two identifier-addressed registries of
//! [`ControlledSubject`]s — `behaviors` and `events` — lazily populated on
//! first reference, plus a [`DelayedEventQueue`] shared with every
//! descendant store created via [`Store::create_child_store`].

mod fanout;
mod parent_child;

pub use fanout::FanOutHandle;

use crate::effect::EffectFn;
use crate::error::{StoreError, StoreResult};
use crate::id::{BehaviorId, EffectId, EventId, InitialValue, SignalId, SignalKind, SignalRef, StateId, Symbol};
use crate::observable::{Observable, Observer};
use crate::queue::{DelayedEventQueue, DispatchCompletion};
use crate::source::{SourceId, SourceRecord};
use crate::subject::{ControlledSubject, DynSubject, SubjectKind};

use dashmap::DashMap;
use std::sync::Arc;

/// A registry mutation: a signal was referenced (get-or-add) for the
/// first time. Exposed so descendant stores and diagnostics tooling can
/// react without polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Added { kind: SignalKind, symbol: Symbol },
}

/// Construction-time options for a [`Store`]: a diagnostic name and
/// capacity hints for the two registries and the delayed queue.
#[derive(Debug, Clone)]
pub struct StoreBuilder {
    name: Option<String>,
    behavior_capacity: usize,
    event_capacity: usize,
    queue_capacity: usize,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self {
            name: None,
            behavior_capacity: 16,
            event_capacity: 16,
            queue_capacity: 16,
        }
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn behavior_capacity(mut self, capacity: usize) -> Self {
        self.behavior_capacity = capacity;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Store {
        let queue = DelayedEventQueue::with_capacity(self.queue_capacity.max(1));
        Store::from_builder(self, queue, None)
    }
}

struct StoreInner {
    name: Option<String>,
    behaviors: DashMap<Symbol, Box<dyn DynSubject>>,
    events: DashMap<Symbol, Box<dyn DynSubject>>,
    names: DashMap<Symbol, String>,
    source_owner: DashMap<Symbol, Symbol>,
    queue: DelayedEventQueue,
    parent: Option<Store>,
    registry_events: Arc<ControlledSubject<RegistryEvent>>,
}

/// The public façade of the reactive signal store.
///
/// Cheap to clone: a `Store` is a thin `Arc` wrapper, so `create_child_store`,
/// storing a `Store` inside closures, and passing one to an effect all
/// share the same underlying registries and queue as intended.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        StoreBuilder::default().build()
    }

    fn from_builder(builder: StoreBuilder, queue: DelayedEventQueue, parent: Option<Store>) -> Self {
        let registry_events = ControlledSubject::new(Symbol::fresh(), SubjectKind::Event, queue.clone());
        Self {
            inner: Arc::new(StoreInner {
                name: builder.name,
                behaviors: DashMap::with_capacity(builder.behavior_capacity),
                events: DashMap::with_capacity(builder.event_capacity),
                names: DashMap::new(),
                source_owner: DashMap::new(),
                queue,
                parent,
                registry_events,
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// A stream of registry insertions: fires once per signal the first
    /// time it is referenced (via any `get`/`add` call), never again for
    /// the same symbol.
    pub fn registry_events(&self) -> Observable<RegistryEvent> {
        self.inner.registry_events.observable()
    }

    // ---- registry access -------------------------------------------------

    fn validate<T>(&self, id: &SignalId<T>, operation: &'static str) -> StoreResult<()> {
        if id.is_valid() {
            Ok(())
        } else {
            Err(StoreError::InvalidIdentifier { operation })
        }
    }

    fn get_or_insert<T>(
        &self,
        registry: &DashMap<Symbol, Box<dyn DynSubject>>,
        id: Symbol,
        kind_tag: SignalKind,
    ) -> StoreResult<Arc<ControlledSubject<T>>>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        let subject_kind = if kind_tag.is_event() {
            SubjectKind::Event
        } else {
            SubjectKind::Behavior
        };

        let is_new = !registry.contains_key(&id);
        let entry = registry
            .entry(id)
            .or_insert_with(|| Box::new(ControlledSubject::<T>::new(id, subject_kind, self.inner.queue.clone())) as Box<dyn DynSubject>);

        let subject = entry
            .as_any()
            .downcast_ref::<Arc<ControlledSubject<T>>>()
            .cloned()
            .ok_or(StoreError::SignalTypeMismatch { symbol: id })?;
        drop(entry);

        if is_new {
            self.inner
                .registry_events
                .next(RegistryEvent::Added { kind: kind_tag, symbol: id });
        }
        Ok(subject)
    }

    fn behavior_subject<T>(&self, id: Symbol) -> StoreResult<Arc<ControlledSubject<T>>>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.get_or_insert(&self.inner.behaviors, id, SignalKind::Behavior)
    }

    fn event_subject<T>(&self, id: Symbol) -> StoreResult<Arc<ControlledSubject<T>>>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.get_or_insert(&self.inner.events, id, SignalKind::Event)
    }

    fn subject_for<T>(&self, id: &SignalId<T>) -> StoreResult<Arc<ControlledSubject<T>>>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        if id.kind().is_event() {
            self.event_subject(id.symbol())
        } else {
            self.behavior_subject(id.symbol())
        }
    }

    // ---- behaviors / state -------------------------------------------------

    /// Attaches `source` to the behavior `id`, as either its lazy or
    /// eager implicit source. Fails with `DuplicateBehaviorSource` if the
    /// pair `(id, source-id=id)` already exists.
    pub fn add_behavior<T>(
        &self,
        id: BehaviorId<T>,
        source: Observable<T>,
        lazy: bool,
        initial: InitialValue<T>,
    ) -> StoreResult<()>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.validate(&id, "add_behavior")?;
        let subject = self.behavior_subject::<T>(id.symbol())?;
        if subject.has_source(id.symbol()) {
            return Err(StoreError::DuplicateBehaviorSource { symbol: id.symbol() });
        }
        subject
            .add_source(SourceRecord::new(id.symbol(), source, lazy, initial))
            .map_err(|_| StoreError::DuplicateBehaviorSource { symbol: id.symbol() })
    }

    /// `add-derived-state(id, source, initial?)`: `add_behavior` with
    /// `lazy = true`.
    pub fn add_derived_state<T>(&self, id: StateId<T>, source: Observable<T>, initial: InitialValue<T>) -> StoreResult<()>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.add_behavior(id, source, true, initial)
    }

    /// `add-state(id, initial)`: `add_behavior` with `lazy = false` and no
    /// upstream source, i.e. the identity of the state is entirely its
    /// initial value and whatever reducers attach afterward.
    pub fn add_state<T>(&self, id: StateId<T>, initial: T) -> StoreResult<()>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.add_behavior(id, Observable::never(), false, InitialValue::value(initial))
    }

    /// Pre-unification alias: `addStatelessBehavior`, always lazy.
    pub fn add_stateless_behavior<T>(&self, id: BehaviorId<T>, source: Observable<T>, initial: InitialValue<T>) -> StoreResult<()>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.add_behavior(id, source, true, initial)
    }

    /// Pre-unification alias: `addStatefulBehavior`, always eager.
    pub fn add_stateful_behavior<T>(&self, id: BehaviorId<T>, source: Observable<T>, initial: InitialValue<T>) -> StoreResult<()>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.add_behavior(id, source, false, initial)
    }

    /// Returns the downstream stream for behavior `id`. On a store with a
    /// parent, the returned stream switches between the child's own
    /// subject and the parent's `get_behavior`, re-evaluated on every
    /// source-count change (see `parent_child::delegating_behavior`).
    pub fn get_behavior<T>(&self, id: BehaviorId<T>) -> StoreResult<Observable<T>>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.validate(&id, "get_behavior")?;
        let own = self.behavior_subject::<T>(id.symbol())?;
        match &self.inner.parent {
            Some(parent) => {
                let parent_obs = parent.get_behavior(id)?;
                Ok(parent_child::delegating_behavior(own, parent_obs))
            }
            None => Ok(own.observable()),
        }
    }

    // ---- reducers -----------------------------------------------------------

    /// Attaches a derived, non-lazy source to `state`'s controlled
    /// subject whose source-id is `event`'s symbol, implementing
    /// `events(event).withLatestFrom(state).map(reducer)`. At most one
    /// reducer per `(state, event)` pair; a second attempt fails with
    /// `DuplicateSource`.
    pub fn add_reducer<S, E, F>(&self, state_id: StateId<S>, event_id: EventId<E>, reducer: F) -> StoreResult<()>
    where
        S: Clone + Send + Sync + PartialEq + 'static,
        E: Clone + Send + Sync + PartialEq + 'static,
        F: Fn(S, E) -> S + Send + Sync + 'static,
    {
        self.validate(&state_id, "add_reducer")?;
        self.validate(&event_id, "add_reducer")?;
        let state_subject = self.behavior_subject::<S>(state_id.symbol())?;
        let event_subject = self.event_subject::<E>(event_id.symbol())?;
        let reducer = Arc::new(reducer);

        let source_for_state = state_subject.clone();
        let source_obs: Observable<S> = Observable::new(move |observer: Observer<S>| {
            let state_ref = source_for_state.clone();
            let reducer = reducer.clone();
            event_subject.observable().subscribe(Observer::new(
                move |event_value: E| {
                    if let Some(current) = state_ref.current_value() {
                        observer.next(reducer(current, event_value));
                    }
                },
                |_| {},
                || {},
            ))
        });

        state_subject
            .add_source(SourceRecord::new(event_id.symbol(), source_obs, false, InitialValue::none()))
            .map_err(|e| {
                tracing::debug!(state = %state_id.symbol(), event = %event_id.symbol(), "reducer already attached");
                e
            })
    }

    /// `remove-reducer(state-id, event-id)`.
    pub fn remove_reducer<S, E>(&self, state_id: StateId<S>, event_id: EventId<E>) -> StoreResult<()>
    where
        S: Clone + Send + Sync + PartialEq + 'static,
    {
        self.validate(&state_id, "remove_reducer")?;
        let state_subject = self.behavior_subject::<S>(state_id.symbol())?;
        if !state_subject.has_source(event_id.symbol()) {
            return Err(StoreError::UnknownSource {
                target: state_id.symbol(),
                source: event_id.symbol(),
            });
        }
        state_subject.remove_source(event_id.symbol());
        Ok(())
    }

    // ---- connect --------------------------------------------------------

    /// Wires `source`'s observable into `target`. `lazy` defaults to
    /// `true` when the source is a behavior and `false` when it is an
    /// event. Returns `Some(source_id)` when the target is an event (a
    /// fresh, removable id); `None` when the target is a behavior (no
    /// separately removable id, and the target must not already carry any
    /// source).
    pub fn connect<T>(&self, source: SignalRef<T>, target: SignalRef<T>, lazy: Option<bool>) -> StoreResult<Option<SourceId>>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        let source_obs = match source {
            SignalRef::Behavior(id) => {
                self.validate(&id, "connect")?;
                self.behavior_subject::<T>(id.symbol())?.observable()
            }
            SignalRef::Event(id) => {
                self.validate(&id, "connect")?;
                self.event_subject::<T>(id.symbol())?.observable()
            }
        };
        let default_lazy = !source.is_event();
        let lazy = lazy.unwrap_or(default_lazy);

        match target {
            SignalRef::Event(id) => {
                self.validate(&id, "connect")?;
                let subject = self.event_subject::<T>(id.symbol())?;
                let source_id = Symbol::fresh();
                subject.add_source(SourceRecord::new(source_id, source_obs, lazy, InitialValue::none()))?;
                self.inner.source_owner.insert(source_id, id.symbol());
                Ok(Some(source_id))
            }
            SignalRef::Behavior(id) => {
                self.validate(&id, "connect")?;
                let subject = self.behavior_subject::<T>(id.symbol())?;
                if subject.source_count() > 0 {
                    return Err(StoreError::DuplicateBehaviorSource { symbol: id.symbol() });
                }
                subject.add_source(SourceRecord::new(id.symbol(), source_obs, lazy, InitialValue::none()))?;
                Ok(None)
            }
        }
    }

    // ---- events -----------------------------------------------------------

    /// Dispatches `value` on `event_id`. Invokes `next` only if the event
    /// currently has at least one observer; otherwise resolves `false`
    /// immediately without ever touching the subject, so a value is never
    /// buffered for a future subscriber.
    pub fn dispatch<T>(&self, event_id: EventId<T>, value: T) -> StoreResult<DispatchCompletion>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.validate(&event_id, "dispatch")?;
        let subject = self.event_subject::<T>(event_id.symbol())?;
        if !subject.is_observable_subscribed() {
            return Ok(DispatchCompletion::ready(false));
        }

        subject.next(value);

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.inner.queue.schedule(move || {
            let _ = tx.send(true);
        });
        Ok(DispatchCompletion::pending(rx))
    }

    /// Attaches a fresh, lazy upstream observable to the event `event_id`.
    pub fn add_event_source<T>(&self, event_id: EventId<T>, observable: Observable<T>) -> StoreResult<SourceId>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.validate(&event_id, "add_event_source")?;
        let subject = self.event_subject::<T>(event_id.symbol())?;
        let source_id = Symbol::fresh();
        subject.add_source(SourceRecord::new(source_id, observable, true, InitialValue::none()))?;
        self.inner.source_owner.insert(source_id, event_id.symbol());
        Ok(source_id)
    }

    /// Fans a single upstream out to N event ids. `upstream` emits
    /// `(Symbol, T)` pairs tagged by which of `event_ids` they belong to,
    /// routed to the matching event subject.
    /// When `gate` names an event id, the single shared upstream
    /// subscription tracks only that id's observer count, independent of
    /// the N per-id routes' own subscription state.
    pub fn add_n_typed_event_source<T>(
        &self,
        event_ids: &[EventId<T>],
        upstream: Observable<(Symbol, T)>,
        gate: Option<Symbol>,
    ) -> StoreResult<FanOutHandle>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        for id in event_ids {
            self.validate(id, "add_n_typed_event_source")?;
        }

        let gate_obs = match gate {
            Some(gate_symbol) => {
                let entry = self
                    .inner
                    .events
                    .get(&gate_symbol)
                    .ok_or(StoreError::UnknownSignal { symbol: gate_symbol })?;
                let boxed = entry.is_subscribed_observable();
                drop(entry);
                let obs = match boxed.downcast::<Observable<bool>>() {
                    Ok(obs) => *obs,
                    Err(_) => unreachable!("is_subscribed_observable always yields Observable<bool>"),
                };
                Some(obs)
            }
            None => None,
        };

        let core = fanout::FanOutCore::new(upstream, gate_obs, event_ids.len());
        let mut ids = Vec::with_capacity(event_ids.len());

        for event_id in event_ids {
            let subject = self.event_subject::<T>(event_id.symbol())?;
            let source_id = Symbol::fresh();
            let target_symbol = event_id.symbol();
            let core_for_source = core.clone();
            let route_obs: Observable<T> = Observable::new(move |observer: Observer<T>| {
                core_for_source.register(target_symbol, observer)
            });
            subject.add_source(SourceRecord::new(source_id, route_obs, false, InitialValue::none()))?;
            self.inner.source_owner.insert(source_id, target_symbol);
            ids.push(source_id);
        }

        Ok(FanOutHandle { ids })
    }

    /// `remove-event-source(source-id)`: removes the given source from
    /// whichever event subject carries it, wherever it was minted by
    /// `add_event_source`, `add_n_typed_event_source`, or `connect`.
    pub fn remove_event_source(&self, source_id: SourceId) -> StoreResult<()> {
        let owner = self
            .inner
            .source_owner
            .remove(&source_id)
            .map(|(_, owner)| owner)
            .ok_or(StoreError::UnknownSource {
                target: Symbol::INVALID,
                source: source_id,
            })?;
        if let Some(subject) = self.inner.events.get(&owner) {
            subject.remove_source(source_id);
        }
        Ok(())
    }

    /// Returns the downstream stream for event `id`. On a store with a
    /// parent, the returned stream merges the child's own event subject
    /// with the parent's merged stream (recursively).
    pub fn get_event_stream<T>(&self, id: EventId<T>) -> StoreResult<Observable<T>>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.validate(&id, "get_event_stream")?;
        let own = self.event_subject::<T>(id.symbol())?.observable();
        match &self.inner.parent {
            Some(parent) => {
                let parent_obs = parent.get_event_stream(id)?;
                Ok(parent_child::merged_events(own, Some(parent_obs)))
            }
            None => Ok(own),
        }
    }

    // ---- reset / completion -------------------------------------------------

    /// Obtains a reset handle from every behavior, removes all their
    /// sources, then re-adds them, in two passes so no derived behavior
    /// observes a half-reset sibling.
    pub fn reset_behaviors(&self) {
        let mut handles: Vec<_> = self.inner.behaviors.iter().map(|e| e.value().reset_handle()).collect();
        for handle in handles.iter_mut() {
            handle.remove_sources();
        }
        for handle in handles.iter_mut() {
            handle.readd_sources();
        }
    }

    /// `complete-behavior(id)`: drains sources, completes the subject, and
    /// deregisters it — a later reference to the same id starts fresh.
    pub fn complete_behavior<T>(&self, id: BehaviorId<T>) -> StoreResult<()>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.validate(&id, "complete_behavior")?;
        if let Some((_, entry)) = self.inner.behaviors.remove(&id.symbol()) {
            entry.remove_all_sources();
            entry.complete();
        }
        Ok(())
    }

    /// The only guaranteed way to release every upstream subscription
    /// this store owns — invoke at store teardown.
    pub fn complete_all_signals(&self) {
        for entry in self.inner.behaviors.iter() {
            entry.value().remove_all_sources();
            entry.value().complete();
        }
        self.inner.behaviors.clear();
        for entry in self.inner.events.iter() {
            entry.value().remove_all_sources();
            entry.value().complete();
        }
        self.inner.events.clear();
        self.inner.source_owner.clear();
    }

    // ---- effects -----------------------------------------------------------

    /// `add-effect(effect-id, fn)`: stores `fn` as the value of a
    /// `State`-kind behavior. An effect is otherwise just a value.
    pub fn add_effect<In, Out>(&self, effect_id: EffectId<EffectFn<In, Out>>, func: EffectFn<In, Out>) -> StoreResult<()>
    where
        In: Send + Sync + 'static,
        Out: Send + Sync + 'static,
    {
        self.validate(&effect_id, "add_effect")?;
        let state_id: StateId<EffectFn<In, Out>> = effect_id.retag(SignalKind::State);
        self.add_state(state_id, func)
    }

    /// `get-effect(effect-id)`: the behavior stream carrying the effect
    /// value (in practice a single emission, since effects are never
    /// reassigned).
    pub fn get_effect<In, Out>(&self, effect_id: EffectId<EffectFn<In, Out>>) -> StoreResult<Observable<EffectFn<In, Out>>>
    where
        In: Send + Sync + 'static,
        Out: Send + Sync + 'static,
    {
        let state_id: StateId<EffectFn<In, Out>> = effect_id.retag(SignalKind::State);
        self.get_behavior(state_id)
    }

    // ---- parent / child -----------------------------------------------------

    /// `create-child-store()`: a fresh store whose parent is `self` and
    /// which shares `self`'s delayed event queue.
    pub fn create_child_store(&self) -> Store {
        Store::from_builder(StoreBuilder::default(), self.inner.queue.clone(), Some(self.clone()))
    }

    pub fn get_parent_store(&self) -> Option<Store> {
        self.inner.parent.clone()
    }

    pub fn get_root_store(&self) -> Store {
        let mut current = self.clone();
        while let Some(parent) = current.get_parent_store() {
            current = parent;
        }
        current
    }

    // ---- introspection -------------------------------------------------

    pub fn is_subscribed<T>(&self, id: SignalId<T>) -> StoreResult<bool>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.validate(&id, "is_subscribed")?;
        Ok(self.subject_for(&id)?.is_observable_subscribed())
    }

    pub fn is_subscribed_observable<T>(&self, id: SignalId<T>) -> StoreResult<Observable<bool>>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.validate(&id, "is_subscribed_observable")?;
        Ok(self.subject_for(&id)?.is_subscribed_observable())
    }

    pub fn source_count<T>(&self, id: SignalId<T>) -> StoreResult<usize>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.validate(&id, "source_count")?;
        Ok(self.subject_for(&id)?.source_count())
    }

    pub fn set_name<T>(&self, id: SignalId<T>, name: impl Into<String>) {
        self.inner.names.insert(id.symbol(), name.into());
    }

    pub fn get_name<T>(&self, id: SignalId<T>) -> Option<String> {
        self.inner.names.get(&id.symbol()).map(|n| n.clone())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SignalId;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn add_behavior_twice_is_duplicate_behavior_source() {
        let store = Store::new();
        let id: BehaviorId<i32> = SignalId::state();
        store.add_state(id, 1).unwrap();
        let err = store.add_state(id, 2).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateBehaviorSource { .. }));
    }

    #[test]
    fn state_behavior_replays_initial_value() {
        let store = Store::new();
        let id: StateId<i32> = SignalId::state();
        store.add_state(id, 7).unwrap();

        let seen = Arc::new(AtomicI32::new(-1));
        let seen2 = seen.clone();
        let _sub = store
            .get_behavior(id)
            .unwrap()
            .subscribe(Observer::from_next(move |v| seen2.store(v, Ordering::SeqCst)));
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn dispatch_without_observer_resolves_false() {
        let store = Store::new();
        let event: EventId<i32> = SignalId::event();
        let completion = store.dispatch(event, 1).unwrap();
        assert!(!futures_lite_block_on(completion));
    }

    #[test]
    fn reducer_folds_dispatches_even_while_unsubscribed() {
        let store = Store::new();
        let counter: StateId<i32> = SignalId::state();
        let inc: EventId<()> = SignalId::event();
        store.add_state(counter, 0).unwrap();
        store.add_reducer(counter, inc, |s, _| s + 1).unwrap();

        futures_lite_block_on(store.dispatch(inc, ()).unwrap());
        futures_lite_block_on(store.dispatch(inc, ()).unwrap());
        futures_lite_block_on(store.dispatch(inc, ()).unwrap());

        let seen = Arc::new(AtomicI32::new(-1));
        let seen2 = seen.clone();
        let _sub = store
            .get_behavior(counter)
            .unwrap()
            .subscribe(Observer::from_next(move |v| seen2.store(v, Ordering::SeqCst)));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    /// Tiny single-threaded block-on so unit tests don't need a tokio
    /// runtime for a future that, in this synchronous-drain queue, is
    /// already resolved by the time it's first polled.
    fn futures_lite_block_on<F: std::future::Future>(mut fut: F) -> F::Output {
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        let waker = unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) };
        let mut cx = Context::from_waker(&waker);

        let mut fut = unsafe { std::pin::Pin::new_unchecked(&mut fut) };
        loop {
            if let Poll::Ready(v) = fut.as_mut().poll(&mut cx) {
                return v;
            }
        }
    }
}
