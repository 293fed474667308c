//! Signal identifiers.
//!
//! An identifier is an opaque handle: a process-unique [`Symbol`] for
//! equality/lookup, a compile-time phantom type, and a [`SignalKind`]
//! discriminator. Identity is the symbol alone — two identifiers with the
//! same symbol are the same identifier regardless of how many times the
//! handle has been cloned.
//!
//! `State` and `Derived` are sub-kinds of `Behavior`: they live in the same
//! registry and are distinguished only for diagnostics (`Debug`, `name()`).
//! `Effect` aliases `Behavior` the same way, since an effect is just a
//! behavior whose value happens to be a function.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// A process-unique symbol underlying every [`SignalId`].
///
/// Generated from a single global counter (`AtomicU64` + `fetch_add`),
/// the same idiom used for subscriber/observer/watcher ids elsewhere in
/// this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u64);

impl Symbol {
    /// The sentinel symbol used by `SignalId::default()`. No call to
    /// [`Symbol::fresh`] ever produces this value, so it can be used to
    /// detect an identifier that was never properly constructed.
    pub const INVALID: Symbol = Symbol(u64::MAX);

    /// Mint a fresh, never-before-used symbol.
    pub fn fresh() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Symbol(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_valid(self) -> bool {
        self != Symbol::INVALID
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            write!(f, "#<invalid>")
        }
    }
}

/// Discriminator tag carried by every [`SignalId`].
///
/// `State` and `Derived` both register in the *behaviors* registry;
/// `Effect` does too. Only `Event` lives in the *events* registry. The
/// distinction beyond "does this go in behaviors or events" exists purely
/// for diagnostics — see [`SignalKind::is_behavior_like`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Behavior,
    State,
    Derived,
    Event,
    Effect,
}

impl SignalKind {
    pub fn is_behavior_like(self) -> bool {
        !matches!(self, SignalKind::Event)
    }

    pub fn is_event(self) -> bool {
        matches!(self, SignalKind::Event)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalKind::Behavior => "behavior",
            SignalKind::State => "state",
            SignalKind::Derived => "derived",
            SignalKind::Event => "event",
            SignalKind::Effect => "effect",
        };
        f.write_str(s)
    }
}

/// An opaque, typed handle to a signal (behavior or event) in a [`Store`].
///
/// [`Store`]: crate::store::Store
pub struct SignalId<T> {
    symbol: Symbol,
    kind: SignalKind,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SignalId<T> {
    fn new(kind: SignalKind) -> Self {
        Self {
            symbol: Symbol::fresh(),
            kind,
            _marker: PhantomData,
        }
    }

    pub fn behavior() -> Self {
        Self::new(SignalKind::Behavior)
    }

    pub fn state() -> Self {
        Self::new(SignalKind::State)
    }

    pub fn derived() -> Self {
        Self::new(SignalKind::Derived)
    }

    pub fn event() -> Self {
        Self::new(SignalKind::Event)
    }

    pub fn effect() -> Self {
        Self::new(SignalKind::Effect)
    }

    /// An identifier that was never bound to anything. Every store
    /// operation rejects this with `StoreError::InvalidIdentifier`, giving
    /// that error kind a concrete, reachable cause in a language with no
    /// null.
    pub fn invalid() -> Self {
        Self {
            symbol: Symbol::INVALID,
            kind: SignalKind::Behavior,
            _marker: PhantomData,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.symbol.is_valid()
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Reinterpret this identifier with a different kind tag but the same
    /// symbol. Used internally to view an `Effect` id as the `Behavior` id
    /// that actually backs it in the registry.
    pub(crate) fn retag(&self, kind: SignalKind) -> Self {
        Self {
            symbol: self.symbol,
            kind,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for SignalId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SignalId<T> {}

impl<T> PartialEq for SignalId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl<T> Eq for SignalId<T> {}

impl<T> std::hash::Hash for SignalId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
    }
}

impl<T> Default for SignalId<T> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<T> fmt::Debug for SignalId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalId")
            .field("kind", &self.kind)
            .field("symbol", &self.symbol)
            .finish()
    }
}

pub type BehaviorId<T> = SignalId<T>;
pub type StateId<T> = SignalId<T>;
pub type DerivedId<T> = SignalId<T>;
pub type EventId<T> = SignalId<T>;
pub type EffectId<T> = SignalId<T>;

/// A reference to either a behavior or an event, used where the source or
/// target of an operation (notably `connect`) can be either kind.
#[derive(Debug)]
pub enum SignalRef<T> {
    Behavior(BehaviorId<T>),
    Event(EventId<T>),
}

impl<T> SignalRef<T> {
    pub fn symbol(&self) -> Symbol {
        match self {
            SignalRef::Behavior(id) => id.symbol(),
            SignalRef::Event(id) => id.symbol(),
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, SignalRef::Event(_))
    }
}

impl<T> Clone for SignalRef<T> {
    fn clone(&self) -> Self {
        match self {
            SignalRef::Behavior(id) => SignalRef::Behavior(*id),
            SignalRef::Event(id) => SignalRef::Event(*id),
        }
    }
}

impl<T> Copy for SignalRef<T> {}

/// The value held in a source record's "initial value" slot.
///
/// `None` is the `NO_VALUE` sentinel: it means "do not emit an initial
/// value", and is distinguishable from every user value because it is a
/// separate enum variant rather than a magic constant.
pub enum InitialValue<T> {
    /// A ready-made value, emitted once per the replay rules in
    /// `ControlledSubject`.
    Value(T),
    /// A zero-argument getter, evaluated lazily at the moment the initial
    /// value would be emitted (not at construction time).
    Getter(std::sync::Arc<dyn Fn() -> T + Send + Sync>),
    /// `NO_VALUE`: never emit anything from this slot.
    None,
}

impl<T> InitialValue<T> {
    pub fn value(v: T) -> Self {
        InitialValue::Value(v)
    }

    pub fn getter<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        InitialValue::Getter(std::sync::Arc::new(f))
    }

    pub fn none() -> Self {
        InitialValue::None
    }

    pub fn is_none(&self) -> bool {
        matches!(self, InitialValue::None)
    }
}

impl<T> Clone for InitialValue<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            InitialValue::Value(v) => InitialValue::Value(v.clone()),
            InitialValue::Getter(g) => InitialValue::Getter(g.clone()),
            InitialValue::None => InitialValue::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_unique() {
        let a = Symbol::fresh();
        let b = Symbol::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_compare_by_symbol_only() {
        let a: SignalId<i32> = SignalId::behavior();
        let b: SignalId<i32> = SignalId::behavior();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn default_id_is_invalid() {
        let id: SignalId<i32> = SignalId::default();
        assert!(!id.is_valid());

        let real: SignalId<i32> = SignalId::state();
        assert!(real.is_valid());
    }

    #[test]
    fn state_and_derived_are_behavior_like() {
        assert!(SignalKind::State.is_behavior_like());
        assert!(SignalKind::Derived.is_behavior_like());
        assert!(SignalKind::Effect.is_behavior_like());
        assert!(!SignalKind::Event.is_behavior_like());
    }
}
