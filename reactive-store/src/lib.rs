//! Reactive Store
//!
//! This crate provides the core runtime for an in-process reactive signal
//! store: a controlled-subject subsystem plus the scheduling and lifecycle
//! rules a higher-level signals/effects framework layers on top of it.
//!
//! It implements:
//!
//! - Opaque, typed signal identifiers distinguishing behaviors, state,
//!   derived state, events, and effects
//! - A per-signal controlled subject multiplexing zero-or-more input
//!   sources into one shared, replaying (behaviors) or delayed (events)
//!   output stream
//! - A single-threaded cooperative, one-turn-delayed event queue
//!   guaranteeing global dispatch ordering
//! - A reducer/state mechanism and a parent/child store hierarchy
//!
//! # Architecture
//!
//! - `id`: opaque signal identifiers (`SignalId<T>`) and the `NO_VALUE`
//!   sentinel (`InitialValue<T>`)
//! - `observable`: the minimal cold-observable abstraction the rest of the
//!   crate is built on
//! - `notifier`: a small reactive-value broadcaster backing
//!   `is-subscribed-observable` and registry mutation notifications
//! - `queue`: the delayed event queue and `dispatch`'s completion future
//! - `source`: source records and the per-source subscription state
//!   machine
//! - `subject`: `ControlledSubject`, the per-signal multiplexer
//! - `effect`: the value-wrapper behind `add_effect`/`get_effect`
//! - `store`: the public façade — registries, reducers, connect, dispatch,
//!   fan-out, parent/child delegation
//!
//! # Example
//!
//! ```rust,ignore
//! use reactive_store::{Store, SignalId, InitialValue};
//!
//! let store = Store::new();
//! let counter = SignalId::state();
//! let inc = SignalId::event();
//!
//! store.add_state(counter, 0).unwrap();
//! store.add_reducer(counter, inc, |s, ()| s + 1).unwrap();
//!
//! let _sub = store.get_behavior(counter).unwrap().subscribe(
//!     reactive_store::Observer::from_next(|v| println!("count: {v}")),
//! );
//! futures_executor::block_on(store.dispatch(inc, ()).unwrap());
//! ```

pub mod effect;
pub mod error;
pub mod id;
pub mod notifier;
pub mod observable;
pub mod queue;
pub mod source;
pub mod store;
pub mod subject;

pub use error::{StoreError, StoreResult};
pub use id::{BehaviorId, DerivedId, EffectId, EventId, InitialValue, SignalId, SignalKind, SignalRef, StateId, Symbol};
pub use observable::{Observable, Observer, Subscription};
pub use queue::{DelayedEventQueue, DispatchCompletion};
pub use source::SourceId;
pub use store::{FanOutHandle, RegistryEvent, Store, StoreBuilder};
pub use subject::SubjectKind;
