//! The store's single error type.
//!
//! Validation errors are synchronous and local to the caller; upstream
//! errors are asynchronous and surface through the affected signal's
//! stream instead (see `ControlledSubject::error`). Both paths report
//! through this one enum so the public API never needs a second error
//! type.

use crate::id::Symbol;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A missing/invalid identifier was passed (the `SignalId::invalid()`
    /// sentinel, or one of its retagged views).
    #[error("invalid identifier passed to {operation}")]
    InvalidIdentifier { operation: &'static str },

    /// A null/undefined observable was passed where a source was required.
    #[error("invalid source passed to {operation}")]
    InvalidSource { operation: &'static str },

    /// `add_behavior`/`add_state`/`add_derived_state` called for an id
    /// whose subject already has any source.
    #[error("signal {symbol} already has a source")]
    DuplicateBehaviorSource { symbol: Symbol },

    /// A second source with the same source-id was added to a subject.
    #[error("source {source} already attached to signal {target}")]
    DuplicateSource { target: Symbol, source: Symbol },

    /// An attached source observable emitted an error, which has been
    /// delivered to the subject's current observers and has caused the
    /// subject to be rebootstrapped.
    #[error("upstream error on signal {symbol}: {message}")]
    UpstreamError { symbol: Symbol, message: String },

    /// The registry entry for this symbol was created with a different
    /// `T` than the caller is asking for. Only reachable because the
    /// registries are type-erased internally.
    #[error("signal {symbol} was registered with a different type than requested")]
    SignalTypeMismatch { symbol: Symbol },

    /// The signal referenced by this operation does not exist in the
    /// queried registry (distinct from `InvalidIdentifier`: the id itself
    /// is well-formed, it just was never added nor looked up lazily).
    #[error("no such signal: {symbol}")]
    UnknownSignal { symbol: Symbol },

    /// `remove_reducer`/`remove_event_source`/`remove_source` referenced a
    /// source id that is not currently attached.
    #[error("no such source {source} on signal {target}")]
    UnknownSource { target: Symbol, source: Symbol },
}

pub type StoreResult<T> = Result<T, StoreError>;
