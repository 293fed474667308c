//! `ResetHandle`: the two-phase remove/readd primitive behind
//! `Store::reset_behaviors`, which obtains a reset handle from every
//! behavior, removes all their sources, then re-adds them, in two passes.
//!
//! The two-phase split matters for derived behaviors that read each
//! other's replay value while being reseeded: removing every behavior's
//! sources before re-adding any of them guarantees no derived behavior
//! observes a half-reset sibling.

use super::ControlledSubject;
use crate::observable::Observable;
use crate::source::{SourceId, SourceRecord};

use std::sync::Arc;

struct SourceSnapshot<T> {
    id: SourceId,
    observable: Observable<T>,
    lazy: bool,
    initial: crate::id::InitialValue<T>,
}

/// A handle, scoped to one `ControlledSubject`, that can tear down and
/// then reconstruct that subject's source set.
pub struct ResetHandle<T: Clone + Send + Sync + PartialEq + 'static> {
    subject: Arc<ControlledSubject<T>>,
    snapshot: Option<Vec<SourceSnapshot<T>>>,
}

impl<T: Clone + Send + Sync + PartialEq + 'static> ResetHandle<T> {
    pub(crate) fn new(subject: Arc<ControlledSubject<T>>) -> Self {
        Self {
            subject,
            snapshot: None,
        }
    }

    /// Capture the current source set and remove it from the subject.
    /// Idempotent: calling this twice in a row just re-captures an empty
    /// snapshot the second time.
    pub fn remove_sources(&mut self) {
        let snapshot: Vec<SourceSnapshot<T>> = {
            let state = self.subject.state.lock();
            state
                .sources
                .values()
                .map(|record| SourceSnapshot {
                    id: record.id,
                    observable: record.observable.clone(),
                    lazy: record.lazy,
                    initial: record.initial.clone(),
                })
                .collect()
        };
        self.subject.remove_all_sources();
        self.snapshot = Some(snapshot);
    }

    /// Re-add every source captured by the last `remove_sources` call,
    /// fresh (so each one's initial-value slot and subscription state
    /// start over exactly as they would for a newly-added source).
    pub fn readd_sources(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        for entry in snapshot {
            let record = SourceRecord::new(entry.id, entry.observable, entry.lazy, entry.initial);
            // A fresh record with the same id as one that was just removed
            // can never collide, so this only fails if the caller issued
            // readd twice without an intervening remove.
            let _ = self.subject.add_source(record);
        }
    }
}

/// Object-safe view of `ResetHandle<T>` so `Store::reset_behaviors` can
/// hold a `Vec<Box<dyn ResetHandleObj>>` across its heterogeneous
/// behavior registry without knowing each behavior's value type.
pub trait ResetHandleObj: Send {
    fn remove_sources(&mut self);
    fn readd_sources(&mut self);
}

impl<T: Clone + Send + Sync + PartialEq + 'static> ResetHandleObj for ResetHandle<T> {
    fn remove_sources(&mut self) {
        ResetHandle::remove_sources(self)
    }

    fn readd_sources(&mut self) {
        ResetHandle::readd_sources(self)
    }
}
