//! Effects: the store's one escape hatch to the outside world.
//!
//! An effect is registered as a function modeling side-effecting,
//! possibly-asynchronous work as `In -> Observable<Out>`. Wiring an
//! effect's input to a behavior or event and its output back into the
//! store is identical to wiring any other source — the only special case
//! is that `EffectFn` needs a `PartialEq` impl to satisfy
//! `ControlledSubject<T: PartialEq>`'s bound even though the underlying
//! closure obviously isn't comparable by value.

use crate::observable::Observable;
use std::sync::Arc;

/// A registered effect function, `In -> Observable<Out>`.
///
/// Two `EffectFn`s are equal iff they wrap the same underlying `Arc`
/// allocation (`Arc::ptr_eq`) — structural equality on the closure itself
/// is not expressible in Rust, and reference equality is the only sound
/// notion of distinctness for a value that happens to be a function.
pub struct EffectFn<In, Out> {
    run: Arc<dyn Fn(In) -> Observable<Out> + Send + Sync>,
}

impl<In, Out> EffectFn<In, Out> {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(In) -> Observable<Out> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run) }
    }

    pub fn call(&self, input: In) -> Observable<Out> {
        (self.run)(input)
    }
}

impl<In, Out> Clone for EffectFn<In, Out> {
    fn clone(&self) -> Self {
        Self {
            run: self.run.clone(),
        }
    }
}

impl<In, Out> PartialEq for EffectFn<In, Out> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.run, &other.run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::{Observer, Subscription};
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn calling_invokes_the_wrapped_function() {
        let seen = Arc::new(AtomicI32::new(0));
        let seen2 = seen.clone();
        let effect: EffectFn<i32, i32> = EffectFn::new(move |input| {
            seen2.store(input, Ordering::SeqCst);
            Observable::of(input * 2)
        });

        let result = Arc::new(AtomicI32::new(0));
        let result2 = result.clone();
        let _sub = effect.call(21).subscribe(Observer::new(
            move |v| result2.store(v, Ordering::SeqCst),
            |_| {},
            || {},
        ));

        assert_eq!(seen.load(Ordering::SeqCst), 21);
        assert_eq!(result.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn equality_is_by_arc_identity_not_behavior() {
        let a: EffectFn<i32, i32> = EffectFn::new(|x| Observable::of(x));
        let b: EffectFn<i32, i32> = EffectFn::new(|x| Observable::of(x));
        let a2 = a.clone();

        assert_eq!(a, a2);
        assert_ne!(a, b);
    }

    #[test]
    fn clone_is_cheap_and_shares_identity() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls2 = calls.clone();
        let effect: EffectFn<(), ()> = EffectFn::new(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
            Observable::empty()
        });
        let cloned = effect.clone();

        let _ = cloned.call(()).subscribe(Observer::new(|_| {}, |_| {}, || {}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(effect, cloned);
    }
}
