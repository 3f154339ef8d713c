//! Computed values.
//!
//! A computed value wraps a getter in a lazy effect. The effect's scheduler
//! never recomputes; it only marks the cached value dirty and notifies
//! whoever read the computed value. The next read recomputes.
//!
//! Any number of reads between two invalidations return the same cached
//! value without running the getter again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::deps::Key;
use super::runtime::{Runtime, WeakRuntime};
use super::{Effect, EffectOptions, Job};
use crate::value::TargetId;

struct ComputedInner<T: 'static> {
    target: TargetId,
    runtime: WeakRuntime,
    effect: Effect<T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
}

impl<T: 'static> ComputedInner<T> {
    fn invalidate(&self) {
        if self.dirty.replace(true) {
            return;
        }
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.trigger(self.target, Key::Value);
        }
    }
}

/// A lazily recomputed, cached value.
///
/// Dropping every handle detaches the value from its dependencies.
#[must_use = "a computed value stops tracking when its handle is dropped"]
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    pub(crate) fn new<F>(runtime: &Runtime, getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|this: &Weak<ComputedInner<T>>| {
            let this = this.clone();
            let effect = runtime.effect_with(
                getter,
                EffectOptions::new().lazy().scheduler(move |_job: Job| {
                    if let Some(computed) = this.upgrade() {
                        computed.invalidate();
                    }
                }),
            );

            ComputedInner {
                target: TargetId::new(),
                runtime: runtime.downgrade(),
                effect,
                value: RefCell::new(None),
                dirty: Cell::new(true),
            }
        });

        Self { inner }
    }

    /// The current value, recomputed first if a dependency changed since the
    /// last read. Subscribes the running subscriber to this computed value.
    pub fn get(&self) -> T {
        let inner = &self.inner;
        if let Some(runtime) = inner.runtime.upgrade() {
            runtime.track(inner.target, Key::Value);
        }

        if !inner.dirty.get() {
            if let Some(value) = inner.value.borrow().as_ref() {
                return value.clone();
            }
        }

        let value = inner.effect.run();
        inner.dirty.set(false);
        *inner.value.borrow_mut() = Some(value.clone());
        value
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Detach the computed value from its dependencies. It keeps returning
    /// the last cached value; if it was never read, the next read computes
    /// once without tracking.
    pub fn stop(&self) {
        self.inner.effect.stop();
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("dirty", &self.inner.dirty.get())
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    fn int(state: &crate::reactive::Reactive, key: &str) -> i64 {
        state.get(key).and_then(|v| v.as_int()).unwrap_or_default()
    }

    #[test]
    fn computes_lazily_and_caches() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("n", 2));
        let calls = Rc::new(Cell::new(0));

        let (s, c) = (state.clone(), Rc::clone(&calls));
        let doubled = rt.computed(move || {
            c.set(c.get() + 1);
            int(&s, "n") * 2
        });

        assert_eq!(calls.get(), 0);
        assert!(doubled.is_dirty());

        for _ in 0..5 {
            assert_eq!(doubled.get(), 4);
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn invalidates_on_dependency_change() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("n", 2));
        let calls = Rc::new(Cell::new(0));

        let (s, c) = (state.clone(), Rc::clone(&calls));
        let doubled = rt.computed(move || {
            c.set(c.get() + 1);
            int(&s, "n") * 2
        });
        assert_eq!(doubled.get(), 4);

        state.set("n", 5);
        assert!(doubled.is_dirty());
        // Invalidation alone does not recompute.
        assert_eq!(calls.get(), 1);

        assert_eq!(doubled.get(), 10);
        assert_eq!(doubled.get(), 10);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn effects_reading_a_computed_rerun_on_invalidation() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("n", 1));

        let s = state.clone();
        let plus_one = rt.computed(move || int(&s, "n") + 1);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let (p, log) = (plus_one.clone(), Rc::clone(&seen));
        let _effect = rt.effect_with(move || log.borrow_mut().push(p.get()), EffectOptions::new());

        state.set("n", 10);
        state.set("n", 20);
        assert_eq!(*seen.borrow(), [2, 11, 21]);
    }

    #[test]
    fn chained_computeds_propagate() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("n", 1));

        let s = state.clone();
        let doubled = rt.computed(move || int(&s, "n") * 2);
        let d = doubled.clone();
        let quadrupled = rt.computed(move || d.get() * 2);

        assert_eq!(quadrupled.get(), 4);
        state.set("n", 3);
        assert!(quadrupled.is_dirty());
        assert_eq!(quadrupled.get(), 12);
    }

    #[test]
    fn stopped_computed_keeps_its_last_value() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("n", 1));

        let s = state.clone();
        let value = rt.computed(move || int(&s, "n"));
        assert_eq!(value.get(), 1);

        value.stop();
        state.set("n", 2);
        assert!(!value.is_dirty());
        assert_eq!(value.get(), 1);
    }
}
