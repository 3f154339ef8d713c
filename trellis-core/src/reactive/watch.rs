//! Watchers.
//!
//! A watcher is a lazy effect over a getter whose scheduler re-runs the
//! getter and hands `(new, old)` to a callback. The getter runs once at
//! creation to seed the old value; that run never calls the callback.
//!
//! [`Runtime::watch_object`] builds the getter from a deep traversal that
//! reads every field reachable from the source, so nested writes are seen.

use std::cell::{OnceCell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use super::runtime::{Runtime, WeakRuntime};
use super::{Effect, EffectOptions, Job, Reactive};
use crate::value::{TargetId, Value};

struct WatchState<T: 'static> {
    effect: OnceCell<Effect<T>>,
    old: RefCell<Option<T>>,
    callback: Box<dyn Fn(&T, &T)>,
    runtime: WeakRuntime,
}

impl<T: Clone + 'static> WatchState<T> {
    fn fire(&self) {
        let Some(effect) = self.effect.get() else {
            return;
        };
        let new = effect.run();
        let old = self.old.borrow().clone();

        if let Some(old) = old {
            match self.runtime.upgrade() {
                Some(runtime) => runtime.untracked(|| (self.callback)(&new, &old)),
                None => (self.callback)(&new, &old),
            }
        }
        *self.old.borrow_mut() = Some(new);
    }
}

/// Handle keeping a watcher alive. Dropping it stops the watcher.
#[must_use = "a watcher stops when its handle is dropped"]
pub struct Watcher<T: 'static> {
    state: Rc<WatchState<T>>,
}

impl<T: Clone + 'static> Watcher<T> {
    pub(crate) fn new<G, C>(runtime: &Runtime, getter: G, callback: C) -> Self
    where
        G: Fn() -> T + 'static,
        C: Fn(&T, &T) + 'static,
    {
        let state = Rc::new(WatchState {
            effect: OnceCell::new(),
            old: RefCell::new(None),
            callback: Box::new(callback),
            runtime: runtime.downgrade(),
        });

        let weak = Rc::downgrade(&state);
        let effect = runtime.effect_with(
            getter,
            EffectOptions::new().lazy().scheduler(move |_job: Job| {
                if let Some(state) = weak.upgrade() {
                    state.fire();
                }
            }),
        );

        *state.old.borrow_mut() = Some(effect.run());
        let _ = state.effect.set(effect);
        Self { state }
    }

    /// Last value produced by the getter.
    pub fn value(&self) -> Option<T> {
        self.state.old.borrow().clone()
    }

    pub fn stop(&self) {
        if let Some(effect) = self.state.effect.get() {
            effect.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.effect.get().is_some_and(Effect::is_active)
    }
}

impl Watcher<Reactive> {
    pub(crate) fn deep<C>(runtime: &Runtime, source: &Reactive, callback: C) -> Self
    where
        C: Fn(&Reactive, &Reactive) + 'static,
    {
        let source = source.clone();
        Self::new(
            runtime,
            move || {
                traverse(&source, &mut HashSet::new());
                source.clone()
            },
            callback,
        )
    }
}

/// Read every field reachable from `source`, subscribing the running
/// subscriber to all of them. Objects already visited are skipped.
fn traverse(source: &Reactive, seen: &mut HashSet<TargetId>) {
    if !seen.insert(source.id()) {
        return;
    }
    for key in source.keys() {
        if let Some(value) = source.get(&key) {
            traverse_value(source.runtime(), &value, seen);
        }
    }
}

fn traverse_value(runtime: &Runtime, value: &Value, seen: &mut HashSet<TargetId>) {
    match value {
        Value::Object(object) => traverse(&runtime.reactive(object), seen),
        Value::List(items) => {
            for item in items.iter() {
                traverse_value(runtime, item, seen);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::value::Object;

    #[test]
    fn callback_receives_new_and_old_values() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("n", 1));
        let calls = Rc::new(RefCell::new(Vec::new()));

        let (s, log) = (state.clone(), Rc::clone(&calls));
        let _watcher = rt.watch(
            move || s.get("n").and_then(|v| v.as_int()),
            move |new, old| log.borrow_mut().push((*new, *old)),
        );

        assert!(calls.borrow().is_empty());
        state.set("n", 2);
        state.set("n", 5);
        assert_eq!(*calls.borrow(), [(Some(2), Some(1)), (Some(5), Some(2))]);
    }

    #[test]
    fn getter_limits_what_is_watched() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("a", 1).with("b", 1));
        let calls = Rc::new(Cell::new(0));

        let (s, c) = (state.clone(), Rc::clone(&calls));
        let _watcher = rt.watch(move || s.get("a"), move |_, _| c.set(c.get() + 1));

        state.set("b", 2);
        assert_eq!(calls.get(), 0);
        state.set("a", 2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn object_watch_sees_nested_and_added_fields() {
        let rt = Runtime::new();
        let inner = Object::new().with("x", 1);
        let state = rt.reactive(&Object::new().with("inner", inner.clone()));
        let calls = Rc::new(Cell::new(0));

        let c = Rc::clone(&calls);
        let _watcher = rt.watch_object(&state, move |new, old| {
            assert_eq!(new, old);
            c.set(c.get() + 1);
        });

        rt.reactive(&inner).set("x", 2);
        assert_eq!(calls.get(), 1);

        rt.reactive(&inner).set("y", 3);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn traversal_survives_cycles() {
        let rt = Runtime::new();
        let a = Object::new().with("n", 0);
        let b = Object::new().with("a", a.clone());
        a.insert("b", b);
        let state = rt.reactive(&a);
        let calls = Rc::new(Cell::new(0));

        let c = Rc::clone(&calls);
        let _watcher = rt.watch_object(&state, move |_, _| c.set(c.get() + 1));

        state.set("n", 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn callback_reads_are_not_tracked() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("a", 1).with("other", 0));
        let runs = Rc::new(Cell::new(0));

        let s = state.clone();
        let watcher_state = state.clone();
        let r = Rc::clone(&runs);
        let _watcher = rt.watch(
            move || s.get("a"),
            move |_, _| {
                r.set(r.get() + 1);
                watcher_state.get("other");
            },
        );

        state.set("a", 2);
        assert_eq!(rt.subscriber_count(&state, "other"), 0);
        state.set("other", 1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn stopped_watcher_is_silent() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("n", 1));
        let calls = Rc::new(Cell::new(0));

        let (s, c) = (state.clone(), Rc::clone(&calls));
        let watcher = rt.watch(move || s.get("n"), move |_, _| c.set(c.get() + 1));
        assert!(watcher.is_active());

        watcher.stop();
        state.set("n", 2);
        assert_eq!(calls.get(), 0);
        assert_eq!(watcher.value(), Some(Some(Value::Int(1))));
    }
}
