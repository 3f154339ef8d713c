//! Observed objects.
//!
//! A [`Reactive`] is the accessor-method wrapper around a raw [`Object`].
//! Every read goes through `track` and every write through `trigger`; there is
//! no other way to reach the fields of an observed object from user code.

use std::fmt;
use std::rc::{Rc, Weak};

use super::deps::Key;
use super::Runtime;
use crate::value::{Object, TargetId, Value};

pub(crate) struct ReactiveInner {
    runtime: Runtime,
    object: Object,
    shallow: bool,
}

/// Reactive proxy over an [`Object`].
///
/// Obtained from [`Runtime::reactive`] or [`Runtime::shallow_reactive`].
/// Clones share the same proxy, and wrapping the same object twice in the same
/// mode yields proxies that compare equal.
#[derive(Clone)]
pub struct Reactive(Rc<ReactiveInner>);

impl Reactive {
    pub(crate) fn new(runtime: Runtime, object: Object, shallow: bool) -> Self {
        Self(Rc::new(ReactiveInner {
            runtime,
            object,
            shallow,
        }))
    }

    pub(crate) fn from_inner(inner: Rc<ReactiveInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade_inner(&self) -> Weak<ReactiveInner> {
        Rc::downgrade(&self.0)
    }

    /// Identity of the underlying object.
    pub fn id(&self) -> TargetId {
        self.0.object.id()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.0.runtime
    }

    pub fn is_shallow(&self) -> bool {
        self.0.shallow
    }

    /// Read a field, subscribing the running subscriber to it.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.track(Key::field(key));
        self.0.object.get(key)
    }

    /// Read a field without subscribing.
    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        self.0.object.get(key)
    }

    /// Read a field holding an object and wrap it in a deep proxy.
    ///
    /// Returns `None` on shallow proxies and for fields that do not hold an
    /// object. The read is tracked either way.
    pub fn nested(&self, key: &str) -> Option<Reactive> {
        let value = self.get(key)?;
        if self.0.shallow {
            return None;
        }
        value.as_object().map(|object| self.0.runtime.reactive(object))
    }

    /// Write a field and notify its subscribers. Adding a field that did not
    /// exist also notifies subscribers of the key set.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let previous = self.0.object.insert(key, value);
        self.trigger(Key::field(key));
        if previous.is_none() {
            self.trigger(Key::Keys);
        }
    }

    /// Delete a field. Returns the removed value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.0.object.remove(key)?;
        self.trigger(Key::field(key));
        self.trigger(Key::Keys);
        Some(removed)
    }

    /// Whether the field exists. Tracked against the field, so a later
    /// `set` of the same key notifies the reader.
    pub fn contains(&self, key: &str) -> bool {
        self.track(Key::field(key));
        self.0.object.contains_key(key)
    }

    /// Field names in insertion order. Tracked against the key set.
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.track(Key::Keys);
        self.0.object.keys()
    }

    pub fn len(&self) -> usize {
        self.track(Key::Keys);
        self.0.object.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying object. Accessing it directly bypasses tracking.
    pub fn to_raw(&self) -> Object {
        self.0.object.clone()
    }

    pub fn readonly(&self) -> Readonly {
        Readonly(self.clone())
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn track(&self, key: Key) {
        self.0.runtime.track(self.id(), key);
    }

    fn trigger(&self, key: Key) {
        self.0.runtime.trigger(self.id(), key);
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("object", &self.0.object)
            .field("shallow", &self.0.shallow)
            .finish()
    }
}

impl From<Reactive> for Value {
    fn from(reactive: Reactive) -> Self {
        Value::Object(reactive.to_raw())
    }
}

impl From<&Reactive> for Value {
    fn from(reactive: &Reactive) -> Self {
        Value::Object(reactive.to_raw())
    }
}

/// Read-only view over a reactive object. Reads are tracked exactly like
/// the proxy it was made from.
#[derive(Clone, PartialEq, Eq)]
pub struct Readonly(Reactive);

impl Readonly {
    pub fn id(&self) -> TargetId {
        self.0.id()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.get(key)
    }

    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        self.0.get_untracked(key)
    }

    pub fn nested(&self, key: &str) -> Option<Readonly> {
        self.0.nested(key).map(Readonly)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn keys(&self) -> Vec<Rc<str>> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_raw(&self) -> Object {
        self.0.to_raw()
    }
}

impl fmt::Debug for Readonly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Readonly").field(&self.0 .0.object).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::reactive::EffectOptions;

    #[test]
    fn set_writes_through_to_the_raw_object() {
        let rt = Runtime::new();
        let raw = Object::new().with("count", 1);
        let state = rt.reactive(&raw);

        state.set("count", 2);
        assert_eq!(raw.get("count"), Some(Value::Int(2)));
        assert_eq!(state.get("count"), Some(Value::Int(2)));
        assert!(state.to_raw().ptr_eq(&raw));
    }

    #[test]
    fn nested_objects_are_wrapped_on_deep_proxies_only() {
        let rt = Runtime::new();
        let inner = Object::new().with("x", 1);
        let raw = Object::new().with("inner", inner.clone()).with("n", 0);

        let deep = rt.reactive(&raw);
        let nested = deep.nested("inner").unwrap();
        assert_eq!(nested, rt.reactive(&inner));
        assert!(deep.nested("n").is_none());

        let shallow = rt.shallow_reactive(&raw);
        assert!(shallow.nested("inner").is_none());
        assert_eq!(shallow.get("inner"), Some(Value::Object(inner)));
    }

    #[test]
    fn adding_a_field_notifies_key_set_readers() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("a", 1));
        let runs = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (s, r, log) = (state.clone(), Rc::clone(&runs), Rc::clone(&seen));
        let _effect = rt.effect_with(
            move || {
                r.set(r.get() + 1);
                log.borrow_mut().push(s.keys().len());
            },
            EffectOptions::new(),
        );

        // Overwriting an existing field leaves the key set alone.
        state.set("a", 2);
        assert_eq!(runs.get(), 1);

        state.set("b", 1);
        assert_eq!(runs.get(), 2);
        state.remove("a");
        assert_eq!(runs.get(), 3);
        assert_eq!(*seen.borrow(), [1, 2, 1]);
    }

    #[test]
    fn contains_is_tracked_against_the_field() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (s, log) = (state.clone(), Rc::clone(&seen));
        let _effect = rt.effect_with(
            move || log.borrow_mut().push(s.contains("flag")),
            EffectOptions::new(),
        );

        state.set("flag", true);
        state.remove("flag");
        assert_eq!(*seen.borrow(), [false, true, false]);
    }

    #[test]
    fn removing_a_missing_field_is_silent() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new());
        let runs = Rc::new(Cell::new(0));

        let (s, r) = (state.clone(), Rc::clone(&runs));
        let _effect = rt.effect_with(
            move || {
                r.set(r.get() + 1);
                s.keys();
            },
            EffectOptions::new(),
        );

        assert_eq!(state.remove("missing"), None);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn readonly_view_tracks_reads() {
        let rt = Runtime::new();
        let state = rt.shallow_reactive(&Object::new().with("title", "A"));
        let view = state.readonly();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        let _effect = rt.effect_with(
            move || log.borrow_mut().push(view.get("title").unwrap().to_string()),
            EffectOptions::new(),
        );

        state.set("title", "B");
        assert_eq!(*seen.borrow(), ["A", "B"]);
    }
}
