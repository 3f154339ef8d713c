//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects objects, effects,
//! computed values and the job queue. It owns:
//!
//! - the dependency store, mapping (target, key) pairs to subscriber sets;
//! - the context stack, naming the subscriber that reads are attributed to;
//! - the proxy cache, guaranteeing one [`Reactive`] per object and mode;
//! - the job queue and the microtask host that flushes it.
//!
//! # How It Works
//!
//! 1. Reading through a [`Reactive`] calls `track`, which records the
//!    currently running subscriber against the (object, key) pair.
//!
//! 2. Writing through a [`Reactive`] calls `trigger`, which snapshots the
//!    pair's subscriber set and notifies each of them. The subscriber that is
//!    executing right now is left out, so `state.n += 1` inside an effect that
//!    reads `n` does not re-enter itself.
//!
//! 3. Notified subscribers go through their scheduler: run in place, flip a
//!    dirty flag, or wait for the next job-queue flush.
//!
//! # Threading
//!
//! A runtime is single-threaded (`!Send`). Handles are cheap `Rc` clones.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::context::{ContextGuard, ContextStack};
use super::deps::{Dep, DepStore, Key};
use super::object::{ReactiveInner, Readonly};
use super::subscriber::{Job, Subscriber, SubscriberId};
use super::{Computed, Effect, EffectOptions, Reactive, Watcher};
use crate::scheduler::{Batched, JobQueue, LocalMicrotasks, MicrotaskHost, Scheduler};
use crate::value::{Object, TargetId};

/// Tunables for a [`Runtime`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many times a single job may run across a chain of back-to-back
    /// flushes before the queue drops it.
    pub recursion_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 100,
        }
    }
}

/// Builder for a [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    microtasks: Option<Rc<dyn MicrotaskHost>>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.config.recursion_limit = limit;
        self
    }

    /// Flush the job queue through `host` instead of the built-in local
    /// microtask queue.
    pub fn microtasks(mut self, host: Rc<dyn MicrotaskHost>) -> Self {
        self.microtasks = Some(host);
        self
    }

    pub fn build(self) -> Runtime {
        let (local, microtasks): (Option<Rc<LocalMicrotasks>>, Rc<dyn MicrotaskHost>) =
            match self.microtasks {
                Some(host) => (None, host),
                None => {
                    let local = Rc::new(LocalMicrotasks::new());
                    (Some(Rc::clone(&local)), local)
                }
            };

        Runtime {
            inner: Rc::new(RuntimeInner {
                config: self.config,
                deps: RefCell::default(),
                context: ContextStack::default(),
                proxies: RefCell::default(),
                jobs: JobQueue::default(),
                local,
                microtasks,
            }),
        }
    }
}

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    deps: RefCell<DepStore>,
    context: ContextStack,
    proxies: RefCell<HashMap<(TargetId, bool), Weak<ReactiveInner>>>,
    jobs: JobQueue,
    local: Option<Rc<LocalMicrotasks>>,
    microtasks: Rc<dyn MicrotaskHost>,
}

/// Handle to a reactive runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning handle to a [`Runtime`].
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

impl Runtime {
    /// Create a runtime with the default configuration and a local
    /// microtask queue.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------------
    // Proxies
    // ------------------------------------------------------------------------

    /// Wrap `object` in a deep reactive proxy. Wrapping the same object again
    /// returns the same proxy for as long as any handle to it is alive.
    pub fn reactive(&self, object: &Object) -> Reactive {
        self.proxy(object, false)
    }

    /// Like [`reactive`](Self::reactive), but nested objects read through the
    /// proxy are not wrapped.
    pub fn shallow_reactive(&self, object: &Object) -> Reactive {
        self.proxy(object, true)
    }

    /// A read-only view of `object`. Reads are tracked like a shallow proxy.
    pub fn readonly(&self, object: &Object) -> Readonly {
        self.shallow_reactive(object).readonly()
    }

    fn proxy(&self, object: &Object, shallow: bool) -> Reactive {
        let key = (object.id(), shallow);
        if let Some(existing) = self.inner.proxies.borrow().get(&key).and_then(Weak::upgrade) {
            return Reactive::from_inner(existing);
        }

        let proxy = Reactive::new(self.clone(), object.clone(), shallow);
        let mut proxies = self.inner.proxies.borrow_mut();
        proxies.retain(|_, weak| weak.strong_count() > 0);
        proxies.insert(key, proxy.downgrade_inner());
        proxy
    }

    // ------------------------------------------------------------------------
    // Subscribers
    // ------------------------------------------------------------------------

    /// Register an effect that re-runs through the batched job queue whenever
    /// something it read changes. It runs once immediately.
    ///
    /// Dependency sets hold effects weakly: the effect lives as long as the
    /// returned handle (or a clone of it). Dropping the last handle makes it
    /// inert, so a registration whose result is discarded runs exactly once.
    #[must_use = "an effect stops when its handle is dropped"]
    pub fn effect<T, F>(&self, f: F) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        self.effect_with(f, EffectOptions::new().scheduler_rc(self.batched()))
    }

    /// Register an effect with explicit options. Without a scheduler, a
    /// triggered effect re-runs synchronously inside the triggering write.
    /// The returned handle keeps the effect alive, as with [`effect`](Self::effect).
    #[must_use = "an effect stops when its handle is dropped"]
    pub fn effect_with<T, F>(&self, f: F, options: EffectOptions) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        Effect::register(self.clone(), f, options)
    }

    /// A cached value derived from reactive reads.
    #[must_use = "a computed value stops tracking when its handle is dropped"]
    pub fn computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> T + 'static,
    {
        Computed::new(self, getter)
    }

    /// Call `callback(new, old)` whenever a value read by `getter` changes.
    pub fn watch<T, G, C>(&self, getter: G, callback: C) -> Watcher<T>
    where
        T: Clone + 'static,
        G: Fn() -> T + 'static,
        C: Fn(&T, &T) + 'static,
    {
        Watcher::new(self, getter, callback)
    }

    /// Call `callback` whenever any field reachable from `source` changes.
    pub fn watch_object<C>(&self, source: &Reactive, callback: C) -> Watcher<Reactive>
    where
        C: Fn(&Reactive, &Reactive) + 'static,
    {
        Watcher::deep(self, source, callback)
    }

    /// A scheduler that defers to this runtime's job queue.
    pub fn batched(&self) -> Rc<dyn Scheduler> {
        Rc::new(Batched::new(self.downgrade()))
    }

    /// Run `f` without attributing its reads to the running subscriber.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _paused = self.inner.context.pause();
        f()
    }

    /// ID of the subscriber reads are currently attributed to.
    pub fn active_subscriber(&self) -> Option<SubscriberId> {
        self.inner.context.current().map(|s| s.id())
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.context.current().is_some()
    }

    /// Number of live subscribers depending on `key` of `target`.
    pub fn subscriber_count(&self, target: &Reactive, key: &str) -> usize {
        self.inner.deps.borrow().count(&Dep {
            target: target.id(),
            key: Key::field(key),
        })
    }

    pub(crate) fn enter(&self, subscriber: Rc<dyn Subscriber>) -> ContextGuard<'_> {
        self.inner.context.enter(subscriber)
    }

    /// Record that the running subscriber read `key` of `target`.
    pub(crate) fn track(&self, target: TargetId, key: Key) {
        let Some(active) = self.inner.context.current() else {
            return;
        };

        let dep = Dep { target, key };
        let inserted = self.inner.deps.borrow_mut().add(&dep, &active);
        if inserted {
            trace!(target = target.raw(), key = ?dep.key, subscriber = ?active.id(), "track");
            active.deps().borrow_mut().push(dep);
        }
    }

    /// Notify every subscriber of `key` of `target`, except the one that is
    /// executing.
    pub(crate) fn trigger(&self, target: TargetId, key: Key) {
        let dep = Dep { target, key };
        let executing = self.inner.context.executing();
        let to_notify: Vec<_> = self
            .inner
            .deps
            .borrow_mut()
            .snapshot(&dep)
            .into_iter()
            .filter(|s| Some(s.id()) != executing)
            .collect();

        if to_notify.is_empty() {
            return;
        }
        trace!(target = target.raw(), key = ?dep.key, subscribers = to_notify.len(), "trigger");

        for subscriber in to_notify {
            subscriber.notify();
        }
    }

    /// Remove `subscriber` from every dependency set it is in.
    pub(crate) fn cleanup(&self, subscriber: &dyn Subscriber) {
        let deps = std::mem::take(&mut *subscriber.deps().borrow_mut());
        let mut store = self.inner.deps.borrow_mut();
        for dep in &deps {
            store.remove(dep, subscriber.id());
        }
    }

    // ------------------------------------------------------------------------
    // Job queue
    // ------------------------------------------------------------------------

    /// Queue `job` for the next flush. Queueing a job that is already pending
    /// does nothing.
    pub fn queue_job(&self, job: Job) {
        if self.inner.jobs.push(job) {
            self.schedule_flush();
        }
    }

    pub fn pending_jobs(&self) -> usize {
        self.inner.jobs.len()
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.inner.jobs.is_flush_scheduled()
    }

    pub(crate) fn schedule_flush(&self) {
        let runtime = self.downgrade();
        self.inner.microtasks.queue_microtask(Box::new(move || {
            if let Some(runtime) = runtime.upgrade() {
                runtime.inner.jobs.flush(&runtime);
            }
        }));
    }

    /// Drain the built-in microtask queue, running every scheduled flush.
    /// Returns the number of microtasks run; always zero when a custom
    /// microtask host was configured.
    pub fn run_microtasks(&self) -> usize {
        self.inner
            .local
            .as_ref()
            .map_or(0, |local| local.run_until_idle())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("targets", &self.inner.deps.borrow().target_count())
            .field("context_depth", &self.inner.context.depth())
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn reactive_is_identity_preserving() {
        let rt = Runtime::new();
        let raw = Object::new().with("a", 1);

        let first = rt.reactive(&raw);
        let second = rt.reactive(&raw);
        assert_eq!(first, second);

        let shallow = rt.shallow_reactive(&raw);
        assert_ne!(first, shallow);
        assert_eq!(shallow, rt.shallow_reactive(&raw));
        assert_eq!(first.id(), shallow.id());
    }

    #[test]
    fn track_is_a_noop_without_an_active_subscriber() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("a", 1));

        assert!(!rt.is_tracking());
        state.get("a");
        assert_eq!(rt.subscriber_count(&state, "a"), 0);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let rt = Runtime::new();
        let state = rt.reactive(&Object::new().with("a", 1).with("b", 2));
        let runs = Rc::new(Cell::new(0));

        let (s, r, inner) = (state.clone(), Rc::clone(&runs), rt.clone());
        let _effect = rt.effect_with(
            move || {
                r.set(r.get() + 1);
                s.get("a");
                inner.untracked(|| s.get("b"));
            },
            EffectOptions::new(),
        );

        assert_eq!(rt.subscriber_count(&state, "a"), 1);
        assert_eq!(rt.subscriber_count(&state, "b"), 0);

        state.set("b", 3);
        assert_eq!(runs.get(), 1);
        state.set("a", 3);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());

        let config: RuntimeConfig = serde_json::from_str(r#"{"recursion_limit": 7}"#).unwrap();
        let rt = Runtime::builder().config(config).build();
        assert_eq!(rt.config().recursion_limit, 7);
    }

    #[test]
    fn custom_microtask_host_receives_flushes() {
        let host = Rc::new(LocalMicrotasks::new());
        let rt = Runtime::builder()
            .microtasks(Rc::clone(&host) as Rc<dyn MicrotaskHost>)
            .build();
        let state = rt.reactive(&Object::new().with("a", 1));
        let runs = Rc::new(Cell::new(0));

        let (s, r) = (state.clone(), Rc::clone(&runs));
        let _effect = rt.effect(move || {
            r.set(r.get() + 1);
            s.get("a");
        });
        state.set("a", 2);

        assert_eq!(rt.run_microtasks(), 0);
        assert_eq!(host.len(), 1);
        host.run_until_idle();
        assert_eq!(runs.get(), 2);
    }
}
