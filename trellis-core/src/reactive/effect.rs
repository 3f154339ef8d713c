//! Effect Implementation
//!
//! An effect is a re-runnable computation whose reads are tracked.
//!
//! # How Effects Work
//!
//! 1. Unless created lazily, the effect runs its function immediately to
//!    establish initial dependencies.
//!
//! 2. Before every run, the effect removes itself from every dependency set
//!    it joined last time. Reads made during the run subscribe it again, so
//!    a branch that is no longer taken stops triggering it.
//!
//! 3. When a dependency changes, the effect's scheduler decides what happens.
//!    Without a scheduler it re-runs in place, inside the triggering write.
//!
//! # Lifetime
//!
//! Dependency sets hold effects weakly. Dropping the last [`Effect`] handle
//! makes the effect inert; [`Effect::stop`] does the same while keeping the
//! handle usable.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::deps::Dep;
use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::{Job, Subscriber, SubscriberId};
use crate::scheduler::Scheduler;

/// Options accepted by [`Runtime::effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    pub(crate) lazy: bool,
    pub(crate) scheduler: Option<Rc<dyn Scheduler>>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not run on creation; wait for an explicit [`Effect::run`].
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn scheduler(self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler_rc(Rc::new(scheduler))
    }

    pub fn scheduler_rc(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

struct EffectInner<T: 'static> {
    id: SubscriberId,
    runtime: WeakRuntime,
    func: Box<dyn Fn() -> T>,
    deps: RefCell<SmallVec<[Dep; 4]>>,
    scheduler: Option<Rc<dyn Scheduler>>,
    active: Cell<bool>,
    runs: Cell<usize>,
}

impl<T: 'static> EffectInner<T> {
    fn run(self: &Rc<Self>) -> T {
        if !self.active.get() {
            return (self.func)();
        }
        let Some(runtime) = self.runtime.upgrade() else {
            return (self.func)();
        };

        runtime.cleanup(&**self);
        self.runs.set(self.runs.get() + 1);

        let _ctx = runtime.enter(Rc::clone(self) as Rc<dyn Subscriber>);
        (self.func)()
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn deps(&self) -> &RefCell<SmallVec<[Dep; 4]>> {
        &self.deps
    }

    fn notify(self: Rc<Self>) {
        if !self.active.get() {
            return;
        }
        match &self.scheduler {
            Some(scheduler) => scheduler.schedule(Job(Rc::clone(&self) as Rc<dyn Subscriber>)),
            None => {
                self.run();
            }
        }
    }

    fn execute(self: Rc<Self>) {
        self.run();
    }
}

/// Handle to a registered effect.
///
/// `T` is the return type of the wrapped function, handed back by
/// [`run`](Self::run).
///
/// The handle owns the effect. Once every clone is dropped, the effect stops
/// reacting to writes.
#[must_use = "an effect stops when its handle is dropped"]
pub struct Effect<T: 'static = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    pub(crate) fn register<F>(runtime: Runtime, f: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                runtime: runtime.downgrade(),
                func: Box::new(f),
                deps: RefCell::new(SmallVec::new()),
                scheduler: options.scheduler,
                active: Cell::new(true),
                runs: Cell::new(0),
            }),
        };

        if !options.lazy {
            effect.run();
        }
        effect
    }

    /// Run the effect now, re-collecting its dependencies, and return the
    /// wrapped function's result. A stopped effect still runs but tracks
    /// nothing.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Remove the effect from every dependency set and make it inert.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.cleanup(&*self.inner);
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.runs.get()
    }

    /// Number of (object, key) pairs the effect depends on after its last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// The effect as a schedulable job.
    pub fn job(&self) -> Job {
        Job(Rc::clone(&self.inner) as Rc<dyn Subscriber>)
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("active", &self.inner.active.get())
            .field("runs", &self.inner.runs.get())
            .field("deps", &self.inner.deps.borrow().len())
            .finish()
    }
}
