//! Subscriber types for the reactive system.
//!
//! A subscriber is any re-runnable unit of work whose reads are tracked:
//! plain effects, the lazy effect behind a computed value, watchers and
//! component render functions. The dependency store only ever sees them
//! through the type-erased [`Subscriber`] trait.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::deps::Dep;

/// Unique identifier for a subscriber.
///
/// Dependency sets are keyed by this ID, which is what makes duplicate
/// subscriptions impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a subscriber, as stored in dependency sets and on
/// the context stack.
pub(crate) trait Subscriber {
    fn id(&self) -> SubscriberId;

    /// The dependency entries this subscriber currently sits in.
    fn deps(&self) -> &RefCell<SmallVec<[Dep; 4]>>;

    /// Called by `trigger`. Hands the subscriber to its scheduler, or runs it
    /// in place when it has none.
    fn notify(self: Rc<Self>);

    /// Run the subscriber now, discarding its result.
    fn execute(self: Rc<Self>);
}

/// A queued unit of work: one subscriber, as seen by a scheduler.
///
/// Jobs compare and hash by subscriber ID, so a set of jobs holds each
/// subscriber at most once.
#[derive(Clone)]
pub struct Job(pub(crate) Rc<dyn Subscriber>);

impl Job {
    pub fn id(&self) -> SubscriberId {
        self.0.id()
    }

    /// Run the underlying subscriber.
    pub fn run(&self) {
        Rc::clone(&self.0).execute();
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Job {}

impl Hash for Job {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Job").field(&self.id()).finish()
    }
}
