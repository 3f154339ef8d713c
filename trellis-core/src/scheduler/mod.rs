//! Scheduling
//!
//! When a subscriber is triggered, its [`Scheduler`] decides what happens:
//! run it right away ([`Immediate`]), defer it to the batched job queue
//! ([`Batched`]), or anything else a closure `Fn(Job)` wants, such as the
//! dirty-flag flip behind computed values.

mod microtask;
mod queue;

pub use microtask::{LocalMicrotasks, Microtask, MicrotaskHost};
#[cfg(feature = "tokio")]
pub use microtask::TokioMicrotasks;
pub(crate) use queue::JobQueue;

use crate::reactive::{Job, WeakRuntime};

/// Strategy deciding when a triggered subscriber re-runs.
pub trait Scheduler {
    fn schedule(&self, job: Job);
}

impl<F> Scheduler for F
where
    F: Fn(Job),
{
    fn schedule(&self, job: Job) {
        self(job);
    }
}

/// Re-runs the subscriber synchronously, inside the write that triggered it.
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

impl Scheduler for Immediate {
    fn schedule(&self, job: Job) {
        job.run();
    }
}

/// Defers the subscriber to the runtime's job queue, which deduplicates it
/// and flushes once per microtask turn.
#[derive(Clone)]
pub struct Batched {
    runtime: WeakRuntime,
}

impl Batched {
    pub(crate) fn new(runtime: WeakRuntime) -> Self {
        Self { runtime }
    }
}

impl Scheduler for Batched {
    fn schedule(&self, job: Job) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.queue_job(job);
        }
    }
}
