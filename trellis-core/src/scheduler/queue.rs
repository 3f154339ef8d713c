//! Job Queue
//!
//! Deduplicating queue for re-render jobs. Enqueueing a job that is already
//! pending is a no-op, and the first enqueue of a turn schedules exactly one
//! microtask that flushes the queue.
//!
//! # Flush semantics
//!
//! A flush takes the pending set as a batch and runs it in first-enqueue
//! order. Enqueueing a job that is still waiting in the running batch is a
//! no-op, so it runs once with whatever state it finds when its turn comes.
//! Any other job enqueued while the batch runs, including the job that is
//! running, lands in a fresh pending set and is flushed by the next
//! microtask. When the flush ends, normally or by unwinding out of a
//! panicking job, the rest of the batch is dropped, the "flush scheduled"
//! flag is released and a follow-up flush is scheduled if anything is
//! pending.
//!
//! A job that keeps re-enqueueing itself would chain flushes forever. Runs
//! are counted per job across a chain of back-to-back flushes, and a job
//! that exceeds the configured recursion limit is dropped with an error.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use indexmap::IndexSet;
use tracing::{debug, error, warn};

use crate::reactive::{Job, Runtime, SubscriberId};

#[derive(Default)]
pub(crate) struct JobQueue {
    pending: RefCell<IndexSet<Job>>,
    batch: RefCell<IndexSet<Job>>,
    flush_scheduled: Cell<bool>,
    runs: RefCell<HashMap<SubscriberId, usize>>,
}

impl JobQueue {
    /// Add a job. Returns `true` when the caller must schedule a flush.
    pub(crate) fn push(&self, job: Job) -> bool {
        if self.batch.borrow().contains(&job) {
            return false;
        }
        self.pending.borrow_mut().insert(job);
        if self.flush_scheduled.get() {
            return false;
        }
        self.flush_scheduled.set(true);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub(crate) fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled.get()
    }

    /// Run every job pending at the start of the call.
    pub(crate) fn flush(&self, runtime: &Runtime) {
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        debug!(jobs = batch.len(), "flushing job queue");
        *self.batch.borrow_mut() = batch;
        let _release = FlushGuard {
            queue: self,
            runtime,
        };
        let limit = runtime.config().recursion_limit;

        loop {
            let next = self.batch.borrow_mut().shift_remove_index(0);
            let Some(job) = next else {
                break;
            };
            if !self.record_run(job.id(), limit) {
                error!(job = ?job.id(), limit, "job exceeded the recursion limit and was dropped");
                continue;
            }
            job.run();
        }
    }

    fn record_run(&self, id: SubscriberId, limit: usize) -> bool {
        let mut runs = self.runs.borrow_mut();
        let count = runs.entry(id).or_insert(0);
        *count += 1;
        *count <= limit
    }
}

/// Releases the queue's bookkeeping at the end of a flush.
struct FlushGuard<'a> {
    queue: &'a JobQueue,
    runtime: &'a Runtime,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.queue.batch.borrow_mut().clear();
        self.queue.flush_scheduled.set(false);
        if std::thread::panicking() {
            warn!("a job panicked during flush; the rest of its batch was dropped");
        }

        if self.queue.len() > 0 {
            self.queue.flush_scheduled.set(true);
            self.runtime.schedule_flush();
        } else {
            self.queue.runs.borrow_mut().clear();
        }
    }
}
