//! Microtask Hosts
//!
//! The job queue never flushes synchronously. It asks a [`MicrotaskHost`] to
//! run the flush "later": after the synchronous code that enqueued the job has
//! finished. Which later is up to the host.
//!
//! - [`LocalMicrotasks`] keeps a FIFO that the embedder drains explicitly,
//!   typically once per turn of its own event loop
//!   (see [`Runtime::run_microtasks`](crate::reactive::Runtime::run_microtasks)).
//! - `TokioMicrotasks` (feature `tokio`) spawns each microtask onto the
//!   current `LocalSet`.

use std::cell::RefCell;
use std::collections::VecDeque;

/// A deferred unit of work.
pub type Microtask = Box<dyn FnOnce()>;

/// Something that can run a task after the current synchronous turn.
pub trait MicrotaskHost {
    fn queue_microtask(&self, task: Microtask);
}

/// A FIFO of microtasks drained by the embedder.
#[derive(Default)]
pub struct LocalMicrotasks {
    queue: RefCell<VecDeque<Microtask>>,
}

impl LocalMicrotasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Run queued microtasks until none are left, including ones queued by
    /// the tasks themselves. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(task) = next else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }
}

impl MicrotaskHost for LocalMicrotasks {
    fn queue_microtask(&self, task: Microtask) {
        self.queue.borrow_mut().push_back(task);
    }
}

/// Runs microtasks as local tokio tasks.
///
/// Must be used from within a `tokio::task::LocalSet`.
#[cfg(feature = "tokio")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioMicrotasks;

#[cfg(feature = "tokio")]
impl MicrotaskHost for TokioMicrotasks {
    fn queue_microtask(&self, task: Microtask) {
        let _handle = tokio::task::spawn_local(async move { task() });
    }
}
