//! Reactive Context
//!
//! The context stack records which subscriber is currently running, so a
//! read can be attributed to it. Running a subscriber pushes it; the
//! returned [`ContextGuard`] pops it when dropped, on every exit path
//! including unwinding out of a panicking user callback.
//!
//! Nested runs (a subscriber that creates and runs another one) simply stack:
//! when the inner guard drops, the outer subscriber is active again.
//!
//! The stack belongs to one [`Runtime`](super::Runtime); there is no ambient
//! global state.

use std::cell::RefCell;
use std::rc::Rc;

use super::subscriber::{Subscriber, SubscriberId};

/// An entry in the context stack.
#[derive(Clone)]
enum Frame {
    /// A subscriber is running; reads are attributed to it.
    Tracking(Rc<dyn Subscriber>),
    /// Tracking is paused (see [`Runtime::untracked`](super::Runtime::untracked)).
    Paused,
}

#[derive(Default)]
pub(crate) struct ContextStack {
    frames: RefCell<Vec<Frame>>,
}

impl ContextStack {
    /// Enter a tracking frame for `subscriber`.
    pub(crate) fn enter(&self, subscriber: Rc<dyn Subscriber>) -> ContextGuard<'_> {
        let id = Some(subscriber.id());
        self.frames.borrow_mut().push(Frame::Tracking(subscriber));
        ContextGuard { stack: self, id }
    }

    /// Enter a frame in which reads are not tracked.
    pub(crate) fn pause(&self) -> ContextGuard<'_> {
        self.frames.borrow_mut().push(Frame::Paused);
        ContextGuard {
            stack: self,
            id: None,
        }
    }

    /// The subscriber reads are attributed to right now, if any.
    pub(crate) fn current(&self) -> Option<Rc<dyn Subscriber>> {
        match self.frames.borrow().last()? {
            Frame::Tracking(subscriber) => Some(Rc::clone(subscriber)),
            Frame::Paused => None,
        }
    }

    /// The innermost subscriber that is executing, even if tracking is
    /// paused above it.
    pub(crate) fn executing(&self) -> Option<SubscriberId> {
        self.frames.borrow().iter().rev().find_map(|frame| match frame {
            Frame::Tracking(subscriber) => Some(subscriber.id()),
            Frame::Paused => None,
        })
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.borrow().len()
    }
}

/// Pops its frame from the context stack when dropped.
pub(crate) struct ContextGuard<'a> {
    stack: &'a ContextStack,
    id: Option<SubscriberId>,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let popped = self.stack.frames.borrow_mut().pop();

        // Frames must unwind in the order they were pushed.
        if let Some(frame) = popped {
            let popped_id = match frame {
                Frame::Tracking(subscriber) => Some(subscriber.id()),
                Frame::Paused => None,
            };
            debug_assert_eq!(
                popped_id, self.id,
                "ContextGuard mismatch: expected {:?}, got {:?}",
                self.id, popped_id
            );
        }
    }
}
