//! Reactive Primitives
//!
//! This module implements the dependency-tracking core: observed objects,
//! effects, computed values and watchers, all coordinated by a [`Runtime`].
//!
//! # Concepts
//!
//! ## Observed objects
//!
//! A [`Reactive`] wraps a raw [`Object`](crate::value::Object). Reading a field
//! through it records the running subscriber as a dependent of that field;
//! writing a field notifies every dependent.
//!
//! ## Effects
//!
//! An [`Effect`] is a re-runnable computation. Its dependencies are
//! re-collected on every run, so it only ever depends on what its most
//! recent run actually read.
//!
//! ## Computed values
//!
//! A [`Computed`] caches a derived value and recomputes it on the first read
//! after one of its dependencies changed.
//!
//! ## Watchers
//!
//! A [`Watcher`] calls back with `(new, old)` whenever the value produced by
//! its getter is invalidated.
//!
//! # Implementation Notes
//!
//! Reads are attributed through a context stack owned by the runtime. Every
//! push is paired with a scoped pop, so a panicking subscriber cannot leave a
//! stale entry behind.

mod computed;
mod context;
mod deps;
mod effect;
mod object;
mod runtime;
mod subscriber;
mod watch;

pub use computed::Computed;
pub use effect::{Effect, EffectOptions};
pub use object::{Reactive, Readonly};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub(crate) use runtime::WeakRuntime;
pub use subscriber::{Job, SubscriberId};
pub use watch::Watcher;
