//! Error types shared across the crate.

use thiserror::Error;

/// Convenient result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors reported by the reactive core and the reconciler.
///
/// None of these are fatal: callers get the error back and the condition is
/// also logged through `tracing`. Panics raised by user callbacks (effects,
/// watch callbacks, render functions, lifecycle hooks) are not converted into
/// errors; they unwind through the scheduler untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A render context was asked for a key that neither the component state,
    /// its props nor its setup bindings declare.
    #[error("`{key}` is not defined on component `{component}`")]
    UnknownKey { component: String, key: String },

    /// A render context write targeted a prop. Props belong to the parent.
    #[error("attempted to mutate prop `{key}` of component `{component}`; props are readonly")]
    ReadonlyProp { component: String, key: String },

    /// A JSON value that is not an object was used where a record is required.
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}
