//! Rendering
//!
//! Virtual trees and the reconciler that applies them to a host.
//!
//! - [`VNode`]: one node of a virtual tree (element, text or component).
//! - [`Renderer`]: mounts, patches and unmounts virtual trees through a
//!   [`HostAdapter`], including the keyed diff of child sequences.
//! - [`ComponentDef`]: stateful components whose render functions re-run
//!   through the batched job queue when their state or props change.
//! - [`MemoryHost`]: an in-memory host with an operation log.

mod component;
mod host;
mod keyed;
mod memory;
mod renderer;
mod vnode;

pub use component::{
    has_props_changed, resolve_props, ComponentDef, LifecycleHook, RenderContext, RenderFn,
    SetupContext, SetupResult, SlotFn, Slots,
};
pub use host::{HostAdapter, HostNode};
pub use memory::{MemoryHost, Op};
pub use renderer::Renderer;
pub use vnode::{normalize_class, Children, Props, VNode};
