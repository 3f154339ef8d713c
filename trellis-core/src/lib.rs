//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive UI layer.
//! It implements:
//!
//! - Reactive primitives (observed objects, effects, computed values, watchers)
//! - A deduplicating job queue flushed once per microtask turn
//! - Virtual trees and a reconciler with a four-pointer keyed diff
//! - Stateful components re-rendered through the job queue
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: dependency tracking and the [`Runtime`](reactive::Runtime)
//! - `scheduler`: scheduling strategies, the job queue and microtask hosts
//! - `render`: virtual nodes, the host adapter interface and the renderer
//! - `value`: dynamically typed values and raw objects
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use trellis_core::reactive::Runtime;
//! use trellis_core::render::{MemoryHost, Renderer, VNode};
//! use trellis_core::value::Object;
//!
//! let rt = Runtime::new();
//! let state = rt.reactive(&Object::new().with("count", 1));
//!
//! let host = Rc::new(MemoryHost::new());
//! let root = host.create_root();
//! let renderer = Renderer::new(&rt, host.clone());
//!
//! let s = state.clone();
//! let r = renderer.clone();
//! let _effect = rt.effect(move || {
//!     let count = s.get("count").unwrap_or_default();
//!     r.render(Some(VNode::element("p").text_child(count.to_string())), root);
//! });
//!
//! state.set("count", 2);
//! state.set("count", 3);
//! // Both writes collapse into one re-render on the next flush.
//! assert_eq!(rt.run_microtasks(), 1);
//! assert_eq!(host.inner_html(root), "<p>3</p>");
//! ```

pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;
pub mod value;

pub use error::{Error, Result};
