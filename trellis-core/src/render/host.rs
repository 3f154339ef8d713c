//! Host adapter interface.
//!
//! The reconciler never touches a live tree directly. Every mutation goes
//! through a [`HostAdapter`] injected into the [`Renderer`](super::Renderer),
//! which realizes it against whatever the host is: a document, a terminal
//! buffer, or the in-memory tree in [`MemoryHost`](super::MemoryHost).

use crate::value::Value;

/// Opaque handle to a node realized by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(u64);

impl HostNode {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Operations the reconciler needs from a host tree.
///
/// `patch_prop` receives the previous and next value of one prop. An absent
/// `new` means the prop was removed. Adapters are expected to special-case
/// event keys (`on` followed by the event name), boolean properties and
/// plain attributes.
pub trait HostAdapter {
    fn create_element(&self, tag: &str) -> HostNode;

    fn create_text(&self, text: &str) -> HostNode;

    /// Replace the content of a text node.
    fn set_text(&self, node: HostNode, text: &str);

    /// Replace all children of an element with a single run of text.
    fn set_element_text(&self, node: HostNode, text: &str);

    /// Insert `node` into `parent` before `anchor`, or at the end when there
    /// is no anchor. Inserting a node that already has a parent moves it.
    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>);

    /// Detach `node` from its parent.
    fn remove(&self, node: HostNode);

    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;

    fn patch_prop(&self, node: HostNode, key: &str, old: Option<&Value>, new: Option<&Value>);
}
