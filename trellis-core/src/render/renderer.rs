//! Reconciler.
//!
//! The renderer turns a pair (previous tree, next tree) into adapter calls.
//! Each position moves through the same states:
//!
//! ```text
//! unmounted --mount--> mounted --patch--> mounted
//!                         |
//!                         +---unmount---> unmounted
//! ```
//!
//! Nodes of different types at the same position are never diffed: the old
//! one is unmounted and the new one mounted in its place.
//!
//! Component nodes get an instance whose render function runs inside a
//! batched effect. Its first run mounts the rendered subtree, later runs
//! patch the previous subtree against the new one.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use super::component::{ComponentInstance, LifecycleHook, Phase};
use super::host::{HostAdapter, HostNode};
use super::vnode::{Children, Props, VNode, VNodeKind};
use crate::reactive::Runtime;

struct RendererInner {
    runtime: Runtime,
    host: Rc<dyn HostAdapter>,
    roots: RefCell<HashMap<HostNode, VNode>>,
}

/// Renders virtual trees into containers of one host.
#[derive(Clone)]
pub struct Renderer {
    inner: Rc<RendererInner>,
}

impl Renderer {
    pub fn new(runtime: &Runtime, host: Rc<dyn HostAdapter>) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                runtime: runtime.clone(),
                host,
                roots: RefCell::default(),
            }),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Render `vnode` into `container`, diffing against whatever was rendered
    /// there last. `None` unmounts the previous tree.
    pub fn render(&self, vnode: Option<VNode>, container: HostNode) {
        let old = self.inner.roots.borrow_mut().remove(&container);
        match vnode {
            Some(new) => {
                self.patch(old.as_ref(), &new, container, None);
                self.inner.roots.borrow_mut().insert(container, new);
            }
            None => {
                if let Some(old) = old {
                    self.unmount(&old);
                }
            }
        }
    }

    /// Host node at the root of the tree last rendered into `container`.
    pub fn root_host(&self, container: HostNode) -> Option<HostNode> {
        self.inner.roots.borrow().get(&container).and_then(VNode::host)
    }

    pub(super) fn host(&self) -> &dyn HostAdapter {
        self.inner.host.as_ref()
    }

    /// Bring the host tree from `old` to `new`. Without `old`, `new` is
    /// mounted into `container` before `anchor`.
    pub(super) fn patch(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let (old, anchor) = match old {
            Some(old) if !old.same_type(new) => {
                // Mount the replacement where the old node was.
                let next = old.host().and_then(|node| self.host().next_sibling(node));
                self.unmount(old);
                (None, next.or(anchor))
            }
            other => (other, anchor),
        };

        match (&new.kind, old) {
            (VNodeKind::Element { .. }, None) => self.mount_element(new, container, anchor),
            (VNodeKind::Element { .. }, Some(old)) => self.patch_element(old, new),
            (VNodeKind::Text(text), None) => {
                let node = self.host().create_text(text);
                new.host.set(Some(node));
                self.host().insert(node, container, anchor);
            }
            (VNodeKind::Text(text), Some(old)) => {
                let node = old.host.get();
                new.host.set(node);
                if let (Some(node), VNodeKind::Text(prev)) = (node, &old.kind) {
                    if prev != text {
                        self.host().set_text(node, text);
                    }
                }
            }
            (VNodeKind::Component { .. }, None) => self.mount_component(new, container, anchor),
            (VNodeKind::Component { .. }, Some(old)) => {
                self.patch_component(old, new, container, anchor)
            }
        }
    }

    /// Tear down `vnode` and remove its host node.
    pub(super) fn unmount(&self, vnode: &VNode) {
        self.teardown(vnode, true);
    }

    /// Move the host node of `vnode` before `anchor`.
    pub(super) fn move_before(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        if let Some(node) = vnode.host() {
            self.host().insert(node, container, anchor);
        }
    }

    fn mount_element(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let VNodeKind::Element {
            tag,
            props,
            children,
        } = &vnode.kind
        else {
            return;
        };

        let el = self.host().create_element(tag);
        vnode.host.set(Some(el));

        match children {
            Children::Text(text) => self.host().set_element_text(el, text),
            Children::Nodes(nodes) => {
                for child in nodes {
                    self.patch(None, child, el, None);
                }
            }
            Children::None => {}
        }
        for (key, value) in props {
            self.host().patch_prop(el, key, None, Some(value));
        }
        self.host().insert(el, container, anchor);
    }

    fn patch_element(&self, old: &VNode, new: &VNode) {
        let (
            VNodeKind::Element {
                props: old_props,
                children: old_children,
                ..
            },
            VNodeKind::Element {
                props: new_props,
                children: new_children,
                ..
            },
        ) = (&old.kind, &new.kind)
        else {
            return;
        };
        let Some(el) = old.host.get() else {
            warn!(?old, "patching an element that was never mounted");
            return;
        };
        new.host.set(Some(el));

        self.patch_props(el, old_props, new_props);
        self.patch_children(old_children, new_children, el);
    }

    fn patch_props(&self, el: HostNode, old: &Props, new: &Props) {
        for (key, value) in new {
            let prev = old.get(key);
            if prev != Some(value) {
                self.host().patch_prop(el, key, prev, Some(value));
            }
        }
        for (key, value) in old {
            if !new.contains_key(key) {
                self.host().patch_prop(el, key, Some(value), None);
            }
        }
    }

    fn patch_children(&self, old: &Children, new: &Children, el: HostNode) {
        match (old, new) {
            (Children::Text(prev), Children::Text(text)) => {
                if prev != text {
                    self.host().set_element_text(el, text);
                }
            }
            (old, Children::Text(text)) => {
                if let Children::Nodes(nodes) = old {
                    for child in nodes {
                        self.unmount(child);
                    }
                }
                self.host().set_element_text(el, text);
            }
            (Children::Nodes(old_nodes), Children::Nodes(new_nodes)) => {
                self.patch_keyed_children(old_nodes, new_nodes, el);
            }
            (old, Children::Nodes(new_nodes)) => {
                if let Children::Text(_) = old {
                    self.host().set_element_text(el, "");
                }
                for child in new_nodes {
                    self.patch(None, child, el, None);
                }
            }
            (Children::Nodes(old_nodes), Children::None) => {
                for child in old_nodes {
                    self.unmount(child);
                }
            }
            (Children::Text(_), Children::None) => self.host().set_element_text(el, ""),
            (Children::None, Children::None) => {}
        }
    }

    fn mount_component(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let VNodeKind::Component {
            def,
            props,
            slots,
            instance: slot,
        } = &vnode.kind
        else {
            return;
        };

        let instance = ComponentInstance::create(&self.inner.runtime, def, props, slots);
        *slot.borrow_mut() = Some(Rc::clone(&instance));

        let renderer = Rc::downgrade(&self.inner);
        let weak = Rc::downgrade(&instance);
        let effect = self.inner.runtime.effect(move || {
            let (Some(inner), Some(instance)) = (renderer.upgrade(), weak.upgrade()) else {
                return;
            };
            Renderer { inner }.render_component(&instance, container, anchor);
        });
        *instance.effect.borrow_mut() = Some(effect);
    }

    /// Body of a component's render effect.
    fn render_component(
        &self,
        instance: &ComponentInstance,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let name = instance.def().name();
        match instance.phase() {
            Phase::Unmounted => {}
            Phase::Created => {
                let sub_tree = instance.render();
                instance.call_hook(LifecycleHook::BeforeMount);
                self.patch(None, &sub_tree, container, anchor);
                *instance.sub_tree.borrow_mut() = Some(sub_tree);
                instance.set_phase(Phase::Mounted);
                debug!(component = name, "component mounted");
                instance.call_hook(LifecycleHook::Mounted);
            }
            Phase::Mounted => {
                let sub_tree = instance.render();
                instance.call_hook(LifecycleHook::BeforeUpdate);
                let prev = instance.sub_tree.borrow_mut().take();
                self.patch(prev.as_ref(), &sub_tree, container, None);
                *instance.sub_tree.borrow_mut() = Some(sub_tree);
                debug!(component = name, "component updated");
                instance.call_hook(LifecycleHook::Updated);
            }
        }
    }

    fn patch_component(
        &self,
        old: &VNode,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let (
            VNodeKind::Component {
                props: old_props,
                instance: old_slot,
                ..
            },
            VNodeKind::Component {
                props,
                slots,
                instance: new_slot,
                ..
            },
        ) = (&old.kind, &new.kind)
        else {
            return;
        };

        let taken = old_slot.borrow_mut().take();
        let Some(instance) = taken else {
            warn!(component = ?new, "patching a component that was never mounted");
            self.mount_component(new, container, anchor);
            return;
        };
        *new_slot.borrow_mut() = Some(Rc::clone(&instance));
        instance.update(old_props, props, slots);
    }

    /// Run unmount hooks and stop render effects under `vnode`. Only the
    /// outermost host node is removed when `remove` is set; its descendants
    /// go with it.
    fn teardown(&self, vnode: &VNode, remove: bool) {
        match &vnode.kind {
            VNodeKind::Element { children, .. } => {
                if let Children::Nodes(nodes) = children {
                    for child in nodes {
                        self.teardown(child, false);
                    }
                }
                if let (true, Some(node)) = (remove, vnode.host.get()) {
                    self.host().remove(node);
                }
            }
            VNodeKind::Text(_) => {
                if let (true, Some(node)) = (remove, vnode.host.get()) {
                    self.host().remove(node);
                }
            }
            VNodeKind::Component { .. } => {
                if let Some(instance) = vnode.instance() {
                    instance.call_hook(LifecycleHook::BeforeUnmount);
                    instance.stop();
                    let sub_tree = instance.sub_tree.borrow_mut().take();
                    if let Some(sub_tree) = sub_tree {
                        self.teardown(&sub_tree, remove);
                    }
                    instance.set_phase(Phase::Unmounted);
                    debug!(component = instance.def().name(), "component unmounted");
                    instance.call_hook(LifecycleHook::Unmounted);
                }
            }
        }
        vnode.host.set(None);
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("roots", &self.inner.roots.borrow().len())
            .finish()
    }
}
