//! In-memory host tree.
//!
//! [`MemoryHost`] realizes the adapter contract against a node arena and
//! records every call in an operation log, which is what tests assert on.
//! It mirrors how a document host applies props:
//!
//! - `class` sets the class name;
//! - `on<Event>` keys manage one invoker per event, stamped with the logical
//!   time it was attached, and events older than their invoker are ignored;
//! - known properties are set as properties, with `""` coerced to `true` for
//!   boolean ones (`form` on `input` is always an attribute);
//! - everything else becomes a string attribute.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;
use tracing::warn;

use super::host::{HostAdapter, HostNode};
use crate::value::{Event, Value};

/// Properties realized as booleans.
const BOOLEAN_PROPS: &[&str] = &[
    "autofocus", "checked", "disabled", "hidden", "multiple", "readonly", "required", "selected",
];

/// Other keys realized as properties rather than attributes.
const VALUE_PROPS: &[&str] = &["form", "id", "name", "placeholder", "title", "type", "value"];

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    CreateElement { node: HostNode, tag: String },
    CreateText { node: HostNode, text: String },
    SetText { node: HostNode, text: String },
    SetElementText { node: HostNode, text: String },
    Insert { node: HostNode, parent: HostNode, anchor: Option<HostNode> },
    Remove { node: HostNode },
    PatchProp { node: HostNode, key: String },
}

impl Op {
    /// Whether the operation creates a node.
    pub fn is_create(&self) -> bool {
        matches!(self, Op::CreateElement { .. } | Op::CreateText { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Element(String),
    Text(String),
}

struct Invoker {
    value: Value,
    attached: u64,
}

struct NodeData {
    kind: Kind,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
    class: String,
    attrs: IndexMap<String, String>,
    props: IndexMap<String, Value>,
    invokers: HashMap<String, Invoker>,
}

impl NodeData {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            class: String::new(),
            attrs: IndexMap::new(),
            props: IndexMap::new(),
            invokers: HashMap::new(),
        }
    }
}

/// Arena-backed host tree with an operation log.
#[derive(Default)]
pub struct MemoryHost {
    nodes: RefCell<Vec<NodeData>>,
    ops: RefCell<Vec<Op>>,
    clock: Cell<u64>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container element. Not recorded in the log.
    pub fn create_root(&self) -> HostNode {
        self.alloc(Kind::Element("root".to_owned()))
    }

    /// Every adapter call since creation or the last [`clear_ops`](Self::clear_ops).
    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    /// Current logical time.
    pub fn now(&self) -> u64 {
        self.clock.get()
    }

    pub fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.with(node, |n| n.children.clone()).unwrap_or_default()
    }

    pub fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.with(node, |n| n.parent).flatten()
    }

    /// Tag of an element, `None` for text nodes.
    pub fn tag(&self, node: HostNode) -> Option<String> {
        self.with(node, |n| match &n.kind {
            Kind::Element(tag) => Some(tag.clone()),
            Kind::Text(_) => None,
        })
        .flatten()
    }

    /// Concatenated text of a node and its descendants.
    pub fn text_content(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    pub fn class_name(&self, node: HostNode) -> String {
        self.with(node, |n| n.class.clone()).unwrap_or_default()
    }

    pub fn attribute(&self, node: HostNode, key: &str) -> Option<String> {
        self.with(node, |n| n.attrs.get(key).cloned()).flatten()
    }

    pub fn property(&self, node: HostNode, key: &str) -> Option<Value> {
        self.with(node, |n| n.props.get(key).cloned()).flatten()
    }

    /// Whether an invoker is attached for `event`.
    pub fn has_listener(&self, node: HostNode, event: &str) -> bool {
        self.with(node, |n| n.invokers.contains_key(event)).unwrap_or(false)
    }

    /// Dispatch `event` at `node` with the current logical time and bubble it
    /// to the root. Returns how many handlers ran.
    pub fn dispatch(&self, node: HostNode, event: &str) -> usize {
        self.dispatch_event(node, &Event::new(event.to_lowercase(), self.now()))
    }

    /// Dispatch a prepared event. Invokers attached after `event.timestamp`
    /// ignore it.
    pub fn dispatch_event(&self, node: HostNode, event: &Event) -> usize {
        let mut ran = 0;
        let mut current = Some(node);
        while let Some(target) = current {
            let handlers = self
                .with(target, |n| {
                    n.invokers
                        .get(&event.name)
                        .filter(|invoker| event.timestamp >= invoker.attached)
                        .map(|invoker| invoker.value.clone())
                })
                .flatten();

            match handlers {
                Some(Value::Handler(handler)) => {
                    handler.call(event);
                    ran += 1;
                }
                Some(Value::Handlers(handlers)) => {
                    for handler in handlers.iter() {
                        handler.call(event);
                        ran += 1;
                    }
                }
                _ => {}
            }
            current = self.parent(target);
        }
        ran
    }

    /// Markup-like rendering of the subtree under `node`, children only when
    /// `node` is a container.
    pub fn serialize(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialize just the children of `container`.
    pub fn inner_html(&self, container: HostNode) -> String {
        let mut out = String::new();
        for child in self.children(container) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn alloc(&self, kind: Kind) -> HostNode {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(NodeData::new(kind));
        HostNode::from_raw(nodes.len() as u64 - 1)
    }

    fn log(&self, op: Op) {
        self.ops.borrow_mut().push(op);
    }

    fn with<R>(&self, node: HostNode, f: impl FnOnce(&NodeData) -> R) -> Option<R> {
        self.nodes.borrow().get(node.raw() as usize).map(f)
    }

    fn with_mut<R>(&self, node: HostNode, f: impl FnOnce(&mut NodeData) -> R) -> Option<R> {
        self.nodes.borrow_mut().get_mut(node.raw() as usize).map(f)
    }

    fn detach(&self, node: HostNode) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        self.with_mut(parent, |p| p.children.retain(|c| *c != node));
        self.with_mut(node, |n| n.parent = None);
    }

    fn tick(&self) -> u64 {
        let t = self.clock.get() + 1;
        self.clock.set(t);
        t
    }

    fn collect_text(&self, node: HostNode, out: &mut String) {
        let Some((kind, children)) = self.with(node, |n| (n.kind.clone(), n.children.clone())) else {
            return;
        };
        if let Kind::Text(text) = kind {
            out.push_str(&text);
        }
        for child in children {
            self.collect_text(child, out);
        }
    }

    fn write_node(&self, node: HostNode, out: &mut String) {
        let Some((kind, class, attrs, props, children)) = self.with(node, |n| {
            (
                n.kind.clone(),
                n.class.clone(),
                n.attrs.clone(),
                n.props.clone(),
                n.children.clone(),
            )
        }) else {
            return;
        };

        let tag = match kind {
            Kind::Text(text) => {
                out.push_str(&text);
                return;
            }
            Kind::Element(tag) => tag,
        };

        let _ = write!(out, "<{tag}");
        if !class.is_empty() {
            let _ = write!(out, " class=\"{class}\"");
        }
        for (key, value) in &attrs {
            let _ = write!(out, " {key}=\"{value}\"");
        }
        for (key, value) in &props {
            match value {
                Value::Bool(true) => {
                    let _ = write!(out, " {key}");
                }
                Value::Bool(false) | Value::Null => {}
                other => {
                    let _ = write!(out, " {key}=\"{other}\"");
                }
            }
        }
        out.push('>');
        for child in children {
            self.write_node(child, out);
        }
        let _ = write!(out, "</{tag}>");
    }

    fn patch_event(&self, node: HostNode, event: String, new: Option<&Value>) {
        match new.filter(|v| v.is_handler()) {
            Some(value) => {
                let attached = self.tick();
                self.with_mut(node, |n| match n.invokers.get_mut(&event) {
                    // Swapping the handler keeps the original attach time.
                    Some(invoker) => invoker.value = value.clone(),
                    None => {
                        n.invokers.insert(
                            event,
                            Invoker {
                                value: value.clone(),
                                attached,
                            },
                        );
                    }
                });
            }
            None => {
                self.with_mut(node, |n| n.invokers.remove(&event));
            }
        }
    }
}

fn should_set_as_prop(tag: &str, key: &str) -> bool {
    if key == "form" && tag == "input" {
        return false;
    }
    BOOLEAN_PROPS.contains(&key) || VALUE_PROPS.contains(&key)
}

impl HostAdapter for MemoryHost {
    fn create_element(&self, tag: &str) -> HostNode {
        let node = self.alloc(Kind::Element(tag.to_owned()));
        self.log(Op::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        node
    }

    fn create_text(&self, text: &str) -> HostNode {
        let node = self.alloc(Kind::Text(text.to_owned()));
        self.log(Op::CreateText {
            node,
            text: text.to_owned(),
        });
        node
    }

    fn set_text(&self, node: HostNode, text: &str) {
        self.with_mut(node, |n| {
            if let Kind::Text(current) = &mut n.kind {
                *current = text.to_owned();
            }
        });
        self.log(Op::SetText {
            node,
            text: text.to_owned(),
        });
    }

    fn set_element_text(&self, node: HostNode, text: &str) {
        for child in self.children(node) {
            self.detach(child);
        }
        if !text.is_empty() {
            let run = self.alloc(Kind::Text(text.to_owned()));
            self.with_mut(run, |n| n.parent = Some(node));
            self.with_mut(node, |n| n.children.push(run));
        }
        self.log(Op::SetElementText {
            node,
            text: text.to_owned(),
        });
    }

    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        self.detach(node);
        self.with_mut(parent, |p| {
            let at = anchor.and_then(|a| p.children.iter().position(|c| *c == a));
            if anchor.is_some() && at.is_none() {
                warn!(?anchor, ?parent, "insert anchor is not a child of the parent; appending");
            }
            match at {
                Some(index) => p.children.insert(index, node),
                None => p.children.push(node),
            }
        });
        self.with_mut(node, |n| n.parent = Some(parent));
        self.log(Op::Insert {
            node,
            parent,
            anchor,
        });
    }

    fn remove(&self, node: HostNode) {
        self.detach(node);
        self.log(Op::Remove { node });
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let parent = self.parent(node)?;
        self.with(parent, |p| {
            let index = p.children.iter().position(|c| *c == node)?;
            p.children.get(index + 1).copied()
        })
        .flatten()
    }

    fn patch_prop(&self, node: HostNode, key: &str, _old: Option<&Value>, new: Option<&Value>) {
        self.log(Op::PatchProp {
            node,
            key: key.to_owned(),
        });

        if let Some(event) = key.strip_prefix("on").filter(|e| !e.is_empty()) {
            self.patch_event(node, event.to_lowercase(), new);
            return;
        }

        let tag = self.tag(node).unwrap_or_default();
        self.with_mut(node, |n| {
            if key == "class" {
                n.class = new.map(Value::to_string).unwrap_or_default();
            } else if should_set_as_prop(&tag, key) {
                let value = match new {
                    Some(Value::Str(s)) if s.is_empty() && BOOLEAN_PROPS.contains(&key) => {
                        Value::Bool(true)
                    }
                    Some(v) if BOOLEAN_PROPS.contains(&key) => Value::Bool(v.is_truthy()),
                    Some(v) => v.clone(),
                    None if BOOLEAN_PROPS.contains(&key) => Value::Bool(false),
                    None => Value::Null,
                };
                n.props.insert(key.to_owned(), value);
            } else {
                match new {
                    Some(v) => {
                        n.attrs.insert(key.to_owned(), v.to_string());
                    }
                    None => {
                        n.attrs.shift_remove(key);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::value::Handler;

    #[test]
    fn insert_respects_anchor_and_moves_nodes() {
        let host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_text("a");
        let b = host.create_text("b");
        let c = host.create_text("c");

        host.insert(a, root, None);
        host.insert(c, root, None);
        host.insert(b, root, Some(c));
        assert_eq!(host.children(root), [a, b, c]);
        assert_eq!(host.next_sibling(a), Some(b));
        assert_eq!(host.next_sibling(c), None);

        // Re-inserting moves.
        host.insert(a, root, None);
        assert_eq!(host.children(root), [b, c, a]);
        assert_eq!(host.text_content(root), "bca");
    }

    #[test]
    fn boolean_props_coerce_empty_string() {
        let host = MemoryHost::new();
        let button = host.create_element("button");

        host.patch_prop(button, "disabled", None, Some(&Value::from("")));
        assert_eq!(host.property(button, "disabled"), Some(Value::Bool(true)));

        host.patch_prop(button, "disabled", None, Some(&Value::Bool(false)));
        assert_eq!(host.property(button, "disabled"), Some(Value::Bool(false)));
    }

    #[test]
    fn form_on_input_is_an_attribute() {
        let host = MemoryHost::new();
        let input = host.create_element("input");

        host.patch_prop(input, "form", None, Some(&Value::from("signup")));
        assert_eq!(host.attribute(input, "form"), Some("signup".to_owned()));
        assert_eq!(host.property(input, "form"), None);

        host.patch_prop(input, "data-id", None, Some(&Value::from(7)));
        assert_eq!(host.attribute(input, "data-id"), Some("7".to_owned()));
        host.patch_prop(input, "data-id", Some(&Value::from(7)), None);
        assert_eq!(host.attribute(input, "data-id"), None);
    }

    #[test]
    fn class_is_set_directly() {
        let host = MemoryHost::new();
        let div = host.create_element("div");
        host.patch_prop(div, "class", None, Some(&Value::from("a b")));
        assert_eq!(host.class_name(div), "a b");
        assert_eq!(host.serialize(div), r#"<div class="a b"></div>"#);
    }

    #[test]
    fn events_older_than_the_invoker_are_ignored() {
        let host = MemoryHost::new();
        let button = host.create_element("button");
        let clicks = Rc::new(Cell::new(0));

        let before = host.now();
        let c = Rc::clone(&clicks);
        let handler = Value::from(Handler::new(move |_| c.set(c.get() + 1)));
        host.patch_prop(button, "onClick", None, Some(&handler));

        assert_eq!(host.dispatch_event(button, &Event::new("click", before)), 0);
        assert_eq!(host.dispatch(button, "click"), 1);
        assert_eq!(clicks.get(), 1);

        host.patch_prop(button, "onClick", Some(&handler), None);
        assert!(!host.has_listener(button, "click"));
        assert_eq!(host.dispatch(button, "click"), 0);
    }

    #[test]
    fn events_bubble_to_ancestors() {
        let host = MemoryHost::new();
        let outer = host.create_element("div");
        let inner = host.create_element("span");
        host.insert(inner, outer, None);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        let a = Handler::new(move |e| log.borrow_mut().push(format!("outer:{}", e.name)));
        let log = Rc::clone(&seen);
        let b = Handler::new(move |e| log.borrow_mut().push(format!("inner:{}", e.name)));
        host.patch_prop(outer, "onClick", None, Some(&Value::from(a)));
        host.patch_prop(inner, "onClick", None, Some(&Value::from(vec![b])));

        assert_eq!(host.dispatch(inner, "click"), 2);
        assert_eq!(*seen.borrow(), ["inner:click", "outer:click"]);
    }

    #[test]
    fn set_element_text_replaces_children() {
        let host = MemoryHost::new();
        let div = host.create_element("div");
        let child = host.create_element("span");
        host.insert(child, div, None);

        host.set_element_text(div, "hello");
        assert_eq!(host.parent(child), None);
        assert_eq!(host.text_content(div), "hello");

        host.set_element_text(div, "");
        assert!(host.children(div).is_empty());
    }
}
