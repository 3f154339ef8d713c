//! Virtual nodes.
//!
//! A [`VNode`] describes one node of a UI tree for one render. The reconciler
//! fills in its realized host node (or, for components, its instance) when it
//! is mounted; the previous tree keeps those back-references so the next
//! render can be diffed against it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use super::component::{ComponentDef, ComponentInstance, SlotFn, Slots};
use super::host::HostNode;
use crate::value::{Event, Handler, Value};

/// Props of an element or component, in declaration order.
pub type Props = IndexMap<Rc<str>, Value>;

/// Children of an element.
#[derive(Debug, Default)]
pub enum Children {
    #[default]
    None,
    Text(Rc<str>),
    Nodes(Vec<VNode>),
}

pub(crate) enum VNodeKind {
    Element {
        tag: Rc<str>,
        props: Props,
        children: Children,
    },
    Text(Rc<str>),
    Component {
        def: Rc<ComponentDef>,
        props: Props,
        slots: Slots,
        instance: RefCell<Option<Rc<ComponentInstance>>>,
    },
}

/// Description of one node of a UI tree.
pub struct VNode {
    pub(crate) kind: VNodeKind,
    pub(crate) key: Option<Value>,
    pub(crate) host: Cell<Option<HostNode>>,
}

impl VNode {
    fn with_kind(kind: VNodeKind) -> Self {
        Self {
            kind,
            key: None,
            host: Cell::new(None),
        }
    }

    pub fn element(tag: impl Into<Rc<str>>) -> Self {
        Self::with_kind(VNodeKind::Element {
            tag: tag.into(),
            props: Props::new(),
            children: Children::None,
        })
    }

    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Self::with_kind(VNodeKind::Text(text.into()))
    }

    pub fn component(def: &Rc<ComponentDef>) -> Self {
        Self::with_kind(VNodeKind::Component {
            def: Rc::clone(def),
            props: Props::new(),
            slots: Slots::default(),
            instance: RefCell::new(None),
        })
    }

    /// Key used to match this node among its siblings.
    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set a prop (attribute, property, or component prop).
    pub fn prop(mut self, key: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
        match &mut self.kind {
            VNodeKind::Element { props, .. } | VNodeKind::Component { props, .. } => {
                props.insert(key.into(), value.into());
            }
            VNodeKind::Text(_) => warn!("text nodes have no props"),
        }
        self
    }

    /// Attach an event handler. `on("click", ..)` sets the `onClick` prop.
    pub fn on(self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        let mut chars = event.chars();
        let key = match chars.next() {
            Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
            None => "on".to_owned(),
        };
        self.prop(key, Handler::new(handler))
    }

    /// Set the `class` prop from a string, a list, or an object of flags.
    pub fn class(self, class: impl Into<Value>) -> Self {
        self.prop("class", normalize_class(&class.into()))
    }

    /// Append a child node.
    pub fn child(mut self, child: VNode) -> Self {
        match &mut self.kind {
            VNodeKind::Element { children, .. } => match children {
                Children::Nodes(nodes) => nodes.push(child),
                other => *other = Children::Nodes(vec![child]),
            },
            _ => warn!("only elements take child nodes; use slots for components"),
        }
        self
    }

    /// Replace the children with a sequence of nodes.
    pub fn children(mut self, nodes: impl IntoIterator<Item = VNode>) -> Self {
        match &mut self.kind {
            VNodeKind::Element { children, .. } => {
                *children = Children::Nodes(nodes.into_iter().collect());
            }
            _ => warn!("only elements take child nodes; use slots for components"),
        }
        self
    }

    /// Replace the children with a run of text.
    pub fn text_child(mut self, text: impl Into<Rc<str>>) -> Self {
        match &mut self.kind {
            VNodeKind::Element { children, .. } => *children = Children::Text(text.into()),
            _ => warn!("only elements take text children"),
        }
        self
    }

    /// Pass a named slot to a component.
    pub fn slot(mut self, name: impl Into<Rc<str>>, render: impl Fn() -> VNode + 'static) -> Self {
        match &mut self.kind {
            VNodeKind::Component { slots, .. } => {
                let render: SlotFn = Rc::new(render);
                slots.insert(name.into(), render);
            }
            _ => warn!("only components take slots"),
        }
        self
    }

    pub fn key_value(&self) -> Option<&Value> {
        self.key.as_ref()
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            VNodeKind::Element { tag, .. } => Some(&**tag),
            _ => None,
        }
    }

    pub fn props(&self) -> Option<&Props> {
        match &self.kind {
            VNodeKind::Element { props, .. } | VNodeKind::Component { props, .. } => Some(props),
            VNodeKind::Text(_) => None,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self.kind, VNodeKind::Component { .. })
    }

    /// The realized host node while mounted. For a component this is the
    /// root of its rendered subtree.
    pub fn host(&self) -> Option<HostNode> {
        match &self.kind {
            VNodeKind::Component { instance, .. } => {
                instance.borrow().as_ref().and_then(|i| i.host())
            }
            _ => self.host.get(),
        }
    }

    /// Whether both nodes have the same type discriminator: the same tag,
    /// both text, or the same component definition.
    pub(crate) fn same_type(&self, other: &VNode) -> bool {
        match (&self.kind, &other.kind) {
            (VNodeKind::Element { tag: a, .. }, VNodeKind::Element { tag: b, .. }) => a == b,
            (VNodeKind::Text(_), VNodeKind::Text(_)) => true,
            (VNodeKind::Component { def: a, .. }, VNodeKind::Component { def: b, .. }) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }

    pub(crate) fn instance(&self) -> Option<Rc<ComponentInstance>> {
        match &self.kind {
            VNodeKind::Component { instance, .. } => instance.borrow().clone(),
            _ => None,
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        match &self.kind {
            VNodeKind::Element { tag, props, children } => s
                .field("tag", tag)
                .field("props", &props.keys().collect::<Vec<_>>())
                .field("children", children),
            VNodeKind::Text(text) => s.field("text", text),
            VNodeKind::Component { def, props, .. } => s
                .field("component", &def.name())
                .field("props", &props.keys().collect::<Vec<_>>()),
        };
        s.field("key", &self.key).field("host", &self.host()).finish()
    }
}

/// Flatten a class value into a space separated class string.
///
/// Strings pass through, lists are joined (each entry normalized in turn),
/// and objects contribute the names of their truthy fields.
pub fn normalize_class(class: &Value) -> String {
    match class {
        Value::Str(s) => s.to_string(),
        Value::List(items) => items
            .iter()
            .map(normalize_class)
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(object) => object
            .entries()
            .into_iter()
            .filter(|(_, on)| on.is_truthy())
            .map(|(name, _)| name.to_string())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    #[test]
    fn class_normalization() {
        assert_eq!(normalize_class(&Value::from("a b")), "a b");
        assert_eq!(
            normalize_class(&Value::from(vec![Value::from("a"), Value::from("b")])),
            "a b"
        );

        let flags = Object::new().with("active", true).with("hidden", false).with("big", 1);
        assert_eq!(normalize_class(&Value::from(flags.clone())), "active big");

        let mixed = Value::from(vec![Value::from("base"), Value::from(flags)]);
        assert_eq!(normalize_class(&mixed), "base active big");
        assert_eq!(normalize_class(&Value::Null), "");
    }

    #[test]
    fn builders_fill_the_right_slots() {
        let node = VNode::element("ul")
            .key("list")
            .prop("id", "items")
            .class(vec![Value::from("a"), Value::from("b")])
            .child(VNode::element("li").text_child("one"))
            .child(VNode::element("li").text_child("two"));

        assert_eq!(node.tag(), Some("ul"));
        assert_eq!(node.key_value(), Some(&Value::from("list")));
        let props = node.props().unwrap();
        assert_eq!(props.get("class"), Some(&Value::from("a b")));
        match &node.kind {
            VNodeKind::Element {
                children: Children::Nodes(nodes),
                ..
            } => assert_eq!(nodes.len(), 2),
            _ => panic!("expected element children"),
        }
    }

    #[test]
    fn on_builds_event_prop_names() {
        let node = VNode::element("button").on("click", |_| {});
        assert!(node.props().unwrap().get("onClick").unwrap().is_handler());
    }

    #[test]
    fn type_discriminators() {
        assert!(VNode::element("div").same_type(&VNode::element("div")));
        assert!(!VNode::element("div").same_type(&VNode::element("p")));
        assert!(VNode::text("a").same_type(&VNode::text("b")));
        assert!(!VNode::text("a").same_type(&VNode::element("a")));

        let def = Rc::new(ComponentDef::new("A"));
        let other = Rc::new(ComponentDef::new("A"));
        assert!(VNode::component(&def).same_type(&VNode::component(&def)));
        assert!(!VNode::component(&def).same_type(&VNode::component(&other)));
    }
}
