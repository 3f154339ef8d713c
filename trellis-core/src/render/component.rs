//! Components.
//!
//! A [`ComponentDef`] is the static description of a component: declared
//! props, a state factory, an optional setup function, a render function and
//! lifecycle hooks. Mounting a component node creates a [`ComponentInstance`]
//! that owns the component's reactive state, its shallow-reactive props and
//! the subtree it rendered last.
//!
//! Render functions and hooks see the instance through a [`RenderContext`],
//! which forwards `get`/`set` to whichever of state, props or setup bindings
//! declares the key.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, error, warn};

use super::host::HostNode;
use super::vnode::{Props, VNode};
use crate::error::{Error, Result};
use crate::reactive::{Effect, Reactive, Readonly, Runtime};
use crate::value::{Object, Value};

/// Renders a named slot.
pub type SlotFn = Rc<dyn Fn() -> VNode>;

/// A component render function.
pub type RenderFn = Rc<dyn Fn(&RenderContext) -> VNode>;

type HookFn = Rc<dyn Fn(&RenderContext)>;
type SetupFn = Rc<dyn Fn(Readonly, &SetupContext) -> SetupResult>;
type DataFn = Rc<dyn Fn() -> Object>;

/// Lifecycle points a component can hook into once its render context
/// exists. `before_create` runs earlier and takes no context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

/// Named slots passed from a parent to a component.
#[derive(Clone, Default)]
pub struct Slots(IndexMap<Rc<str>, SlotFn>);

impl Slots {
    pub(crate) fn insert(&mut self, name: Rc<str>, render: SlotFn) {
        self.0.insert(name, render);
    }

    /// Render the slot called `name`.
    pub fn render(&self, name: &str) -> Option<VNode> {
        self.0.get(name).map(|render| render())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> Vec<Rc<str>> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// What a setup function hands back.
pub enum SetupResult {
    /// Values exposed on the render context, after state and props.
    Bindings(Object),
    /// A render function that replaces the definition's own.
    Render(RenderFn),
}

impl SetupResult {
    pub fn render(f: impl Fn(&RenderContext) -> VNode + 'static) -> Self {
        SetupResult::Render(Rc::new(f))
    }
}

/// Second argument of a setup function.
pub struct SetupContext {
    attrs: Object,
    slots: Slots,
}

impl SetupContext {
    /// Props passed by the parent that the component does not declare.
    pub fn attrs(&self) -> &Object {
        &self.attrs
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }
}

/// Static description of a component.
pub struct ComponentDef {
    name: Rc<str>,
    props: Vec<Rc<str>>,
    data: Option<DataFn>,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
    before_create: Option<Rc<dyn Fn()>>,
    hooks: HashMap<LifecycleHook, Vec<HookFn>>,
}

impl ComponentDef {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            props: Vec::new(),
            data: None,
            setup: None,
            render: None,
            before_create: None,
            hooks: HashMap::new(),
        }
    }

    /// Declare the props this component accepts. Anything else the parent
    /// passes ends up in the attrs.
    pub fn props<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Rc<str>>,
    {
        self.props = names.into_iter().map(Into::into).collect();
        self
    }

    /// Factory for the component's local state, wrapped reactively per
    /// instance.
    pub fn data(mut self, f: impl Fn() -> Object + 'static) -> Self {
        self.data = Some(Rc::new(f));
        self
    }

    pub fn setup(mut self, f: impl Fn(Readonly, &SetupContext) -> SetupResult + 'static) -> Self {
        self.setup = Some(Rc::new(f));
        self
    }

    pub fn render(mut self, f: impl Fn(&RenderContext) -> VNode + 'static) -> Self {
        self.render = Some(Rc::new(f));
        self
    }

    pub fn before_create(mut self, f: impl Fn() + 'static) -> Self {
        self.before_create = Some(Rc::new(f));
        self
    }

    pub fn hook(mut self, hook: LifecycleHook, f: impl Fn(&RenderContext) + 'static) -> Self {
        self.hooks.entry(hook).or_default().push(Rc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_props(&self) -> &[Rc<str>] {
        &self.props
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("props", &self.props)
            .field("has_setup", &self.setup.is_some())
            .field("has_render", &self.render.is_some())
            .finish()
    }
}

/// The view render functions and hooks get of a component instance.
pub struct RenderContext {
    name: Rc<str>,
    state: Option<Reactive>,
    props: Reactive,
    bindings: Option<Reactive>,
    attrs: Object,
    slots: RefCell<Slots>,
}

impl RenderContext {
    /// Read `key` from state, then props, then setup bindings.
    pub fn get(&self, key: &str) -> Result<Value> {
        if let Some(state) = self.state.as_ref().filter(|s| s.contains(key)) {
            return Ok(state.get(key).unwrap_or_default());
        }
        if self.props.contains(key) {
            return Ok(self.props.get(key).unwrap_or_default());
        }
        if let Some(bindings) = self.bindings.as_ref().filter(|b| b.contains(key)) {
            return Ok(bindings.get(key).unwrap_or_default());
        }

        error!(component = %self.name, key, "render context read of an undefined key");
        Err(self.unknown(key))
    }

    /// Write `key` into state or setup bindings. Props are readonly.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if let Some(state) = self.state.as_ref().filter(|s| s.get_untracked(key).is_some()) {
            state.set(key, value);
            return Ok(());
        }
        if self.props.get_untracked(key).is_some() {
            warn!(component = %self.name, key, "attempted to mutate a prop; props are readonly");
            return Err(Error::ReadonlyProp {
                component: self.name.to_string(),
                key: key.to_owned(),
            });
        }
        if let Some(bindings) = self.bindings.as_ref().filter(|b| b.get_untracked(key).is_some()) {
            bindings.set(key, value);
            return Ok(());
        }

        error!(component = %self.name, key, "render context write to an undefined key");
        Err(self.unknown(key))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> Option<&Reactive> {
        self.state.as_ref()
    }

    pub fn props(&self) -> Readonly {
        self.props.readonly()
    }

    pub fn bindings(&self) -> Option<&Reactive> {
        self.bindings.as_ref()
    }

    pub fn attrs(&self) -> &Object {
        &self.attrs
    }

    /// Render the slot called `name`, if the parent passed one.
    pub fn slot(&self, name: &str) -> Option<VNode> {
        let slots = self.slots.borrow().clone();
        slots.render(name)
    }

    fn unknown(&self, key: &str) -> Error {
        Error::UnknownKey {
            component: self.name.to_string(),
            key: key.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Created,
    Mounted,
    Unmounted,
}

/// Live state of one mounted component.
pub(crate) struct ComponentInstance {
    def: Rc<ComponentDef>,
    ctx: RenderContext,
    render: Option<RenderFn>,
    phase: Cell<Phase>,
    pub(crate) sub_tree: RefCell<Option<VNode>>,
    pub(crate) effect: RefCell<Option<Effect>>,
}

impl ComponentInstance {
    /// Build the instance for a component node: state, props and attrs,
    /// setup, and the render context. Fires `before_create` and `created`.
    pub(crate) fn create(
        runtime: &Runtime,
        def: &Rc<ComponentDef>,
        raw_props: &Props,
        slots: &Slots,
    ) -> Rc<Self> {
        if let Some(before_create) = &def.before_create {
            runtime.untracked(|| before_create());
        }

        let state = def.data.as_ref().map(|data| runtime.reactive(&data()));
        let (props, attrs) = resolve_props(&def.props, raw_props);
        let props = runtime.shallow_reactive(&props);

        let mut render = def.render.clone();
        let mut bindings = None;
        if let Some(setup) = &def.setup {
            let setup_ctx = SetupContext {
                attrs: attrs.clone(),
                slots: slots.clone(),
            };
            match runtime.untracked(|| setup(props.readonly(), &setup_ctx)) {
                SetupResult::Render(f) => {
                    if render.is_some() {
                        warn!(component = %def.name, "setup returned a render function; the render option is ignored");
                    }
                    render = Some(f);
                }
                SetupResult::Bindings(object) => bindings = Some(runtime.reactive(&object)),
            }
        }

        let instance = Rc::new(Self {
            def: Rc::clone(def),
            ctx: RenderContext {
                name: Rc::clone(&def.name),
                state,
                props,
                bindings,
                attrs,
                slots: RefCell::new(slots.clone()),
            },
            render,
            phase: Cell::new(Phase::Created),
            sub_tree: RefCell::new(None),
            effect: RefCell::new(None),
        });

        debug!(component = %def.name, "component created");
        instance.call_hook(LifecycleHook::Created);
        instance
    }

    pub(crate) fn def(&self) -> &Rc<ComponentDef> {
        &self.def
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.set(phase);
    }

    pub(crate) fn host(&self) -> Option<HostNode> {
        self.sub_tree.borrow().as_ref().and_then(VNode::host)
    }

    /// Run the render function. Reads are tracked by the caller's effect.
    pub(crate) fn render(&self) -> VNode {
        match &self.render {
            Some(render) => render(&self.ctx),
            None => {
                error!(component = %self.def.name, "component has no render function");
                VNode::text("")
            }
        }
    }

    /// Fire every callback registered for `hook`, untracked.
    pub(crate) fn call_hook(&self, hook: LifecycleHook) {
        let Some(callbacks) = self.def.hooks.get(&hook) else {
            return;
        };
        self.ctx.props.runtime().untracked(|| {
            for callback in callbacks {
                callback(&self.ctx);
            }
        });
    }

    /// Bring props, attrs and slots in line with a new parent render.
    /// Writing changed props into the reactive props object is what
    /// schedules the re-render.
    pub(crate) fn update(&self, prev: &Props, next: &Props, slots: &Slots) {
        *self.ctx.slots.borrow_mut() = slots.clone();
        if !has_props_changed(prev, next) {
            return;
        }

        let (props, attrs) = resolve_props(&self.def.props, next);
        for (key, value) in props.entries() {
            if self.ctx.props.get_untracked(&key).as_ref() != Some(&value) {
                self.ctx.props.set(&key, value);
            }
        }
        for key in self.ctx.props.to_raw().keys() {
            if !props.contains_key(&key) {
                self.ctx.props.remove(&key);
            }
        }

        let current = &self.ctx.attrs;
        for key in current.keys() {
            if !attrs.contains_key(&key) {
                current.remove(&key);
            }
        }
        for (key, value) in attrs.entries() {
            current.insert(key, value);
        }
    }

    /// Stop the render effect.
    pub(crate) fn stop(&self) {
        if let Some(effect) = self.effect.borrow().as_ref() {
            effect.stop();
        }
    }
}

/// Split the props a parent passed into declared props and attrs.
pub fn resolve_props(declared: &[Rc<str>], raw: &Props) -> (Object, Object) {
    let props = Object::new();
    let attrs = Object::new();
    for (key, value) in raw {
        let target = if declared.contains(key) { &props } else { &attrs };
        target.insert(Rc::clone(key), value.clone());
    }
    (props, attrs)
}

/// Whether two prop records differ in key count or in any value.
pub fn has_props_changed(prev: &Props, next: &Props) -> bool {
    if prev.len() != next.len() {
        return true;
    }
    next.iter().any(|(key, value)| prev.get(key) != Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, Value)]) -> Props {
        pairs
            .iter()
            .map(|(k, v)| (Rc::<str>::from(*k), v.clone()))
            .collect()
    }

    #[test]
    fn resolve_splits_declared_props_from_attrs() {
        let declared: Vec<Rc<str>> = vec!["title".into()];
        let raw = props(&[("title", "A".into()), ("id", "x".into())]);

        let (props, attrs) = resolve_props(&declared, &raw);
        assert_eq!(props.keys(), [Rc::<str>::from("title")]);
        assert_eq!(attrs.get("id"), Some(Value::from("x")));
    }

    #[test]
    fn props_change_detection() {
        let a = props(&[("title", "A".into())]);
        let b = props(&[("title", "B".into())]);
        let c = props(&[("title", "A".into()), ("x", 1.into())]);

        assert!(!has_props_changed(&a, &props(&[("title", "A".into())])));
        assert!(has_props_changed(&a, &b));
        assert!(has_props_changed(&a, &c));
    }

    fn instance(rt: &Runtime, def: ComponentDef, raw: Props) -> Rc<ComponentInstance> {
        ComponentInstance::create(rt, &Rc::new(def), &raw, &Slots::default())
    }

    #[test]
    fn render_context_lookup_order_and_errors() {
        let rt = Runtime::new();
        let def = ComponentDef::new("Counter")
            .props(["title", "count"])
            .data(|| Object::new().with("count", 1))
            .setup(|_, _| SetupResult::Bindings(Object::new().with("extra", true)));
        let inst = instance(&rt, def, props(&[("title", "A".into()), ("count", 99.into())]));
        let ctx = &inst.ctx;

        // State shadows props.
        assert_eq!(ctx.get("count"), Ok(Value::Int(1)));
        assert_eq!(ctx.get("title"), Ok(Value::from("A")));
        assert_eq!(ctx.get("extra"), Ok(Value::Bool(true)));
        assert_eq!(
            ctx.get("missing"),
            Err(Error::UnknownKey {
                component: "Counter".into(),
                key: "missing".into()
            })
        );

        assert_eq!(ctx.set("count", 2), Ok(()));
        assert_eq!(ctx.get("count"), Ok(Value::Int(2)));
        assert!(matches!(ctx.set("title", "B"), Err(Error::ReadonlyProp { .. })));
        assert_eq!(ctx.get("title"), Ok(Value::from("A")));
        assert!(matches!(ctx.set("nope", 1), Err(Error::UnknownKey { .. })));
    }

    #[test]
    fn setup_render_replaces_render_option() {
        let rt = Runtime::new();
        let def = ComponentDef::new("Both")
            .render(|_| VNode::text("option"))
            .setup(|_, _| SetupResult::render(|_| VNode::text("setup")));
        let inst = instance(&rt, def, Props::new());

        let node = inst.render();
        assert!(matches!(&node.kind, crate::render::vnode::VNodeKind::Text(t) if &**t == "setup"));
    }

    #[test]
    fn setup_sees_readonly_props_and_attrs() {
        let rt = Runtime::new();
        let seen = Rc::new(RefCell::new(None));
        let log = Rc::clone(&seen);
        let def = ComponentDef::new("Probe").props(["title"]).setup(move |props, ctx| {
            *log.borrow_mut() = Some((props.get("title"), ctx.attrs().get("id")));
            SetupResult::Bindings(Object::new())
        });
        instance(&rt, def, props(&[("title", "A".into()), ("id", "x".into())]));

        assert_eq!(
            *seen.borrow(),
            Some((Some(Value::from("A")), Some(Value::from("x"))))
        );
    }

    #[test]
    fn hooks_fire_in_order() {
        let rt = Runtime::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (Rc::clone(&order), Rc::clone(&order));
        let def = ComponentDef::new("Hooks")
            .before_create(move || a.borrow_mut().push("before_create"))
            .hook(LifecycleHook::Created, move |ctx| {
                b.borrow_mut().push("created");
                assert_eq!(ctx.name(), "Hooks");
            });
        instance(&rt, def, Props::new());

        assert_eq!(*order.borrow(), ["before_create", "created"]);
    }

    #[test]
    fn update_writes_only_changed_props_and_drops_removed_ones() {
        let rt = Runtime::new();
        let def = ComponentDef::new("P").props(["a", "b"]);
        let prev = props(&[("a", 1.into()), ("b", 2.into())]);
        let inst = instance(&rt, def, prev.clone());

        let next = props(&[("a", 1.into()), ("id", "x".into())]);
        inst.update(&prev, &next, &Slots::default());

        let raw = inst.ctx.props.to_raw();
        assert_eq!(raw.get("a"), Some(Value::Int(1)));
        assert!(!raw.contains_key("b"));
        assert_eq!(inst.ctx.attrs().get("id"), Some(Value::from("x")));
    }
}
