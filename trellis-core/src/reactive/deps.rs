//! Dependency Store
//!
//! Two-level mapping from target (observed object or computed value) to key
//! to the set of subscribers that read it. Sets hold subscribers weakly: a
//! subscriber whose last handle is dropped simply stops being notified and is
//! pruned the next time its set is touched.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::subscriber::{Subscriber, SubscriberId};
use crate::value::TargetId;

/// What part of a target was read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Key {
    /// A named field of an object.
    Field(Rc<str>),
    /// The set of field names of an object. Triggered on add and remove.
    Keys,
    /// The cached value of a computed.
    Value,
}

impl Key {
    pub(crate) fn field(name: &str) -> Self {
        Key::Field(Rc::from(name))
    }
}

/// One dependency entry: a (target, key) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Dep {
    pub(crate) target: TargetId,
    pub(crate) key: Key,
}

type DepSet = IndexMap<SubscriberId, Weak<dyn Subscriber>>;

#[derive(Default)]
pub(crate) struct DepStore {
    targets: HashMap<TargetId, HashMap<Key, DepSet>>,
}

impl DepStore {
    /// Add `subscriber` to the set for `dep`. Returns `false` if it was
    /// already there.
    pub(crate) fn add(&mut self, dep: &Dep, subscriber: &Rc<dyn Subscriber>) -> bool {
        let set = self
            .targets
            .entry(dep.target)
            .or_default()
            .entry(dep.key.clone())
            .or_default();

        if set.contains_key(&subscriber.id()) {
            return false;
        }
        set.insert(subscriber.id(), Rc::downgrade(subscriber));
        true
    }

    /// A fresh snapshot of the live subscribers for `dep`, in subscription
    /// order. Callers iterate the snapshot, never the set itself, because
    /// running a subscriber removes and re-adds it.
    pub(crate) fn snapshot(&mut self, dep: &Dep) -> Vec<Rc<dyn Subscriber>> {
        let Some(set) = self.set_mut(dep) else {
            return Vec::new();
        };
        set.retain(|_, weak| weak.strong_count() > 0);
        set.values().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn remove(&mut self, dep: &Dep, id: SubscriberId) {
        let Some(keys) = self.targets.get_mut(&dep.target) else {
            return;
        };
        if let Some(set) = keys.get_mut(&dep.key) {
            set.shift_remove(&id);
            if set.is_empty() {
                keys.remove(&dep.key);
            }
        }
        if keys.is_empty() {
            self.targets.remove(&dep.target);
        }
    }

    /// Number of live subscribers for `dep`.
    pub(crate) fn count(&self, dep: &Dep) -> usize {
        self.targets
            .get(&dep.target)
            .and_then(|keys| keys.get(&dep.key))
            .map_or(0, |set| set.values().filter(|w| w.strong_count() > 0).count())
    }

    /// Number of targets with at least one entry.
    pub(crate) fn target_count(&self) -> usize {
        self.targets.len()
    }

    fn set_mut(&mut self, dep: &Dep) -> Option<&mut DepSet> {
        self.targets.get_mut(&dep.target)?.get_mut(&dep.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use smallvec::SmallVec;

    struct Noop {
        id: SubscriberId,
        deps: RefCell<SmallVec<[Dep; 4]>>,
    }

    impl Subscriber for Noop {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn deps(&self) -> &RefCell<SmallVec<[Dep; 4]>> {
            &self.deps
        }

        fn notify(self: Rc<Self>) {}

        fn execute(self: Rc<Self>) {}
    }

    fn noop() -> Rc<dyn Subscriber> {
        Rc::new(Noop {
            id: SubscriberId::new(),
            deps: RefCell::new(SmallVec::new()),
        })
    }

    fn dep(key: &str) -> Dep {
        Dep {
            target: TargetId::new(),
            key: Key::field(key),
        }
    }

    #[test]
    fn add_is_idempotent() {
        let mut store = DepStore::default();
        let d = dep("count");
        let s = noop();

        assert!(store.add(&d, &s));
        assert!(!store.add(&d, &s));
        assert_eq!(store.count(&d), 1);
    }

    #[test]
    fn remove_prunes_empty_entries() {
        let mut store = DepStore::default();
        let d = dep("count");
        let s = noop();

        store.add(&d, &s);
        assert_eq!(store.target_count(), 1);

        store.remove(&d, s.id());
        assert_eq!(store.count(&d), 0);
        assert_eq!(store.target_count(), 0);
    }

    #[test]
    fn dropped_subscribers_disappear_from_snapshots() {
        let mut store = DepStore::default();
        let d = dep("count");
        let kept = noop();
        let dropped = noop();

        store.add(&d, &kept);
        store.add(&d, &dropped);
        drop(dropped);

        let live = store.snapshot(&d);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id(), kept.id());
        assert_eq!(store.count(&d), 1);
    }
}
