//! Property tests for the keyed child diff.
//!
//! Old and new child lists are drawn as random orderings of random subsets of
//! one key universe, which covers permutations, insertions and removals in
//! any mix.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use proptest::prelude::*;
use trellis_core::reactive::Runtime;
use trellis_core::render::{HostNode, MemoryHost, Op, Renderer, VNode};

fn keyed_list(keys: &[u32]) -> VNode {
    VNode::element("ul").children(
        keys.iter()
            .map(|k| VNode::element("li").key(i64::from(*k)).text_child(k.to_string())),
    )
}

fn key_order() -> impl Strategy<Value = Vec<u32>> {
    let universe: Vec<u32> = (0..24).collect();
    prop::sample::subsequence(universe, 0..=24).prop_shuffle()
}

fn labels(host: &MemoryHost, nodes: &[HostNode]) -> Vec<String> {
    nodes.iter().map(|n| host.text_content(*n)).collect()
}

proptest! {
    #[test]
    fn host_children_follow_the_new_key_order(old in key_order(), new in key_order()) {
        let rt = Runtime::new();
        let host = Rc::new(MemoryHost::new());
        let root = host.create_root();
        let renderer = Renderer::new(&rt, host.clone());

        renderer.render(Some(keyed_list(&old)), root);
        let ul = renderer.root_host(root).unwrap();
        let before: HashMap<u32, HostNode> = old
            .iter()
            .copied()
            .zip(host.children(ul))
            .collect();

        host.clear_ops();
        renderer.render(Some(keyed_list(&new)), root);
        let after = host.children(ul);

        let expected: Vec<String> = new.iter().map(u32::to_string).collect();
        prop_assert_eq!(labels(&host, &after), expected);

        // Retained keys keep their host nodes
        for (key, node) in new.iter().zip(&after) {
            if let Some(prev) = before.get(key) {
                prop_assert_eq!(prev, node);
            }
        }

        let old_keys: HashSet<_> = old.iter().collect();
        let new_keys: HashSet<_> = new.iter().collect();
        let ops = host.ops();
        let creates = ops.iter().filter(|op| op.is_create()).count();
        let removes = ops.iter().filter(|op| matches!(op, Op::Remove { .. })).count();
        prop_assert_eq!(creates, new_keys.difference(&old_keys).count());
        prop_assert_eq!(removes, old_keys.difference(&new_keys).count());
    }

    #[test]
    fn rerendering_the_same_order_issues_no_ops(keys in key_order()) {
        let rt = Runtime::new();
        let host = Rc::new(MemoryHost::new());
        let root = host.create_root();
        let renderer = Renderer::new(&rt, host.clone());

        renderer.render(Some(keyed_list(&keys)), root);
        host.clear_ops();
        renderer.render(Some(keyed_list(&keys)), root);

        prop_assert!(host.ops().is_empty());
    }
}
