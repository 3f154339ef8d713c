//! Keyed child diff.
//!
//! Four pointers bound the unprocessed old range `[old_start, old_end)` and
//! new range `[new_start, new_end)`. Each step compares the endpoints
//! (start/start, end/end, start/end, end/start); a match is patched in place
//! and moved if its position changed. With no endpoint match, the new start
//! node's key is looked up among the remaining old nodes: a hit is patched and
//! moved, and its old slot is marked consumed; a miss is mounted fresh.
//!
//! Once one range is exhausted, leftover new nodes are mounted and leftover
//! old nodes unmounted.
//!
//! Nodes match on key alone. Two unkeyed nodes compare equal at the
//! endpoints, so unkeyed sequences are patched position by position, but an
//! unkeyed node is never found by the lookup. Siblings that share a key while
//! differing in type are a caller error; the patch replaces the node rather
//! than reusing it.

use super::host::HostNode;
use super::renderer::Renderer;
use super::vnode::VNode;

impl Renderer {
    pub(super) fn patch_keyed_children(&self, old: &[VNode], new: &[VNode], container: HostNode) {
        let mut slots: Vec<Option<&VNode>> = old.iter().map(Some).collect();
        let (mut old_start, mut old_end) = (0, old.len());
        let (mut new_start, mut new_end) = (0, new.len());

        while old_start < old_end && new_start < new_end {
            let Some(old_first) = slots[old_start] else {
                old_start += 1;
                continue;
            };
            let Some(old_last) = slots[old_end - 1] else {
                old_end -= 1;
                continue;
            };
            let new_first = &new[new_start];
            let new_last = &new[new_end - 1];

            if old_first.key == new_first.key {
                self.patch(Some(old_first), new_first, container, None);
                old_start += 1;
                new_start += 1;
            } else if old_last.key == new_last.key {
                self.patch(Some(old_last), new_last, container, None);
                old_end -= 1;
                new_end -= 1;
            } else if old_first.key == new_last.key {
                self.patch(Some(old_first), new_last, container, None);
                let anchor = old_last
                    .host()
                    .and_then(|node| self.host().next_sibling(node));
                self.move_before(new_last, container, anchor);
                old_start += 1;
                new_end -= 1;
            } else if old_last.key == new_first.key {
                self.patch(Some(old_last), new_first, container, None);
                self.move_before(new_first, container, old_first.host());
                old_end -= 1;
                new_start += 1;
            } else {
                let found = new_first.key.as_ref().and_then(|key| {
                    (old_start..old_end)
                        .find(|&i| slots[i].is_some_and(|node| node.key.as_ref() == Some(key)))
                });
                match found {
                    Some(index) => {
                        let reused = slots[index].take();
                        self.patch(reused, new_first, container, None);
                        self.move_before(new_first, container, old_first.host());
                    }
                    None => self.patch(None, new_first, container, old_first.host()),
                }
                new_start += 1;
            }
        }

        if old_start >= old_end {
            // Everything after the remaining new range is already in place.
            let anchor = new.get(new_end).and_then(VNode::host);
            for node in &new[new_start..new_end] {
                self.patch(None, node, container, anchor);
            }
        } else if new_start >= new_end {
            for node in slots[old_start..old_end].iter().flatten() {
                self.unmount(node);
            }
        }
    }
}
