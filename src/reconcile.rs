//! Keyed reconciliation of an ordered item list onto the children of a node.
//!
//! `merge` mutates the live children of `parent` until they mirror `items`:
//! same identities, same order, each node synchronized from its item. Nodes
//! are matched by the item's key and reused in place, so their live state
//! (loaded assets, players, script contexts) survives reorders and updates.
//!
//! The lookup of an item's node is a linear scan over the current children,
//! which makes a merge O(n²) in the number of children. Overlay and layer
//! lists are small, so no index by key is maintained.

use std::collections::HashSet;
use std::rc::Rc;

use crate::tree::{NodeId, SceneTree};

/// A data item with a stable identity within its list.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// What a single merge did to the live tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Nodes created and inserted
    pub created: usize,
    /// Existing nodes re-synchronized from a new item object
    pub updated: usize,
    /// Existing nodes relocated to a new position
    pub moved: usize,
    /// Nodes removed because their key disappeared
    pub removed: usize,
    /// Items whose node already reflected the exact same object
    pub skipped: usize,
    /// Items that could not be turned into a node
    pub failed: usize,
}

impl MergeStats {
    /// Number of operations that changed the live tree.
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.moved + self.removed
    }

    pub fn accumulate(&mut self, other: MergeStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.moved += other.moved;
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Merge `items` into the children of `parent`.
///
/// `create_or_update` receives the item and the node currently carrying its
/// key (if any). It returns the node that now renders the item: the same node
/// mutated in place, a freshly registered detached node, or `None` when the
/// item cannot be rendered (the item is then skipped and the rest proceed).
/// Returning a different node than the existing one replaces it in its slot.
///
/// Items with a key that already appeared earlier in the list are rejected
/// and logged; the first occurrence wins.
pub fn merge<T, F>(
    tree: &mut SceneTree,
    parent: NodeId,
    items: &[Rc<T>],
    mut create_or_update: F,
) -> MergeStats
where
    T: Keyed + 'static,
    F: FnMut(&mut SceneTree, &Rc<T>, Option<NodeId>) -> Option<NodeId>,
{
    let mut stats = MergeStats::default();
    let items = reject_duplicate_keys(items);

    // Pruning up front keeps the per-item scans short. When an item replaces
    // another one (same length, different key) this does nothing and the
    // second prune below cleans up instead.
    if tree.child_count(parent) > items.len() {
        stats.removed += prune_children(tree, parent, &items);
    }

    for (index, &item) in items.iter().enumerate() {
        let item: &Rc<T> = item;
        let key = item.key();
        let found = find_child_index_by_key(tree, parent, key);
        let mut existing = found;

        let node = match found {
            Some((_, node)) if tree.is_current(node, item) => {
                // Content is current, only placement may change
                stats.skipped += 1;
                node
            }
            _ => {
                let previous = found.map(|(_, node)| node);
                let Some(node) = create_or_update(tree, item, previous) else {
                    log::error!("Could not render item '{key}', skipping it");
                    stats.failed += 1;
                    continue;
                };

                match found {
                    Some((dom_index, prev)) if prev != node => {
                        tree.set_key(node, key);
                        tree.replace_child(parent, prev, node);
                        existing = Some((dom_index, node));
                        stats.created += 1;
                    }
                    Some(_) => stats.updated += 1,
                    None => stats.created += 1,
                }

                tree.set_src_object(node, Rc::clone(item));
                node
            }
        };

        match existing {
            None => {
                tree.set_key(node, key);
                tree.insert_child(parent, index, node);
            }
            Some((dom_index, _)) if dom_index != index => {
                // One move: the node is never detached from the tree
                tree.move_child(parent, node, index);
                stats.moved += 1;
            }
            Some(_) => {}
        }
    }

    // A replaced key leaves its old node behind
    if tree.child_count(parent) > items.len() {
        stats.removed += prune_children(tree, parent, &items);
    }

    log::trace!("Merged {} items under {:?}: {:?}", items.len(), parent, stats);
    stats
}

/// Remove every child whose key is not present in `items`.
fn prune_children<T: Keyed>(tree: &mut SceneTree, parent: NodeId, items: &[&Rc<T>]) -> usize {
    let keys_to_keep: HashSet<&str> = items.iter().map(|item| item.key()).collect();

    // Collect first, the children list changes while removing
    let children_to_remove: Vec<NodeId> = tree
        .children(parent)
        .iter()
        .copied()
        .filter(|&child| {
            tree.key(child)
                .is_none_or(|key| !keys_to_keep.contains(key))
        })
        .collect();

    for &child in &children_to_remove {
        tree.unregister(child);
    }

    children_to_remove.len()
}

fn find_child_index_by_key(tree: &SceneTree, parent: NodeId, key: &str) -> Option<(usize, NodeId)> {
    tree.children(parent)
        .iter()
        .enumerate()
        .find(|(_, &child)| tree.key(child) == Some(key))
        .map(|(index, &child)| (index, child))
}

fn reject_duplicate_keys<T: Keyed>(items: &[Rc<T>]) -> Vec<&Rc<T>> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| {
            let fresh = seen.insert(item.key());
            if !fresh {
                log::error!(
                    "Duplicate id '{}' in reconciled list, ignoring the repeated item",
                    item.key()
                );
            }
            fresh
        })
        .collect()
}
