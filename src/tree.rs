//! Arena-based storage for the live visual tree.
//!
//! The SceneTree stores every live VisualNode (the container group, overlay
//! nodes and layer nodes) using a sparse-set architecture with generational
//! indices. Parent/child order, the srcObject cache and dirty flags are kept
//! as per-node metadata.
//!
//! ## Key Features
//!
//! - **Generational Indices**: NodeId contains index + generation so that
//!   asynchronous continuations holding a NodeId (asset batches, readiness
//!   gates) detect that their node has been removed and its slot reused.
//!
//! - **Dense Storage**: Nodes stored contiguously, O(1) lookup from NodeId
//!   through the sparse map, O(1) swap-remove.
//!
//! - **Ordered Children**: Each node keeps its children in render order; the
//!   reconciler inserts, moves and removes through the methods here.
//!
//! - **srcObject Cache**: Each node remembers the exact data object it was
//!   last synchronized from. Comparison is by pointer identity, never by
//!   content.
//!
//! - **Dirty Tracking**: Setters that actually change something mark the node
//!   dirty; hosts drain the accumulated flags once per frame.

use std::any::Any;
use std::rc::Rc;

use bitflags::bitflags;

use crate::layer::LayerNode;
use crate::overlay::OverlayNode;

/// Unique identifier for a node in the tree.
///
/// Uses a generational index design:
/// - `index`: Position in the sparse array (reusable after removal)
/// - `generation`: Version counter that increments when a slot is reused
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

bitflags! {
    /// What changed on a node since the host last drained the tree.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Dirty: u8 {
        /// Children were inserted, moved or removed
        const STRUCTURE = 1 << 0;
        /// Position or size changed
        const GEOMETRY = 1 << 1;
        /// Visual styling changed
        const STYLE = 1 << 2;
        /// Content changed (text, resolved source, player)
        const CONTENT = 1 << 3;
        /// Hidden/visible transition
        const VISIBILITY = 1 << 4;
    }
}

/// The payload of a live node.
pub enum Visual {
    /// Plain grouping node (the overlay container)
    Group,
    Overlay(OverlayNode),
    Layer(LayerNode),
}

impl Visual {
    fn kind_name(&self) -> &'static str {
        match self {
            Visual::Group => "group",
            Visual::Overlay(_) => "overlay",
            Visual::Layer(_) => "layer",
        }
    }
}

/// Entry in the sparse map, pointing to a dense array slot.
struct SparseEntry {
    dense_index: usize,
    generation: u32,
}

struct Node {
    visual: Visual,
    /// Identity of the data item this node renders (`id` of the item)
    key: Option<String>,
    /// The data object last applied to this node, compared by pointer
    src_object: Option<Rc<dyn Any>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    dirty: Dirty,
    /// Back-pointer to sparse array index (for swap-remove fixup)
    sparse_index: u32,
}

/// Central arena for the live visual tree.
pub struct SceneTree {
    dense: Vec<Node>,
    sparse: Vec<Option<SparseEntry>>,
    free_indices: Vec<u32>,
    /// Nodes with pending dirty flags, in the order they were first marked
    dirty_queue: Vec<NodeId>,
}

impl SceneTree {
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            sparse: Vec::new(),
            free_indices: Vec::new(),
            dirty_queue: Vec::new(),
        }
    }

    /// Register a detached node and return its unique ID.
    ///
    /// Parent-child relationships are set separately via `insert_child`.
    pub fn register(&mut self, visual: Visual) -> NodeId {
        // Allocate a sparse index (reuse from free list or allocate new)
        let (sparse_index, generation) = if let Some(idx) = self.free_indices.pop() {
            let old_gen = self
                .sparse
                .get(idx as usize)
                .and_then(|e| e.as_ref())
                .map(|e| e.generation)
                .unwrap_or(0);
            (idx, old_gen.wrapping_add(1))
        } else {
            let idx = self.sparse.len() as u32;
            self.sparse.push(None);
            (idx, 0)
        };

        let dense_index = self.dense.len();
        let id = NodeId::new(sparse_index, generation);

        self.dense.push(Node {
            visual,
            key: None,
            src_object: None,
            parent: None,
            children: Vec::new(),
            dirty: Dirty::empty(),
            sparse_index,
        });

        self.sparse[sparse_index as usize] = Some(SparseEntry {
            dense_index,
            generation,
        });

        id
    }

    /// Remove a node and its whole subtree from the tree.
    ///
    /// Descendants are dropped before their ancestors, so a layer is always
    /// torn down while its overlay still exists.
    pub fn unregister(&mut self, id: NodeId) {
        if !self.contains(id) {
            return;
        }

        // Detach from the parent first so the parent's order stays consistent
        if let Some(parent_id) = self.get_parent(id) {
            if let Some(parent_dense) = self.get_dense_index(parent_id) {
                self.dense[parent_dense].children.retain(|&c| c != id);
            }
            self.mark_dirty(parent_id, Dirty::STRUCTURE);
        }

        let mut doomed = Vec::new();
        self.collect_post_order(id, &mut doomed);
        for node_id in doomed {
            self.remove_single(node_id);
        }
    }

    fn collect_post_order(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.children(id) {
            self.collect_post_order(child, out);
        }
        out.push(id);
    }

    fn remove_single(&mut self, id: NodeId) {
        let Some(dense_index) = self.get_dense_index(id) else {
            return;
        };

        let last_dense_index = self.dense.len() - 1;

        // Swap-remove: move last element to this position
        let removed_node = self.dense.swap_remove(dense_index);

        // Fix up the moved node's sparse entry (if we didn't remove the last element)
        if dense_index != last_dense_index {
            let moved_sparse_idx = self.dense[dense_index].sparse_index;
            if let Some(ref mut entry) = self.sparse[moved_sparse_idx as usize] {
                entry.dense_index = dense_index;
            }
        }

        // Invalidate the sparse entry but keep the generation for the next allocation
        self.sparse[id.index as usize] = Some(SparseEntry {
            dense_index: usize::MAX,
            generation: id.generation,
        });
        self.free_indices.push(id.index);
        self.dirty_queue.retain(|&d| d != id);

        log::trace!(
            "Removed {} node {:?}",
            removed_node.visual.kind_name(),
            id
        );

        // Drop after all indices are fixed; node teardown may release resources
        drop(removed_node);
    }

    /// Get the dense array index for a NodeId, validating generation.
    fn get_dense_index(&self, id: NodeId) -> Option<usize> {
        self.sparse
            .get(id.index as usize)
            .and_then(|e| e.as_ref())
            .filter(|e| e.generation == id.generation && e.dense_index != usize::MAX)
            .map(|e| e.dense_index)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.get_dense_index(id).map(|idx| &self.dense[idx])
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let idx = self.get_dense_index(id)?;
        Some(&mut self.dense[idx])
    }

    /// Check if a node is registered.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get_dense_index(id).is_some()
    }

    pub fn visual(&self, id: NodeId) -> Option<&Visual> {
        self.node(id).map(|n| &n.visual)
    }

    pub fn visual_mut(&mut self, id: NodeId) -> Option<&mut Visual> {
        self.node_mut(id).map(|n| &mut n.visual)
    }

    pub fn overlay(&self, id: NodeId) -> Option<&OverlayNode> {
        match self.visual(id) {
            Some(Visual::Overlay(overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn overlay_mut(&mut self, id: NodeId) -> Option<&mut OverlayNode> {
        match self.visual_mut(id) {
            Some(Visual::Overlay(overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn layer(&self, id: NodeId) -> Option<&LayerNode> {
        match self.visual(id) {
            Some(Visual::Layer(layer)) => Some(layer),
            _ => None,
        }
    }

    pub fn layer_mut(&mut self, id: NodeId) -> Option<&mut LayerNode> {
        match self.visual_mut(id) {
            Some(Visual::Layer(layer)) => Some(layer),
            _ => None,
        }
    }

    /// The data identity this node was created for.
    pub fn key(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| n.key.as_deref())
    }

    pub fn set_key(&mut self, id: NodeId, key: &str) {
        if let Some(node) = self.node_mut(id) {
            if node.key.as_deref() != Some(key) {
                node.key = Some(key.to_string());
            }
        }
    }

    /// Whether `item` is the exact object this node was last synchronized from.
    pub fn is_current<T: Any>(&self, id: NodeId, item: &Rc<T>) -> bool {
        self.node(id)
            .and_then(|n| n.src_object.as_ref())
            .is_some_and(|src| Rc::as_ptr(src) as *const () == Rc::as_ptr(item) as *const ())
    }

    /// Remember `item` as the object this node now reflects.
    pub fn set_src_object<T: Any>(&mut self, id: NodeId, item: Rc<T>) {
        if let Some(node) = self.node_mut(id) {
            node.src_object = Some(item as Rc<dyn Any>);
        }
    }

    /// The data object this node was last synchronized from.
    pub fn src_object<T: Any>(&self, id: NodeId) -> Option<Rc<T>> {
        self.node(id)
            .and_then(|n| n.src_object.clone())
            .and_then(|src| src.downcast::<T>().ok())
    }

    pub fn get_parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Children of a node in render order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    /// Position of `child` among its parent's children.
    pub fn index_in_parent(&self, child: NodeId) -> Option<usize> {
        let parent = self.get_parent(child)?;
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Insert `child` under `parent` at `index` (clamped to the child count).
    ///
    /// A child that is still attached elsewhere is detached first.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) {
            return;
        }

        if let Some(old_parent) = self.get_parent(child) {
            if let Some(old) = self.node_mut(old_parent) {
                old.children.retain(|&c| c != child);
            }
            self.mark_dirty(old_parent, Dirty::STRUCTURE);
        }

        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            let index = index.min(node.children.len());
            node.children.insert(index, child);
        }
        self.mark_dirty(parent, Dirty::STRUCTURE);
    }

    /// Relocate an attached child to `index` in one step.
    ///
    /// The node is never unregistered in between, so its live state survives.
    pub fn move_child(&mut self, parent: NodeId, child: NodeId, index: usize) {
        let Some(node) = self.node_mut(parent) else {
            return;
        };
        let Some(from) = node.children.iter().position(|&c| c == child) else {
            return;
        };
        if from == index {
            return;
        }

        let moved = node.children.remove(from);
        let index = index.min(node.children.len());
        node.children.insert(index, moved);
        self.mark_dirty(parent, Dirty::STRUCTURE);
    }

    /// Put `replacement` in the slot held by `old` and remove `old`.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, replacement: NodeId) {
        let Some(index) = self.children(parent).iter().position(|&c| c == old) else {
            return;
        };
        self.unregister(old);
        self.insert_child(parent, index, replacement);
    }

    /// Accumulate dirty flags on a node.
    pub fn mark_dirty(&mut self, id: NodeId, flags: Dirty) {
        if flags.is_empty() {
            return;
        }
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let was_clean = node.dirty.is_empty();
        node.dirty |= flags;
        if was_clean {
            self.dirty_queue.push(id);
        }
    }

    pub fn dirty(&self, id: NodeId) -> Dirty {
        self.node(id).map(|n| n.dirty).unwrap_or_default()
    }

    /// Drain all pending dirty flags.
    pub fn take_dirty(&mut self) -> Vec<(NodeId, Dirty)> {
        let queue = std::mem::take(&mut self.dirty_queue);
        queue
            .into_iter()
            .filter_map(|id| {
                let node = self.node_mut(id)?;
                let flags = std::mem::take(&mut node.dirty);
                Some((id, flags))
            })
            .collect()
    }

    /// Get the number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.dense.len()
    }

    /// Remove every node.
    pub fn clear(&mut self) {
        // Drop leaf-first so layers never outlive their overlay's store
        let roots: Vec<NodeId> = self
            .sparse
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let entry = entry.as_ref()?;
                let id = NodeId::new(index as u32, entry.generation);
                (self.contains(id) && self.get_parent(id).is_none()).then_some(id)
            })
            .collect();
        for root in roots {
            self.unregister(root);
        }
        self.dirty_queue.clear();
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SceneTree {
    fn drop(&mut self) {
        self.clear();
    }
}
