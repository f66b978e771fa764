//! Projection of scene data onto the live tree.
//!
//! The overlay projector reconciles the overlay list into the container
//! node; for every overlay it assigns the overlay-level properties and then
//! runs the layer projector, which reconciles that overlay's layer list into
//! it. Both go through [`merge`], so unchanged items are skipped by identity
//! and surviving nodes keep their live state.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::assets::{AssetStore, Fetcher, ResourceHandles};
use crate::elements::{ElementRegistry, PlayerHost};
use crate::error::StrataError;
use crate::events::{Emitter, SceneEvent};
use crate::frame::FrameClock;
use crate::gate::ReadinessGate;
use crate::overlay::{OverlayHandle, OverlayNode};
use crate::reconcile::{merge, MergeStats};
use crate::scene::{LayerData, OverlayData};
use crate::scripting::ScriptHost;
use crate::tree::{Dirty, NodeId, SceneTree, Visual};

/// Layer keys that identify or describe the item rather than configure it.
const IGNORED_LAYER_PROPS: &[&str] = &["id", "elementKind", "elementName", "label"];

/// Merge statistics of one or more render passes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    /// Number of times the overlay list was rendered
    pub passes: u64,
    pub overlays: MergeStats,
    pub layers: MergeStats,
}

impl RenderStats {
    /// Overlay and layer statistics combined.
    pub fn total(&self) -> MergeStats {
        let mut total = self.overlays;
        total.accumulate(self.layers);
        total
    }

    pub fn accumulate(&mut self, other: RenderStats) {
        self.passes += other.passes;
        self.overlays.accumulate(other.overlays);
        self.layers.accumulate(other.layers);
    }
}

/// Creates and updates overlay and layer nodes.
pub struct Projector {
    pub(crate) tree: Weak<RefCell<SceneTree>>,
    pub(crate) frames: FrameClock,
    pub(crate) registry: Rc<ElementRegistry>,
    pub(crate) fetcher: Rc<dyn Fetcher>,
    pub(crate) handles: Rc<dyn ResourceHandles>,
    pub(crate) players: Rc<dyn PlayerHost>,
    pub(crate) scripts: Rc<dyn ScriptHost>,
    pub(crate) execute_scripts_on_load: bool,
    pub(crate) events: Emitter<SceneEvent>,
    pub(crate) layer_stats: Cell<MergeStats>,
}

impl Projector {
    /// Reconcile `overlays` into the children of `container`.
    ///
    /// Must be called inside a `LocalSet`: new overlays start their asset
    /// loads and readiness gates as tasks.
    pub fn render_overlay_array(
        &self,
        tree: &mut SceneTree,
        container: NodeId,
        overlays: &[Rc<OverlayData>],
    ) -> RenderStats {
        self.layer_stats.set(MergeStats::default());

        let overlay_stats = merge(tree, container, overlays, |tree, overlay, existing| {
            self.render_overlay(tree, overlay, existing)
        });

        RenderStats {
            passes: 1,
            overlays: overlay_stats,
            layers: self.layer_stats.take(),
        }
    }

    /// Create or update the node of one overlay.
    pub fn render_overlay(
        &self,
        tree: &mut SceneTree,
        overlay: &Rc<OverlayData>,
        existing: Option<NodeId>,
    ) -> Option<NodeId> {
        let node = match existing.filter(|&node| tree.overlay(node).is_some()) {
            Some(node) => node,
            None => self.create_overlay(tree, &overlay.id),
        };

        if tree.is_current(node, overlay) {
            return Some(node);
        }

        let execute_scripts_on_load = overlay
            .execute_scripts_on_load
            .unwrap_or(self.execute_scripts_on_load);

        let live = tree.overlay_mut(node)?;
        let assets_changed = live.set_assets(&overlay.assets);
        live.set_scripts(&overlay.scripts);
        live.set_settings(&overlay.settings);
        live.set_execute_scripts_on_load(execute_scripts_on_load);
        if assets_changed {
            tree.mark_dirty(node, Dirty::CONTENT);
        }

        let layer_stats = merge(tree, node, &overlay.layers, |tree, layer, existing| {
            self.render_layer(tree, node, layer, existing)
        });
        let mut total = self.layer_stats.get();
        total.accumulate(layer_stats);
        self.layer_stats.set(total);

        tree.set_src_object(node, Rc::clone(overlay));
        Some(node)
    }

    /// Create or update the node of one layer of the overlay node `overlay`.
    ///
    /// Missing or unknown element kinds are logged and yield `None`. A layer
    /// whose kind changed gets a fresh node.
    pub fn render_layer(
        &self,
        tree: &mut SceneTree,
        overlay: NodeId,
        layer: &Rc<LayerData>,
        existing: Option<NodeId>,
    ) -> Option<NodeId> {
        let Some(kind) = layer.element_kind.as_deref() else {
            log::error!(
                "{}",
                StrataError::MissingElementKind {
                    layer: layer.id.clone()
                }
            );
            return None;
        };

        let Some(spec) = self.registry.get(kind) else {
            log::error!(
                "{}",
                StrataError::UnknownElementKind {
                    kind: kind.to_string()
                }
            );
            return None;
        };

        let reusable = existing.filter(|&node| tree.layer(node).is_some_and(|live| live.kind() == kind));
        let node = match reusable {
            Some(node) => node,
            None => match tree.create_layer(overlay, &layer.id, spec) {
                Ok(node) => node,
                Err(err) => {
                    log::error!("Could not create layer '{}': {err}", layer.id);
                    return None;
                }
            },
        };

        if tree.is_current(node, layer) {
            return Some(node);
        }

        // Every declared property is applied; setters skip unchanged values
        let live = tree.layer_mut(node)?;
        let dirty = layer
            .props
            .iter()
            .filter(|(name, _)| !IGNORED_LAYER_PROPS.contains(&name.as_str()))
            .fold(Dirty::empty(), |dirty, (name, value)| dirty | live.apply(name, value));
        tree.mark_dirty(node, dirty);

        Some(node)
    }

    fn create_overlay(&self, tree: &mut SceneTree, key: &str) -> NodeId {
        let store = AssetStore::new(Rc::clone(&self.fetcher), Rc::clone(&self.handles));
        let handle = OverlayHandle::new(store, ReadinessGate::new(), Rc::clone(&self.players));
        let overlay = OverlayNode::new(
            key,
            handle.clone(),
            Rc::clone(&self.scripts),
            self.execute_scripts_on_load,
        );

        let node = tree.register(Visual::Overlay(overlay));
        tree.mark_dirty(node, Dirty::all());

        let listener = {
            let tree = self.tree.clone();
            let frames = self.frames.clone();
            let events = self.events.clone();
            let key = key.to_string();
            handle.assets().on_assets_changed(move |_| {
                let key = key.clone();
                with_tree_mut(&tree, &frames, &events, move |tree| {
                    refresh_layer_assets(tree, node, key)
                });
            })
        };
        if let Some(live) = tree.overlay_mut(node) {
            live.set_assets_listener(listener);
        }

        let tree_ref = self.tree.clone();
        let frames = self.frames.clone();
        let events = self.events.clone();
        let ready_key = key.to_string();
        handle.gate().start(&self.frames, handle.assets(), move || {
            with_tree_mut(&tree_ref, &frames, &events, move |tree| {
                overlay_ready(tree, node, ready_key)
            });
        });

        log::debug!("Created overlay '{key}' as {node:?}");
        node
    }
}

/// Run `work` on the tree as soon as it is not borrowed, then emit the event
/// it returns.
///
/// Async callbacks may fire while the host holds the tree; the work is then
/// retried on every following frame until the borrow is released or the
/// tree is gone.
fn with_tree_mut<F>(
    tree: &Weak<RefCell<SceneTree>>,
    frames: &FrameClock,
    events: &Emitter<SceneEvent>,
    work: F,
) where
    F: FnOnce(&mut SceneTree) -> Option<SceneEvent> + 'static,
{
    let Some(strong) = tree.upgrade() else {
        return;
    };
    if let Ok(mut guard) = strong.try_borrow_mut() {
        let event = work(&mut guard);
        drop(guard);
        if let Some(event) = event {
            events.emit(&event);
        }
        return;
    }

    log::debug!("Scene tree is borrowed, deferring update to the next frame");
    let next_frame = frames.next_frame();
    let tree = tree.clone();
    let frames = frames.clone();
    let events = events.clone();
    tokio::task::spawn_local(async move {
        next_frame.await;
        loop {
            let Some(strong) = tree.upgrade() else {
                return;
            };
            if let Ok(mut guard) = strong.try_borrow_mut() {
                let event = work(&mut guard);
                drop(guard);
                if let Some(event) = event {
                    events.emit(&event);
                }
                return;
            }
            drop(strong);
            frames.next_frame().await;
        }
    });
}

/// Re-resolve the asset-bound properties of every layer of `overlay`.
fn refresh_layer_assets(tree: &mut SceneTree, overlay: NodeId, key: String) -> Option<SceneEvent> {
    // The node may have been removed while the batch was loading
    tree.overlay(overlay)?;

    let layers = tree.children(overlay).to_vec();
    for layer in layers {
        let Some(live) = tree.layer_mut(layer) else {
            continue;
        };
        let dirty = live.assets_changed();
        tree.mark_dirty(layer, dirty);
    }
    Some(SceneEvent::AssetsChanged { overlay, key })
}

/// Expose an overlay whose readiness gate resolved.
fn overlay_ready(tree: &mut SceneTree, node: NodeId, key: String) -> Option<SceneEvent> {
    let overlay = tree.overlay_mut(node)?;

    overlay.show();
    if overlay.execute_scripts_on_load() {
        overlay.execute_scripts();
    }
    tree.mark_dirty(node, Dirty::VISIBILITY);

    log::debug!("Overlay '{key}' loaded");
    Some(SceneEvent::Loaded { overlay: node, key })
}
