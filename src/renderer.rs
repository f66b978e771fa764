//! The renderer: owner of the live tree and of the `overlays` property.

use std::cell::{Cell, Ref, RefCell};
use std::fmt::Write as _;
use std::future::Future;
use std::rc::Rc;

use crate::assets::{BlobRegistry, Fetcher, FileFetcher, HttpFetcher, ResourceHandles, SchemeFetcher};
use crate::config::RendererConfig;
use crate::elements::{DetachedPlayerHost, ElementRegistry, PlayerHost};
use crate::events::{Emitter, SceneEvent, Subscription};
use crate::frame::FrameClock;
use crate::projector::{Projector, RenderStats};
use crate::reconcile::MergeStats;
use crate::scene::Scene;
use crate::scripting::{NoopScriptHost, ScriptHost};
use crate::tree::{Dirty, NodeId, SceneTree, Visual};

/// Builder for a [`Renderer`] with custom collaborators.
///
/// ```ignore
/// let renderer = Renderer::builder()
///     .config(RendererConfig::new().asset_root("assets"))
///     .script_host(Rc::new(MyScripts::default()))
///     .build();
/// ```
#[derive(Default)]
pub struct RendererBuilder {
    config: RendererConfig,
    fetcher: Option<Rc<dyn Fetcher>>,
    handles: Option<Rc<dyn ResourceHandles>>,
    players: Option<Rc<dyn PlayerHost>>,
    scripts: Option<Rc<dyn ScriptHost>>,
    registry: Option<ElementRegistry>,
    frames: Option<FrameClock>,
}

impl RendererBuilder {
    pub fn config(mut self, config: RendererConfig) -> Self {
        self.config = config;
        self
    }

    /// Fetcher for asset sources. Defaults to a [`SchemeFetcher`]: HTTP for
    /// remote URLs, a [`FileFetcher`] rooted at the configured asset root
    /// for the rest.
    pub fn fetcher(mut self, fetcher: Rc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Registry for local resource handles. Defaults to a [`BlobRegistry`].
    pub fn handles(mut self, handles: Rc<dyn ResourceHandles>) -> Self {
        self.handles = Some(handles);
        self
    }

    pub fn player_host(mut self, players: Rc<dyn PlayerHost>) -> Self {
        self.players = Some(players);
        self
    }

    pub fn script_host(mut self, scripts: Rc<dyn ScriptHost>) -> Self {
        self.scripts = Some(scripts);
        self
    }

    /// Element kinds. Defaults to [`ElementRegistry::with_builtins`].
    pub fn registry(mut self, registry: ElementRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share a frame clock with the host instead of creating one.
    pub fn frame_clock(mut self, frames: FrameClock) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn build(self) -> Renderer {
        let config = self.config;
        let fetcher: Rc<dyn Fetcher> = match (self.fetcher, &config.asset_root) {
            (Some(fetcher), _) => fetcher,
            (None, Some(root)) => Rc::new(SchemeFetcher::new(FileFetcher::with_root(root), HttpFetcher::new())),
            (None, None) => Rc::new(SchemeFetcher::default()),
        };
        let handles: Rc<dyn ResourceHandles> = match self.handles {
            Some(handles) => handles,
            None => Rc::new(BlobRegistry::new()),
        };
        let players: Rc<dyn PlayerHost> = match self.players {
            Some(players) => players,
            None => Rc::new(DetachedPlayerHost),
        };
        let scripts: Rc<dyn ScriptHost> = match self.scripts {
            Some(scripts) => scripts,
            None => Rc::new(NoopScriptHost),
        };
        let frames = self.frames.unwrap_or_default();
        let events = Emitter::new();

        let tree = Rc::new(RefCell::new(SceneTree::new()));
        let container = tree.borrow_mut().register(Visual::Group);

        let projector = Projector {
            tree: Rc::downgrade(&tree),
            frames: frames.clone(),
            registry: Rc::new(self.registry.unwrap_or_else(ElementRegistry::with_builtins)),
            fetcher,
            handles,
            players,
            scripts,
            execute_scripts_on_load: config.execute_scripts_on_load,
            events: events.clone(),
            layer_stats: Cell::new(MergeStats::default()),
        };

        Renderer {
            tree,
            container,
            projector,
            overlays: Scene::default(),
            frames,
            config,
            stats: RenderStats::default(),
            events,
        }
    }
}

/// Renders a [`Scene`] into a live tree and keeps it in sync.
///
/// The renderer is single-threaded. Setting the overlays reconciles the tree
/// synchronously; asset loads and readiness gates continue as tasks on the
/// current `tokio::task::LocalSet`, so every call that may create overlays
/// must run inside one.
pub struct Renderer {
    tree: Rc<RefCell<SceneTree>>,
    container: NodeId,
    projector: Projector,
    overlays: Scene,
    frames: FrameClock,
    config: RendererConfig,
    stats: RenderStats,
    events: Emitter<SceneEvent>,
}

impl Renderer {
    /// A renderer with the default collaborators.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: RendererConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> RendererBuilder {
        RendererBuilder::default()
    }

    /// Replace the scene and reconcile the tree with it.
    pub fn set_overlays(&mut self, scene: Scene) -> RenderStats {
        let pass = {
            let mut tree = self.tree.borrow_mut();
            self.projector
                .render_overlay_array(&mut tree, self.container, scene.overlays())
        };

        log::debug!(
            "Rendered {} overlays: {:?}",
            scene.overlays().len(),
            pass.total()
        );

        self.overlays = scene;
        self.stats.accumulate(pass);
        pass
    }

    /// The scene last passed to [`set_overlays`](Self::set_overlays).
    pub fn overlays(&self) -> &Scene {
        &self.overlays
    }

    /// The node holding one child per overlay.
    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Read access to the live tree.
    ///
    /// Asset refreshes and overlay loads that complete while this borrow is
    /// held are applied on a later frame.
    pub fn tree(&self) -> Ref<'_, SceneTree> {
        self.tree.borrow()
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn frames(&self) -> &FrameClock {
        &self.frames
    }

    /// Signal that a frame was presented.
    pub fn frame(&self) -> u64 {
        self.frames.tick()
    }

    /// Tick the frame clock at the configured interval, forever.
    pub fn drive_frames(&self) -> impl Future<Output = ()> + 'static {
        self.frames.clone().drive(self.config.frame_interval)
    }

    /// Listen for scene events of every overlay.
    pub fn subscribe(&self, listener: impl Fn(&SceneEvent) + 'static) -> Subscription {
        self.events.subscribe(listener)
    }

    /// Statistics accumulated over every render.
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Drain the dirty flags of the live tree.
    pub fn take_dirty(&self) -> Vec<(NodeId, Dirty)> {
        self.tree.borrow_mut().take_dirty()
    }

    /// Node of the overlay with the given id.
    pub fn overlay_node(&self, key: &str) -> Option<NodeId> {
        let tree = self.tree.borrow();
        tree.children(self.container)
            .iter()
            .copied()
            .find(|&node| tree.key(node) == Some(key))
    }

    /// Node of a layer, by overlay id and layer id.
    pub fn layer_node(&self, overlay: &str, layer: &str) -> Option<NodeId> {
        let overlay = self.overlay_node(overlay)?;
        let tree = self.tree.borrow();
        tree.children(overlay)
            .iter()
            .copied()
            .find(|&node| tree.key(node) == Some(layer))
    }

    /// Whether the overlay's readiness gate has resolved.
    pub fn is_loaded(&self, key: &str) -> bool {
        let Some(node) = self.overlay_node(key) else {
            return false;
        };
        self.tree
            .borrow()
            .overlay(node)
            .is_some_and(|overlay| overlay.is_visible())
    }

    /// Whether every overlay currently rendered has loaded.
    pub fn all_loaded(&self) -> bool {
        let tree = self.tree.borrow();
        tree.children(self.container)
            .iter()
            .all(|&node| tree.overlay(node).is_some_and(|overlay| overlay.is_visible()))
    }

    /// Start the scripts of an overlay by hand.
    ///
    /// Returns false when there is no such overlay or its scripts are
    /// already running.
    pub fn execute_scripts(&self, key: &str) -> bool {
        let Some(node) = self.overlay_node(key) else {
            return false;
        };
        self.tree
            .borrow_mut()
            .overlay_mut(node)
            .is_some_and(|overlay| overlay.execute_scripts())
    }

    /// Stop the running scripts of an overlay.
    pub fn reset_scripts(&self, key: &str) -> bool {
        let Some(node) = self.overlay_node(key) else {
            return false;
        };
        self.tree
            .borrow_mut()
            .overlay_mut(node)
            .is_some_and(|overlay| overlay.reset_scripts())
    }

    /// Human readable dump of the live tree.
    pub fn describe(&self) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        let _ = writeln!(out, "container ({} overlays)", tree.child_count(self.container));

        for &overlay_node in tree.children(self.container) {
            let Some(overlay) = tree.overlay(overlay_node) else {
                continue;
            };
            let _ = writeln!(
                out,
                "  overlay '{}' [{}{}]",
                overlay.id(),
                if overlay.is_visible() { "visible" } else { "hidden" },
                if overlay.scripts_running() { ", scripts running" } else { "" },
            );

            for &layer_node in tree.children(overlay_node) {
                let Some(layer) = tree.layer(layer_node) else {
                    continue;
                };
                let (left, top, width, height) = layer.common().rect();
                let _ = write!(
                    out,
                    "    <{}> '{}' at ({left}, {top}) size {width}x{height}",
                    layer.tag(),
                    layer.id(),
                );
                if let Some((natural_width, natural_height)) = layer.natural_size() {
                    let _ = write!(out, " natural {natural_width}x{natural_height}");
                }
                for (name, id) in layer.asset_refs().iter() {
                    let _ = write!(out, " {name}={id}");
                }
                out.push('\n');
            }
        }
        out
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
