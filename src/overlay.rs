//! Overlay nodes: the live counterpart of an [`OverlayData`](crate::scene::OverlayData).
//!
//! An overlay owns the asset store its layers resolve `#asset` references
//! against, the readiness gate that keeps it hidden until its content has
//! preloaded, and the lifecycle of its scripts. Layers reach the store and
//! the gate through an [`OverlayHandle`] given to them at construction.

use std::future::Future;
use std::rc::Rc;

use serde_json::Value;

use crate::assets::{AssetMap, AssetStore, LoadedAsset};
use crate::elements::PlayerHost;
use crate::events::Subscription;
use crate::gate::ReadinessGate;
use crate::scripting::{ScriptContext, ScriptHost, ScriptScope};

/// What a layer needs from its overlay.
#[derive(Clone)]
pub struct OverlayHandle {
    assets: AssetStore,
    gate: ReadinessGate,
    players: Rc<dyn PlayerHost>,
}

impl OverlayHandle {
    pub fn new(assets: AssetStore, gate: ReadinessGate, players: Rc<dyn PlayerHost>) -> Self {
        Self {
            assets,
            gate,
            players,
        }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn players(&self) -> &dyn PlayerHost {
        self.players.as_ref()
    }

    /// Keep the overlay hidden until `operation` settles.
    pub fn register_pending<F>(&self, operation: F)
    where
        F: Future + 'static,
    {
        self.gate.register_pending(operation);
    }
}

/// A live overlay.
///
/// Every setter compares the incoming value by reference with the current one
/// and does nothing when it is the same object.
pub struct OverlayNode {
    id: String,
    handle: OverlayHandle,
    assets: Option<Rc<AssetMap>>,
    scripts: Rc<Value>,
    settings: Rc<Value>,
    execute_scripts_on_load: bool,
    visible: bool,
    script_host: Rc<dyn ScriptHost>,
    script_context: Option<Box<dyn ScriptContext>>,
    assets_listener: Option<Subscription>,
}

impl OverlayNode {
    pub fn new(
        id: impl Into<String>,
        handle: OverlayHandle,
        script_host: Rc<dyn ScriptHost>,
        execute_scripts_on_load: bool,
    ) -> Self {
        Self {
            id: id.into(),
            handle,
            assets: None,
            scripts: Rc::new(Value::Null),
            settings: Rc::new(Value::Null),
            execute_scripts_on_load,
            visible: false,
            script_host,
            script_context: None,
            assets_listener: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> &OverlayHandle {
        &self.handle
    }

    /// Replace the declared assets and start loading them.
    ///
    /// Returns whether a new batch was started. Must be called inside a
    /// `LocalSet`.
    pub fn set_assets(&mut self, assets: &Rc<AssetMap>) -> bool {
        if self.assets.as_ref().is_some_and(|current| Rc::ptr_eq(current, assets)) {
            return false;
        }
        self.assets = Some(Rc::clone(assets));
        self.handle.assets.load(assets);
        true
    }

    pub fn assets(&self) -> Option<&Rc<AssetMap>> {
        self.assets.as_ref()
    }

    pub fn set_scripts(&mut self, scripts: &Rc<Value>) -> bool {
        if Rc::ptr_eq(&self.scripts, scripts) {
            return false;
        }
        self.scripts = Rc::clone(scripts);
        true
    }

    pub fn scripts(&self) -> &Rc<Value> {
        &self.scripts
    }

    /// Replace the settings, forwarding them to running scripts.
    pub fn set_settings(&mut self, settings: &Rc<Value>) -> bool {
        if Rc::ptr_eq(&self.settings, settings) {
            return false;
        }
        self.settings = Rc::clone(settings);
        if let Some(context) = self.script_context.as_mut() {
            context.update_settings(settings);
        }
        true
    }

    pub fn settings(&self) -> &Rc<Value> {
        &self.settings
    }

    pub fn set_execute_scripts_on_load(&mut self, execute: bool) -> bool {
        if self.execute_scripts_on_load == execute {
            return false;
        }
        self.execute_scripts_on_load = execute;
        true
    }

    pub fn execute_scripts_on_load(&self) -> bool {
        self.execute_scripts_on_load
    }

    /// Whether the readiness gate has exposed the overlay.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_ready(&self) -> bool {
        self.handle.gate.is_resolved()
    }

    pub(crate) fn show(&mut self) -> bool {
        !std::mem::replace(&mut self.visible, true)
    }

    pub fn find_asset(&self, id: &str) -> Option<LoadedAsset> {
        self.handle.assets.find_asset(id)
    }

    pub fn assets_available(&self) -> bool {
        self.handle.assets.assets_available()
    }

    pub fn scripts_running(&self) -> bool {
        self.script_context.is_some()
    }

    /// Start the overlay's scripts.
    ///
    /// Logs an error and does nothing when they are already running.
    pub fn execute_scripts(&mut self) -> bool {
        if self.script_context.is_some() {
            log::error!(
                "Scripts of overlay '{}' are already running, reset them before executing again",
                self.id
            );
            return false;
        }

        let scope = ScriptScope {
            overlay: self.id.clone(),
            scripts: Rc::clone(&self.scripts),
            assets: self.assets.clone().unwrap_or_default(),
            settings: Rc::clone(&self.settings),
            store: self.handle.assets.clone(),
        };
        self.script_context = Some(self.script_host.start(scope));
        true
    }

    /// Stop the running scripts.
    ///
    /// Logs an error and does nothing when no scripts are running.
    pub fn reset_scripts(&mut self) -> bool {
        let Some(context) = self.script_context.take() else {
            log::error!("Overlay '{}' has no running scripts to reset", self.id);
            return false;
        };
        context.destroy();
        true
    }

    pub(crate) fn set_assets_listener(&mut self, listener: Subscription) {
        self.assets_listener = Some(listener);
    }
}

impl Drop for OverlayNode {
    fn drop(&mut self) {
        self.assets_listener.take();
        if let Some(context) = self.script_context.take() {
            context.destroy();
        }
        self.handle.assets.teardown();
        log::debug!("Overlay '{}' torn down", self.id);
    }
}
