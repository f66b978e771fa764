//! Script execution collaborator.
//!
//! Overlays carry opaque scripts. The renderer decides when they start and
//! stop; what running them means is up to the [`ScriptHost`].

use std::rc::Rc;

use serde_json::Value;

use crate::assets::{AssetMap, AssetStore};

/// Everything a script run gets to see.
pub struct ScriptScope {
    /// Id of the overlay the scripts belong to
    pub overlay: String,
    pub scripts: Rc<Value>,
    pub assets: Rc<AssetMap>,
    pub settings: Rc<Value>,
    /// The overlay's loaded assets
    pub store: AssetStore,
}

/// A running set of overlay scripts.
pub trait ScriptContext {
    /// The overlay's settings were replaced.
    fn update_settings(&mut self, settings: &Rc<Value>);

    /// Stop the scripts and release what they hold.
    fn destroy(self: Box<Self>);
}

/// Starts script contexts.
pub trait ScriptHost {
    fn start(&self, scope: ScriptScope) -> Box<dyn ScriptContext>;
}

/// Host that runs nothing. Contexts only log their lifecycle.
#[derive(Debug, Default)]
pub struct NoopScriptHost;

struct NoopContext {
    overlay: String,
}

impl ScriptHost for NoopScriptHost {
    fn start(&self, scope: ScriptScope) -> Box<dyn ScriptContext> {
        log::debug!("Scripts started for overlay '{}'", scope.overlay);
        Box::new(NoopContext {
            overlay: scope.overlay,
        })
    }
}

impl ScriptContext for NoopContext {
    fn update_settings(&mut self, _settings: &Rc<Value>) {
        log::debug!("Settings updated for overlay '{}'", self.overlay);
    }

    fn destroy(self: Box<Self>) {
        log::debug!("Scripts stopped for overlay '{}'", self.overlay);
    }
}
