//! Layer nodes: one positioned element inside an overlay.

use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::elements::{CommonProps, Element, ElementCx, ElementSpec, Props};
use crate::error::{PropError, StrataError, StrataResult};
use crate::overlay::OverlayHandle;
use crate::tree::{Dirty, NodeId, SceneTree, Visual};

/// Which asset each property of a layer is bound to.
///
/// Keyed by property name (`src`), valued by asset id (`#logo`). A property
/// leaves the map as soon as it is set to anything but an asset reference.
#[derive(Debug, Clone, Default)]
pub struct AssetRefs {
    refs: IndexMap<String, String>,
}

impl AssetRefs {
    pub fn bind(&mut self, name: &str, id: &str) {
        self.refs.insert(name.to_string(), id.to_string());
    }

    pub fn unbind(&mut self, name: &str) {
        self.refs.shift_remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.refs.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.refs.iter().map(|(name, id)| (name.as_str(), id.as_str()))
    }
}

/// A live layer.
pub struct LayerNode {
    id: String,
    spec: Rc<ElementSpec>,
    common: CommonProps,
    element: Box<dyn Element>,
    refs: AssetRefs,
    overlay: OverlayHandle,
}

impl LayerNode {
    /// Build a layer of the given kind with the kind's defaults applied.
    pub fn new(id: impl Into<String>, spec: Rc<ElementSpec>, overlay: OverlayHandle) -> Self {
        let element = spec.construct();
        let mut layer = Self {
            id: id.into(),
            spec,
            common: CommonProps::default(),
            element,
            refs: AssetRefs::default(),
            overlay,
        };

        let spec = Rc::clone(&layer.spec);
        for (name, value) in spec.defaults() {
            layer.apply(name, value);
        }
        layer
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &str {
        self.spec.kind()
    }

    pub fn tag(&self) -> &str {
        self.spec.tag()
    }

    pub fn common(&self) -> &CommonProps {
        &self.common
    }

    pub fn element(&self) -> &dyn Element {
        self.element.as_ref()
    }

    /// The element as its concrete type.
    pub fn element_as<T: Element>(&self) -> Option<&T> {
        self.element.as_any().downcast_ref::<T>()
    }

    pub fn asset_refs(&self) -> &AssetRefs {
        &self.refs
    }

    /// Current value of a property, common or kind-specific.
    pub fn prop(&self, name: &str) -> Option<Value> {
        self.common
            .get_prop(name)
            .or_else(|| self.element.get_prop(name))
    }

    pub fn natural_size(&self) -> Option<(u32, u32)> {
        self.element.natural_size()
    }

    /// Apply one declared property.
    ///
    /// Properties the kind does not accept, and values of the wrong shape,
    /// are logged and skipped.
    pub fn apply(&mut self, name: &str, value: &Value) -> Dirty {
        match self.try_apply(name, value) {
            Ok(dirty) => dirty,
            Err(err) => {
                log::warn!("Layer '{}': {err}", self.id);
                Dirty::empty()
            }
        }
    }

    fn try_apply(&mut self, name: &str, value: &Value) -> Result<Dirty, PropError> {
        if !self.spec.allows(name) {
            return Err(self.not_allowed(name));
        }
        if let Some(result) = self.common.apply(name, value) {
            return result;
        }

        let mut cx = ElementCx::new(&self.id, &self.overlay, &mut self.refs);
        match self.element.set_prop(name, value, &mut cx) {
            Some(result) => result,
            None => Err(self.not_allowed(name)),
        }
    }

    fn not_allowed(&self, name: &str) -> PropError {
        PropError::NotAllowed {
            name: name.to_string(),
            kind: self.spec.kind().to_string(),
        }
    }

    /// Re-resolve every property bound to an asset.
    pub fn assets_changed(&mut self) -> Dirty {
        let bound: Vec<(String, String)> = self
            .refs
            .iter()
            .map(|(name, id)| (name.to_string(), id.to_string()))
            .collect();

        let mut dirty = Dirty::empty();
        for (name, id) in bound {
            let mut cx = ElementCx::new(&self.id, &self.overlay, &mut self.refs);
            let resolved = cx.resolve_asset(&id);
            dirty |= self.element.asset_resolved(&name, resolved, &mut cx);
        }
        dirty
    }
}

impl Drop for LayerNode {
    fn drop(&mut self) {
        self.element.teardown();
    }
}

impl SceneTree {
    /// Register a detached layer node for the overlay node `parent`.
    ///
    /// Fails when `parent` is not an overlay: layers only exist inside one.
    pub fn create_layer(&mut self, parent: NodeId, id: &str, spec: &Rc<ElementSpec>) -> StrataResult<NodeId> {
        if !self.contains(parent) {
            return Err(StrataError::StaleNode(parent));
        }
        let Some(overlay) = self.overlay(parent) else {
            return Err(StrataError::LayerOutsideOverlay { parent });
        };

        let layer = LayerNode::new(id, Rc::clone(spec), overlay.handle().clone());
        let node = self.register(Visual::Layer(layer));
        self.mark_dirty(node, Dirty::all());
        Ok(node)
    }
}
