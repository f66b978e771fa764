//! Scene description: the plain data the renderer reconciles.
//!
//! Data objects are shared behind `Rc`. A live node remembers the exact
//! `Rc` it was built from, so handing the renderer the same object again is
//! a no-op, while a new object with identical content counts as a change.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assets::{AssetDescriptor, AssetMap};
use crate::error::StrataResult;
use crate::reconcile::Keyed;

/// Ordered overlays, first on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scene {
    overlays: Vec<Rc<OverlayData>>,
}

impl Scene {
    pub fn new(overlays: Vec<Rc<OverlayData>>) -> Self {
        Self { overlays }
    }

    /// Parse the JSON scene format (an array of overlay objects).
    pub fn from_json(json: &str) -> StrataResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn overlays(&self) -> &[Rc<OverlayData>] {
        &self.overlays
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}

impl From<Vec<OverlayData>> for Scene {
    fn from(overlays: Vec<OverlayData>) -> Self {
        Self::new(overlays.into_iter().map(Rc::new).collect())
    }
}

/// A top-level composable unit: layers, the assets they reference, scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayData {
    pub id: String,
    #[serde(default)]
    pub assets: Rc<AssetMap>,
    #[serde(default)]
    pub layers: Vec<Rc<LayerData>>,
    #[serde(default)]
    pub scripts: Rc<Value>,
    #[serde(default)]
    pub settings: Rc<Value>,
    /// `None` falls back to the renderer's configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_scripts_on_load: Option<bool>,
}

impl OverlayData {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            assets: Rc::default(),
            layers: Vec::new(),
            scripts: Rc::default(),
            settings: Rc::default(),
            execute_scripts_on_load: None,
        }
    }

    pub fn with_asset(mut self, key: impl Into<String>, descriptor: AssetDescriptor) -> Self {
        Rc::make_mut(&mut self.assets).insert(key.into(), descriptor);
        self
    }

    pub fn with_layer(mut self, layer: LayerData) -> Self {
        self.layers.push(Rc::new(layer));
        self
    }

    pub fn with_scripts(mut self, scripts: Value) -> Self {
        self.scripts = Rc::new(scripts);
        self
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = Rc::new(settings);
        self
    }

    pub fn with_execute_scripts_on_load(mut self, execute: bool) -> Self {
        self.execute_scripts_on_load = Some(execute);
        self
    }
}

impl Keyed for OverlayData {
    fn key(&self) -> &str {
        &self.id
    }
}

/// One positioned visual element. Everything besides the identity fields is
/// a kind-specific property, kept in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerData {
    pub id: String,
    #[serde(
        rename = "elementKind",
        alias = "elementName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub element_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub props: serde_json::Map<String, Value>,
}

impl LayerData {
    pub fn new(id: impl Into<String>, element_kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element_kind: Some(element_kind.into()),
            label: None,
            props: serde_json::Map::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }
}

impl Keyed for LayerData {
    fn key(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_from_json() {
        let scene = Scene::from_json(
            r##"[{
                "id": "A",
                "assets": { "logo": { "src": "logo.png" } },
                "layers": [
                    { "id": "L1", "elementKind": "rectangle", "label": "bg", "width": 100, "top": 5 },
                    { "id": "L2", "elementName": "image", "src": "#logo" }
                ],
                "executeScriptsOnLoad": false
            }]"##,
        )
        .unwrap();

        let overlay = &scene.overlays()[0];
        assert_eq!(overlay.id, "A");
        assert_eq!(overlay.assets.get("logo").map(|a| a.src.as_str()), Some("logo.png"));
        assert_eq!(overlay.execute_scripts_on_load, Some(false));

        let rect = &overlay.layers[0];
        assert_eq!(rect.element_kind.as_deref(), Some("rectangle"));
        assert_eq!(rect.label.as_deref(), Some("bg"));
        let names: Vec<&str> = rect.props.keys().map(String::as_str).collect();
        assert_eq!(names, ["width", "top"]);

        assert_eq!(overlay.layers[1].element_kind.as_deref(), Some("image"));
    }

    #[test]
    fn test_builders() {
        let overlay = OverlayData::new("A")
            .with_asset("bg", AssetDescriptor::new("bg.png"))
            .with_layer(LayerData::new("L1", "rectangle").with_prop("width", 100));

        assert_eq!(overlay.key(), "A");
        assert_eq!(overlay.layers[0].key(), "L1");
        assert_eq!(overlay.layers[0].props.get("width"), Some(&Value::from(100)));
        assert!(overlay.scripts.is_null());
    }
}
