//! Element kinds a layer can render.
//!
//! The [`ElementRegistry`] maps an `elementKind` string to an
//! [`ElementSpec`]: the constructor tag, the set of properties the kind
//! accepts and the default values applied when a layer of that kind is
//! created. Each kind is a concrete [`Element`] with a typed property struct
//! (`#[derive(Props)]`) and whatever runtime state it needs (resolved asset
//! URLs, an embedded player).
//!
//! Common properties (`top`, `left`, `width`, `height`, styling) are held by
//! the layer node itself, see [`CommonProps`].

pub mod common;
mod iframe;
mod image;
pub mod player;
pub mod props;
mod rectangle;
mod text;
mod video;

pub use common::CommonProps;
pub use iframe::{IframeElement, IframeProps};
pub use image::{ImageElement, ImageProps};
pub use player::{DetachedPlayerHost, EmbeddedPlayer, Player, PlayerCommand, PlayerHost};
pub use rectangle::RectangleElement;
pub use text::{TextElement, TextProps};
pub use video::{youtube_video, VideoElement, VideoProps, VideoSource, YouTubeVideo};

pub use crate::error::PropError;

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use serde_json::Value;

use crate::assets::is_asset_ref;
use crate::layer::AssetRefs;
use crate::overlay::OverlayHandle;
use crate::tree::Dirty;

/// A typed set of named properties.
///
/// Usually derived with `#[derive(Props)]`, which maps each field to its
/// camelCase JSON name and generates setters that only write changed values.
pub trait Props {
    /// JSON names of every property, in declaration order.
    fn prop_names() -> &'static [&'static str];

    /// Set a property by JSON name.
    ///
    /// `None` when the name is not part of this set; otherwise whether the
    /// value changed, or why it could not be applied.
    fn set_prop(&mut self, name: &str, value: &Value) -> Option<Result<bool, PropError>>;

    fn get_prop(&self, name: &str) -> Option<Value>;
}

/// Where a URL-capable property currently points.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResolvedUrl {
    /// Nothing declared
    #[default]
    Empty,
    /// An asset reference whose overlay has not finished loading yet
    Pending,
    /// An asset reference to a key the overlay does not declare
    Missing,
    /// The referenced asset failed to load
    Failed,
    /// A direct URL
    Url(String),
    /// A loaded asset's local handle
    Asset {
        url: String,
        natural_size: Option<(u32, u32)>,
    },
}

impl ResolvedUrl {
    /// The URL to render, if there is one.
    pub fn url(&self) -> Option<&str> {
        match self {
            ResolvedUrl::Url(url) | ResolvedUrl::Asset { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn natural_size(&self) -> Option<(u32, u32)> {
        match self {
            ResolvedUrl::Asset { natural_size, .. } => *natural_size,
            _ => None,
        }
    }
}

/// What an element can reach while applying a property.
pub struct ElementCx<'a> {
    layer: &'a str,
    overlay: &'a OverlayHandle,
    refs: &'a mut AssetRefs,
}

impl<'a> ElementCx<'a> {
    pub(crate) fn new(layer: &'a str, overlay: &'a OverlayHandle, refs: &'a mut AssetRefs) -> Self {
        Self {
            layer,
            overlay,
            refs,
        }
    }

    /// Id of the layer being updated.
    pub fn layer(&self) -> &str {
        self.layer
    }

    pub fn overlay(&self) -> &OverlayHandle {
        self.overlay
    }

    /// Bind a URL-capable property to its declared value.
    ///
    /// An `#asset` value is recorded in the layer's asset references so it
    /// re-resolves whenever the overlay's assets change; any other value
    /// clears the reference.
    pub fn bind_url(&mut self, name: &str, value: Option<&str>) -> ResolvedUrl {
        match value {
            None | Some("") => {
                self.refs.unbind(name);
                ResolvedUrl::Empty
            }
            Some(id) if is_asset_ref(id) => {
                self.refs.bind(name, id);
                self.resolve_asset(id)
            }
            Some(url) => {
                self.refs.unbind(name);
                ResolvedUrl::Url(url.to_string())
            }
        }
    }

    /// Look up an asset id (`#key`) in the overlay's current set.
    pub fn resolve_asset(&self, id: &str) -> ResolvedUrl {
        let store = self.overlay.assets();
        if !store.assets_available() {
            return ResolvedUrl::Pending;
        }

        let Some(asset) = store.find_asset(id) else {
            log::error!("Could not find asset {id} for layer '{}'", self.layer);
            return ResolvedUrl::Missing;
        };

        match asset.object_url() {
            Some(url) => ResolvedUrl::Asset {
                url: url.to_string(),
                natural_size: asset.natural_size,
            },
            None => ResolvedUrl::Failed,
        }
    }

    /// Hold the overlay hidden until `operation` settles.
    pub fn register_pending<F>(&self, operation: F)
    where
        F: Future + 'static,
    {
        self.overlay.register_pending(operation);
    }
}

/// A live element instance owned by a layer node.
pub trait Element: Any {
    /// Apply one kind-specific property.
    ///
    /// `None` when the element has no such property.
    fn set_prop(&mut self, name: &str, value: &Value, cx: &mut ElementCx<'_>)
        -> Option<Result<Dirty, PropError>>;

    fn get_prop(&self, name: &str) -> Option<Value>;

    /// A bound asset reference resolved again after the overlay's assets
    /// changed.
    fn asset_resolved(&mut self, _name: &str, _url: ResolvedUrl, _cx: &mut ElementCx<'_>) -> Dirty {
        Dirty::empty()
    }

    /// Intrinsic size of the displayed content, when known.
    fn natural_size(&self) -> Option<(u32, u32)> {
        None
    }

    /// Release everything the element created.
    fn teardown(&mut self) {}

    fn as_any(&self) -> &dyn Any;
}

pub type ElementConstructor = fn() -> Box<dyn Element>;

/// Registry entry for one element kind.
pub struct ElementSpec {
    kind: String,
    tag: String,
    props: Vec<String>,
    defaults: serde_json::Map<String, Value>,
    construct: ElementConstructor,
}

impl ElementSpec {
    /// A kind accepting the common properties only.
    pub fn new(kind: impl Into<String>, tag: impl Into<String>, construct: ElementConstructor) -> Self {
        Self {
            kind: kind.into(),
            tag: tag.into(),
            props: CommonProps::prop_names().iter().map(|name| name.to_string()).collect(),
            defaults: serde_json::Map::new(),
            construct,
        }
    }

    /// Accept additional kind-specific properties.
    pub fn with_props(mut self, names: &[&str]) -> Self {
        for name in names {
            if !self.allows(name) {
                self.props.push(name.to_string());
            }
        }
        self
    }

    pub fn with_default(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.defaults.insert(name.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Constructor tag of the live node, e.g. `strata-image`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn allows(&self, name: &str) -> bool {
        self.props.iter().any(|prop| prop == name)
    }

    pub fn props(&self) -> &[String] {
        &self.props
    }

    pub fn defaults(&self) -> &serde_json::Map<String, Value> {
        &self.defaults
    }

    pub fn construct(&self) -> Box<dyn Element> {
        (self.construct)()
    }
}

/// Element kinds known to the renderer.
#[derive(Default)]
pub struct ElementRegistry {
    kinds: HashMap<String, Rc<ElementSpec>>,
}

impl ElementRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalog: image, iframe, rectangle, text and video.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(
            ElementSpec::new("image", "strata-image", ImageElement::construct)
                .with_props(ImageProps::prop_names())
                .with_default("top", 0)
                .with_default("left", 0)
                .with_default("width", 400)
                .with_default("height", 400),
        );

        registry.register(
            ElementSpec::new("iframe", "strata-iframe", IframeElement::construct)
                .with_props(IframeProps::prop_names()),
        );

        registry.register(
            ElementSpec::new("rectangle", "strata-rectangle", RectangleElement::construct)
                .with_default("top", 0)
                .with_default("left", 0)
                .with_default("width", 640)
                .with_default("height", 360)
                .with_default("backgroundColor", "#FF0000"),
        );

        registry.register(
            ElementSpec::new("text", "strata-text", TextElement::construct)
                .with_props(TextProps::prop_names())
                .with_default("top", 0)
                .with_default("left", 0)
                .with_default("width", 400)
                .with_default("height", 400)
                .with_default("text", "text")
                .with_default("fontFamily", "Arial")
                .with_default("fontSize", "60px")
                .with_default("color", "rgba(255,255,255,1)")
                .with_default("whiteSpace", "pre"),
        );

        registry.register(
            ElementSpec::new("video", "strata-video", VideoElement::construct)
                .with_props(VideoProps::prop_names())
                .with_default("top", 0)
                .with_default("left", 0)
                .with_default("width", 1280)
                .with_default("height", 720)
                .with_default("volume", 100)
                .with_default("playing", true)
                .with_default("loop", false),
        );

        registry
    }

    /// Add or replace a kind.
    pub fn register(&mut self, spec: ElementSpec) {
        if self.kinds.contains_key(spec.kind()) {
            log::debug!("Replacing element kind '{}'", spec.kind());
        }
        self.kinds.insert(spec.kind().to_string(), Rc::new(spec));
    }

    pub fn get(&self, kind: &str) -> Option<&Rc<ElementSpec>> {
        self.kinds.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}
