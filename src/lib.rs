//! Strata renders declarative overlay scenes into a live node tree.
//!
//! A [`Scene`] is an ordered list of overlays, each holding positioned
//! layers (images, video, text, rectangles, frames), the assets those layers
//! reference, and opaque scripts. Handing a scene to a [`Renderer`]
//! reconciles the live tree with it: nodes are matched by id, skipped when
//! their data object is unchanged, updated in place otherwise, moved, created
//! or removed. Every overlay loads its assets in the background and stays
//! hidden until its readiness gate has seen every preload settle.
//!
//! Everything runs on one thread. Async work is spawned on the current
//! `tokio::task::LocalSet`.

// The Props derive refers to this crate by name
extern crate self as strata;

pub mod assets;
pub mod config;
pub mod elements;
pub mod error;
pub mod events;
pub mod frame;
pub mod gate;
pub mod layer;
pub mod overlay;
pub mod projector;
pub mod reconcile;
pub mod renderer;
pub mod scene;
pub mod scripting;
pub mod tree;

pub use config::RendererConfig;
pub use error::{StrataError, StrataResult};
pub use renderer::{Renderer, RendererBuilder};
pub use scene::{LayerData, OverlayData, Scene};
pub use strata_macros::Props;

pub mod prelude {
    pub use crate::assets::{AssetDescriptor, AssetMap, AssetStore, LoadedAsset};
    pub use crate::elements::{ElementRegistry, ElementSpec, Props};
    pub use crate::events::{SceneEvent, Subscription};
    pub use crate::projector::RenderStats;
    pub use crate::reconcile::MergeStats;
    pub use crate::tree::{Dirty, NodeId, SceneTree};
    pub use crate::{LayerData, OverlayData, Renderer, RendererConfig, Scene};
}
