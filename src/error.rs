//! Error taxonomy for the renderer.
//!
//! Only structural precondition violations surface as `Err` from public
//! operations. Everything else (failed fetches, unknown kinds, rejected
//! properties, script misuse) is logged where it is detected and contained.

use thiserror::Error;

use crate::tree::NodeId;

/// Structural and integration failures.
#[derive(Debug, Error)]
pub enum StrataError {
    /// A layer node was constructed under a parent that is not an overlay.
    #[error("layer nodes must be created under an overlay node (parent {parent:?} is not an overlay)")]
    LayerOutsideOverlay { parent: NodeId },

    /// The parent node no longer exists in the tree.
    #[error("node {0:?} is not registered in the scene tree")]
    StaleNode(NodeId),

    /// A layer item did not declare an element kind.
    #[error("layer '{layer}' has no elementKind specified")]
    MissingElementKind { layer: String },

    /// A layer item declared an element kind the registry does not know.
    #[error("could not resolve element kind '{kind}'")]
    UnknownElementKind { kind: String },

    #[error("failed to parse scene description: {0}")]
    Scene(#[from] serde_json::Error),
}

/// Failure to fetch the bytes of one asset.
///
/// Recorded on the [`LoadedAsset`](crate::assets::LoadedAsset) it belongs to,
/// never propagated out of a batch.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("unsupported asset source scheme in '{0}'")]
    UnsupportedScheme(String),

    #[error("failed to read '{src}': {message}")]
    Io { src: String, message: String },

    #[error("asset source '{0}' not found")]
    NotFound(String),

    #[error("transfer of '{src}' did not complete: {message}")]
    Aborted { src: String, message: String },
}

/// Failure to release a local resource handle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error("local handle '{0}' is unknown or was already released")]
    Unknown(String),
}

/// A declared layer property that could not be applied.
#[derive(Debug, Error)]
pub enum PropError {
    #[error("property '{name}' is not supported by element kind '{kind}'")]
    NotAllowed { name: String, kind: String },

    #[error("invalid value for property '{name}': {message}")]
    Invalid { name: String, message: String },
}

pub type StrataResult<T> = Result<T, StrataError>;
