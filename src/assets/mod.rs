//! Asset loading for overlays.
//!
//! An [`AssetStore`] turns a map of named [`AssetDescriptor`]s into
//! [`LoadedAsset`]s: each source is fetched independently, the bytes are
//! registered behind a local handle, and the resulting set replaces the
//! store's current one in a single step once every fetch has settled.
//!
//! ## Batches
//!
//! Every call to [`AssetStore::load`] starts a new batch and supersedes the
//! previous one. Superseding only flags the old batch as cancelled; its
//! fetches keep running in the background, and when they settle the batch
//! sees the flag and discards its results without touching the store or
//! emitting anything. At most one batch is active per store.
//!
//! A failing fetch never fails the batch. It produces a `LoadedAsset`
//! carrying the error, so a bad asset renders as an empty slot while the
//! rest of the scene proceeds.

mod fetch;
mod handles;
mod metadata;

pub use fetch::{is_remote, FetchFuture, Fetcher, FileFetcher, HttpFetcher, SchemeFetcher};
pub use handles::{BlobRegistry, LocalHandle, ResourceHandles};
pub use metadata::intrinsic_size;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::FetchError;
use crate::events::{Emitter, Subscription};

/// Prefix that marks a property value as a reference to an asset.
pub const ASSET_REF_PREFIX: char = '#';

/// Asset id for an asset key: the key prefixed with `#`, so a layer property
/// can hold either a URL or an asset reference in the same slot.
pub fn asset_id(key: &str) -> String {
    format!("{ASSET_REF_PREFIX}{key}")
}

/// Whether a property value refers to an asset rather than a URL.
pub fn is_asset_ref(value: &str) -> bool {
    value.starts_with(ASSET_REF_PREFIX)
}

/// Declared asset: a source plus free-form kind hints (`type`, `accept`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub src: String,
    #[serde(flatten)]
    pub hints: serde_json::Map<String, serde_json::Value>,
}

impl AssetDescriptor {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            hints: serde_json::Map::new(),
        }
    }

    pub fn with_hint(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.hints.insert(name.to_string(), value.into());
        self
    }
}

/// Asset descriptors keyed by asset key, in declaration order.
pub type AssetMap = IndexMap<String, AssetDescriptor>;

/// Result of loading one asset.
#[derive(Debug, Clone)]
pub enum AssetState {
    /// Bytes are available behind a local handle
    Ready(LocalHandle),
    /// The fetch failed
    Failed(FetchError),
}

/// A descriptor after its load attempt settled.
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    /// `#` + asset key
    pub id: String,
    pub descriptor: AssetDescriptor,
    pub state: AssetState,
    /// Natural size when the bytes are a raster image or SVG
    pub natural_size: Option<(u32, u32)>,
}

impl LoadedAsset {
    /// The local handle URL, if the load succeeded.
    pub fn object_url(&self) -> Option<&str> {
        match &self.state {
            AssetState::Ready(handle) => Some(handle.as_str()),
            AssetState::Failed(_) => None,
        }
    }

    pub fn handle(&self) -> Option<&LocalHandle> {
        match &self.state {
            AssetState::Ready(handle) => Some(handle),
            AssetState::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.state {
            AssetState::Ready(_) => None,
            AssetState::Failed(err) => Some(err),
        }
    }
}

/// How a batch ended.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// The batch was still active; its assets are now the store's set
    Applied(Rc<[LoadedAsset]>),
    /// A newer batch (or teardown) superseded it; nothing was applied
    Cancelled,
}

/// Emitted once per applied batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetsChanged {
    /// Sequence number of the batch that was applied
    pub batch: u64,
}

struct BatchShared {
    seq: u64,
    cancelled: Cell<bool>,
    outcome: watch::Sender<Option<BatchOutcome>>,
}

/// Handle to one in-flight or settled load batch.
#[derive(Clone)]
pub struct AssetBatch {
    shared: Rc<BatchShared>,
}

impl AssetBatch {
    fn new(seq: u64) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            shared: Rc::new(BatchShared {
                seq,
                cancelled: Cell::new(false),
                outcome,
            }),
        }
    }

    pub fn seq(&self) -> u64 {
        self.shared.seq
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.get()
    }

    pub fn is_settled(&self) -> bool {
        self.shared.outcome.borrow().is_some()
    }

    /// Flag the batch so its results are discarded when it settles.
    fn cancel(&self) {
        self.shared.cancelled.set(true);
    }

    fn settle(&self, outcome: BatchOutcome) {
        self.shared.outcome.send_replace(Some(outcome));
    }

    /// Wait until every fetch of the batch has settled.
    pub async fn settled(&self) -> BatchOutcome {
        let mut rx = self.shared.outcome.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or(BatchOutcome::Cancelled),
            Err(_) => BatchOutcome::Cancelled,
        };
        outcome
    }
}

struct StoreInner {
    fetcher: Rc<dyn Fetcher>,
    handles: Rc<dyn ResourceHandles>,
    loaded: RefCell<Option<Rc<[LoadedAsset]>>>,
    active: RefCell<Option<AssetBatch>>,
    next_seq: Cell<u64>,
    assets_changed: Emitter<AssetsChanged>,
}

impl StoreInner {
    /// Revoke every handle of the current set, best-effort.
    fn release_loaded(&self) {
        let Some(previous) = self.loaded.borrow_mut().take() else {
            return;
        };
        for handle in previous.iter().filter_map(LoadedAsset::handle) {
            if let Err(err) = self.handles.release_local_handle(handle) {
                log::warn!("Failed to release asset handle: {err}");
            }
        }
    }

    fn cancel_active(&self) {
        if let Some(batch) = self.active.borrow_mut().take() {
            if !batch.is_settled() {
                log::debug!("Cancelling asset batch {}", batch.seq());
                batch.cancel();
            }
        }
    }
}

/// Per-overlay asset loader. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct AssetStore {
    inner: Rc<StoreInner>,
}

impl AssetStore {
    pub fn new(fetcher: Rc<dyn Fetcher>, handles: Rc<dyn ResourceHandles>) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                fetcher,
                handles,
                loaded: RefCell::new(None),
                active: RefCell::new(None),
                next_seq: Cell::new(0),
                assets_changed: Emitter::new(),
            }),
        }
    }

    /// Start loading `descriptors`, superseding any previous batch.
    ///
    /// The current set is released right away. Must be called inside a
    /// `tokio::task::LocalSet`.
    pub fn load(&self, descriptors: &AssetMap) -> AssetBatch {
        self.inner.release_loaded();
        self.inner.cancel_active();

        let seq = self.inner.next_seq.get();
        self.inner.next_seq.set(seq + 1);
        let batch = AssetBatch::new(seq);
        *self.inner.active.borrow_mut() = Some(batch.clone());

        // Every fetch starts now and runs independently of the others
        let pending: Vec<_> = descriptors
            .iter()
            .map(|(key, descriptor)| {
                let id = asset_id(key);
                let descriptor = descriptor.clone();
                let fetch = self.inner.fetcher.fetch(&descriptor.src);
                async move { (id, descriptor, fetch.await) }
            })
            .collect();

        log::debug!("Asset batch {seq} started with {} assets", pending.len());

        let store = Rc::downgrade(&self.inner);
        let task_batch = batch.clone();
        tokio::task::spawn_local(async move {
            let results = futures::future::join_all(pending).await;
            complete_batch(store, task_batch, results);
        });

        batch
    }

    /// Look up a loaded asset by id (`#key`).
    pub fn find_asset(&self, id: &str) -> Option<LoadedAsset> {
        self.inner
            .loaded
            .borrow()
            .as_ref()
            .and_then(|assets| assets.iter().find(|asset| asset.id == id).cloned())
    }

    /// Whether a batch has completed and its set is current.
    pub fn assets_available(&self) -> bool {
        self.inner.loaded.borrow().is_some()
    }

    /// The current set, read-only.
    pub fn loaded(&self) -> Option<Rc<[LoadedAsset]>> {
        self.inner.loaded.borrow().clone()
    }

    /// The active batch, while it has not settled.
    pub fn pending_batch(&self) -> Option<AssetBatch> {
        self.inner
            .active
            .borrow()
            .as_ref()
            .filter(|batch| !batch.is_settled())
            .cloned()
    }

    /// Bytes behind a loaded asset's handle.
    pub fn resolve_bytes(&self, handle: &LocalHandle) -> Option<Rc<[u8]>> {
        self.inner.handles.resolve(handle)
    }

    /// Listen for applied batches.
    pub fn on_assets_changed(&self, listener: impl Fn(&AssetsChanged) + 'static) -> Subscription {
        self.inner.assets_changed.subscribe(listener)
    }

    /// Release every held handle and cancel the active batch.
    pub fn teardown(&self) {
        self.inner.cancel_active();
        self.inner.release_loaded();
    }
}

fn complete_batch(
    store: Weak<StoreInner>,
    batch: AssetBatch,
    results: Vec<(String, AssetDescriptor, Result<Vec<u8>, FetchError>)>,
) {
    let Some(store) = store.upgrade().filter(|_| !batch.is_cancelled()) else {
        log::debug!("Asset batch {} settled after being superseded", batch.seq());
        batch.settle(BatchOutcome::Cancelled);
        return;
    };

    let assets: Rc<[LoadedAsset]> = results
        .into_iter()
        .map(|(id, descriptor, result)| match result {
            Ok(bytes) => {
                let natural_size = intrinsic_size(&bytes);
                let handle = store.handles.create_local_handle(Rc::from(bytes));
                LoadedAsset {
                    id,
                    descriptor,
                    state: AssetState::Ready(handle),
                    natural_size,
                }
            }
            Err(err) => {
                log::error!("Failed to load asset {id}: {err}");
                LoadedAsset {
                    id,
                    descriptor,
                    state: AssetState::Failed(err),
                    natural_size: None,
                }
            }
        })
        .collect();

    *store.loaded.borrow_mut() = Some(Rc::clone(&assets));
    store.active.borrow_mut().take();

    log::debug!("Asset batch {} applied ({} assets)", batch.seq(), assets.len());

    // Listeners see the new set before anyone waiting on the batch resumes
    store.assets_changed.emit(&AssetsChanged { batch: batch.seq() });
    batch.settle(BatchOutcome::Applied(assets));
}
