//! Locally-addressable resource handles for fetched asset bytes.
//!
//! A handle is a URL-like string (`blob:strata/<n>`) that stands in for the
//! fetched bytes so layer properties can point at it like any other URL.
//! Handles must be released explicitly; releasing twice is harmless.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::HandleError;

const HANDLE_PREFIX: &str = "blob:strata/";

/// A revocable local URL for a blob of bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LocalHandle(Rc<str>);

impl LocalHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalHandle({})", self.0)
    }
}

impl fmt::Display for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource-handle lifecycle collaborator.
pub trait ResourceHandles {
    /// Take ownership of `bytes` and return a handle addressing them.
    fn create_local_handle(&self, bytes: Rc<[u8]>) -> LocalHandle;

    /// Revoke a handle. Unknown or already released handles report an error
    /// and change nothing.
    fn release_local_handle(&self, handle: &LocalHandle) -> Result<(), HandleError>;

    /// Bytes behind a live handle.
    fn resolve(&self, handle: &LocalHandle) -> Option<Rc<[u8]>>;
}

/// In-memory handle registry.
#[derive(Default)]
pub struct BlobRegistry {
    next_id: Cell<u64>,
    blobs: RefCell<HashMap<LocalHandle, Rc<[u8]>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles currently alive.
    pub fn live_count(&self) -> usize {
        self.blobs.borrow().len()
    }
}

impl ResourceHandles for BlobRegistry {
    fn create_local_handle(&self, bytes: Rc<[u8]>) -> LocalHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let handle = LocalHandle(Rc::from(format!("{HANDLE_PREFIX}{id}")));
        self.blobs.borrow_mut().insert(handle.clone(), bytes);
        handle
    }

    fn release_local_handle(&self, handle: &LocalHandle) -> Result<(), HandleError> {
        self.blobs
            .borrow_mut()
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| HandleError::Unknown(handle.to_string()))
    }

    fn resolve(&self, handle: &LocalHandle) -> Option<Rc<[u8]>> {
        self.blobs.borrow().get(handle).cloned()
    }
}
