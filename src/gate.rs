//! Readiness gate: hold an overlay hidden until its content has preloaded.
//!
//! The gate collects pending operations registered by descendants (embedded
//! players becoming interactive, fonts, ...) during a collection window that
//! closes at the next frame. Once the window has closed, it also waits for
//! the overlay's in-flight asset batch, then resolves exactly once.
//!
//! Registrations after the window has closed are not waited on. The window
//! is a stabilization period for preloads started while the overlay is
//! first built, not a strict barrier. A pending operation that never
//! settles keeps the gate unresolved forever.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use tokio::sync::Notify;

use crate::assets::AssetStore;
use crate::frame::FrameClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Collecting registrations until the next frame
    Collecting,
    /// Window closed, waiting for registered operations
    Waiting,
    Resolved,
}

struct GateInner {
    state: Cell<GateState>,
    outstanding: Cell<usize>,
    registered: Cell<usize>,
    notify: Notify,
    on_ready: RefCell<Option<Box<dyn FnOnce()>>>,
}

/// Single-shot gate over a growing set of pending operations.
#[derive(Clone)]
pub struct ReadinessGate {
    inner: Rc<GateInner>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(GateInner {
                state: Cell::new(GateState::Collecting),
                outstanding: Cell::new(0),
                registered: Cell::new(0),
                notify: Notify::new(),
                on_ready: RefCell::new(None),
            }),
        }
    }

    pub fn state(&self) -> GateState {
        self.inner.state.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.state() == GateState::Resolved
    }

    /// Number of operations the gate is (or was) waiting on.
    pub fn registered(&self) -> usize {
        self.inner.registered.get()
    }

    /// Register a pending operation. Its output, success or failure, is
    /// ignored; only its settlement matters.
    pub fn register_pending<F>(&self, operation: F)
    where
        F: Future + 'static,
    {
        if self.state() != GateState::Collecting {
            log::debug!("Preload registered after the collection window closed, not waiting on it");
            tokio::task::spawn_local(async move {
                operation.await;
            });
            return;
        }

        let inner = Rc::clone(&self.inner);
        inner.outstanding.set(inner.outstanding.get() + 1);
        inner.registered.set(inner.registered.get() + 1);

        tokio::task::spawn_local(async move {
            operation.await;
            inner.outstanding.set(inner.outstanding.get() - 1);
            inner.notify.notify_one();
        });
    }

    /// Open the collection window and resolve when everything has settled.
    ///
    /// `on_ready` runs once, on resolution. Must be called inside a
    /// `tokio::task::LocalSet`.
    pub fn start(&self, frames: &FrameClock, assets: &AssetStore, on_ready: impl FnOnce() + 'static) {
        *self.inner.on_ready.borrow_mut() = Some(Box::new(on_ready));

        let gate = self.clone();
        let next_frame = frames.next_frame();
        let assets = assets.clone();
        tokio::task::spawn_local(async move {
            // Let descendants register their preloads first
            next_frame.await;
            gate.inner.state.set(GateState::Waiting);

            while gate.inner.outstanding.get() > 0 {
                gate.inner.notify.notified().await;
            }

            // A batch superseded while waiting hands over to its successor
            while let Some(batch) = assets.pending_batch() {
                batch.settled().await;
            }

            gate.resolve();
        });
    }

    fn resolve(&self) {
        if self.is_resolved() {
            return;
        }
        self.inner.state.set(GateState::Resolved);
        log::debug!(
            "Readiness gate resolved after {} pending operations",
            self.registered()
        );

        let on_ready = self.inner.on_ready.borrow_mut().take();
        if let Some(on_ready) = on_ready {
            on_ready();
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}
