//! Listener lists for the signals the renderer emits.
//!
//! An [`Emitter`] is a cheap, cloneable handle to a shared listener list.
//! Subscribing returns a [`Subscription`]; dropping it removes the listener,
//! the same way a disconnected node stops listening.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::tree::NodeId;

/// Signals the renderer emits about its overlays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    /// An asset batch of the overlay was applied and its layers re-resolved
    AssetsChanged { overlay: NodeId, key: String },
    /// The overlay's readiness gate resolved and the overlay became visible.
    /// Emitted once per overlay node.
    Loaded { overlay: NodeId, key: String },
}

impl SceneEvent {
    /// Id of the overlay the event is about.
    pub fn key(&self) -> &str {
        match self {
            SceneEvent::AssetsChanged { key, .. } | SceneEvent::Loaded { key, .. } => key,
        }
    }
}

type Listener<E> = Rc<dyn Fn(&E)>;

struct Listeners<E> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, Listener<E>)>>,
}

/// Shared list of listeners for events of type `E`.
pub struct Emitter<E> {
    inner: Rc<Listeners<E>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: 'static> Emitter<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Listeners {
                next_id: Cell::new(0),
                entries: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Register a listener. It stays registered while the subscription lives.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .entries
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let weak: Weak<Listeners<E>> = Rc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(listeners) = weak.upgrade() {
                    listeners.entries.borrow_mut().retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Call every listener registered at the time of the call.
    ///
    /// Listeners may subscribe or unsubscribe while being notified; the
    /// change applies from the next emission.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .inner
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.entries.borrow().len()
    }
}

impl<E: 'static> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a listener registered until dropped.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Keep the listener registered for the lifetime of the emitter.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_subscribers() {
        let emitter = Emitter::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let _sub = emitter.subscribe(move |value| sink.borrow_mut().push(*value));

        emitter.emit(&1);
        emitter.emit(&2);

        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_drop_subscription_unsubscribes() {
        let emitter = Emitter::<()>::new();
        let count = Rc::new(Cell::new(0));

        let counter = count.clone();
        let sub = emitter.subscribe(move |_| counter.set(counter.get() + 1));
        emitter.emit(&());
        drop(sub);
        emitter.emit(&());

        assert_eq!(count.get(), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_listener_can_subscribe_during_emit() {
        let emitter = Emitter::<()>::new();
        let nested = Rc::new(RefCell::new(Vec::new()));

        let inner_emitter = emitter.clone();
        let holder = nested.clone();
        let _sub = emitter.subscribe(move |_| {
            holder.borrow_mut().push(inner_emitter.subscribe(|_| {}));
        });

        emitter.emit(&());
        assert_eq!(emitter.listener_count(), 2);
    }
}
