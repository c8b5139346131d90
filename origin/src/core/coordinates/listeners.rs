//! Registry of dependents that react to origin shifts

use glam::Vec3;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Anything that must recompute anchor-relative state after a shift
pub trait OriginListener {
    /// Called with the anchor's new world position
    fn on_origin_shifted(&mut self, anchor_position: Vec3);
}

/// Shared handle to a listener; identity is the allocation
pub type SharedListener = Rc<RefCell<dyn OriginListener>>;

/// Set of listeners keyed by identity
///
/// Removal swaps in the last entry, so notification order is not stable.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<SharedListener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_of(&self, listener: &SharedListener) -> Option<usize> {
        self.listeners.iter().position(|l| Rc::ptr_eq(l, listener))
    }

    /// Add `listener` if absent and notify it of the current anchor at once
    ///
    /// The synthetic notification is sent even when the listener was already
    /// registered, so a re-activated dependent is never stale.
    pub fn subscribe(&mut self, listener: SharedListener, anchor_position: Vec3) {
        if self.index_of(&listener).is_none() {
            self.listeners.push(Rc::clone(&listener));
            trace!(count = self.listeners.len(), "Listener subscribed");
        }
        listener.borrow_mut().on_origin_shifted(anchor_position);
    }

    /// Remove `listener` if present
    pub fn unsubscribe(&mut self, listener: &SharedListener) {
        if let Some(index) = self.index_of(listener) {
            self.listeners.swap_remove(index);
            trace!(count = self.listeners.len(), "Listener unsubscribed");
        }
    }

    pub fn contains(&self, listener: &SharedListener) -> bool {
        self.index_of(listener).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notify every listener of the new anchor position
    pub fn notify(&self, anchor_position: Vec3) {
        for listener in &self.listeners {
            listener.borrow_mut().on_origin_shifted(anchor_position);
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("count", &self.listeners.len())
            .finish()
    }
}
