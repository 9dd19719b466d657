//! Observer list with disposer tokens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::artifact::ArtifactHandle;
use super::status::CompileStatus;

/// Receives coordinator notifications. All methods default to no-ops.
pub trait CompileListener: Send + Sync {
    fn on_status_change(&self, _status: CompileStatus) {}

    fn on_success(&self, _artifact: &[u8], _handle: &ArtifactHandle) {}

    fn on_error(&self, _message: &str) {}
}

type Entry = (u64, Arc<dyn CompileListener>);

#[derive(Default)]
struct Registry {
    entries: Vec<Entry>,
    next_id: u64,
}

#[derive(Default)]
pub(super) struct ListenerSet {
    registry: Arc<Mutex<Registry>>,
}

impl ListenerSet {
    pub(super) fn add(&self, listener: Arc<dyn CompileListener>) -> Subscription {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.entries.push((id, listener));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            active: AtomicBool::new(true),
        }
    }

    /// Copy of the current listeners, so callbacks run without the lock held.
    pub(super) fn snapshot(&self) -> Vec<Arc<dyn CompileListener>> {
        self.registry
            .lock()
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }

    pub(super) fn clear(&self) {
        self.registry.lock().entries.clear();
    }

    pub(super) fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }
}

/// Token returned by `add_listener`. `unsubscribe` removes exactly that
/// listener; calling it again does nothing.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
    active: AtomicBool,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
