//! The single live artifact.
//!
//! A handle is an opaque reference (with a URL form for presentation
//! layers). Resolving it yields bytes only while it is the active one;
//! replacing or releasing the artifact drops the slot's reference to the
//! previous bytes before the new handle exists.

use std::fmt;
use std::sync::Arc;

/// Externally referenceable name of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactHandle {
    id: u64,
}

impl ArtifactHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> String {
        format!("typlive://artifact/{}", self.id)
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "typlive://artifact/{}", self.id)
    }
}

struct ActiveArtifact {
    handle: ArtifactHandle,
    bytes: Arc<Vec<u8>>,
}

/// At most one live artifact. Callers serialize access (coordinator lock).
#[derive(Default)]
pub(super) struct ArtifactSlot {
    active: Option<ActiveArtifact>,
    next_id: u64,
}

impl ArtifactSlot {
    /// Release the current artifact, then install `bytes` as the new one.
    pub(super) fn replace(&mut self, bytes: Vec<u8>) -> (ArtifactHandle, Arc<Vec<u8>>) {
        self.release();

        self.next_id += 1;
        let handle = ArtifactHandle { id: self.next_id };
        let bytes = Arc::new(bytes);
        self.active = Some(ActiveArtifact {
            handle: handle.clone(),
            bytes: Arc::clone(&bytes),
        });
        (handle, bytes)
    }

    pub(super) fn release(&mut self) -> Option<ArtifactHandle> {
        let released = self.active.take()?;
        crate::debug!("compile"; "released {}", released.handle);
        Some(released.handle)
    }

    pub(super) fn handle(&self) -> Option<ArtifactHandle> {
        self.active.as_ref().map(|a| a.handle.clone())
    }

    pub(super) fn resolve(&self, handle: &ArtifactHandle) -> Option<Arc<Vec<u8>>> {
        self.active
            .as_ref()
            .filter(|a| a.handle == *handle)
            .map(|a| Arc::clone(&a.bytes))
    }
}
