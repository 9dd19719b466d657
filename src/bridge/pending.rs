use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;

use super::protocol::{CorrelationId, WorkerReply};
use crate::error::CompileError;

pub(super) type Resolver = oneshot::Sender<Result<WorkerReply, CompileError>>;

/// Correlation id → resolver of the caller awaiting that reply.
///
/// Every entry leaves the table exactly once: on its reply, or when the
/// table is drained.
#[derive(Default)]
pub(super) struct PendingTable {
    entries: Mutex<FxHashMap<CorrelationId, Resolver>>,
}

impl PendingTable {
    pub(super) fn insert(&self, id: CorrelationId, resolver: Resolver) {
        let previous = self.entries.lock().insert(id, resolver);
        debug_assert!(previous.is_none(), "correlation id {id} reused");
    }

    pub(super) fn remove(&self, id: CorrelationId) -> Option<Resolver> {
        self.entries.lock().remove(&id)
    }

    /// Resolve the entry matching the reply. Unmatched replies are dropped.
    pub(super) fn resolve(&self, reply: WorkerReply) -> bool {
        let id = reply.correlation_id;
        match self.remove(id) {
            Some(resolver) => {
                // Caller gave up waiting; nothing else to do.
                let _ = resolver.send(Ok(reply));
                true
            }
            None => {
                crate::debug!("bridge"; "dropping unmatched reply #{}", id);
                false
            }
        }
    }

    /// Settle every pending entry with `error`. Returns how many were waiting.
    pub(super) fn fail_all(&self, error: CompileError) -> usize {
        let drained: Vec<_> = self.entries.lock().drain().collect();
        let count = drained.len();
        for (_, resolver) in drained {
            let _ = resolver.send(Err(error.clone()));
        }
        count
    }

    pub(super) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
