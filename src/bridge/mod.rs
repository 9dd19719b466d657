//! Bridge - request/reply multiplexer to the render worker
//!
//! ```text
//! invoke() ──► PendingTable.insert(id) ──► requests ──► RenderWorker (thread)
//!                                                           │
//! caller ◄── resolver(id) ◄── reply pump (tokio task) ◄── replies
//! ```
//!
//! Replies are matched by correlation id, never by arrival order. The
//! bridge does not cancel anything: an obsolete request still runs, and
//! deciding what is stale is the coordinator's business.

mod pending;
pub mod protocol;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::CompileError;
use crate::renderer::RendererFactory;
use crate::worker::{RenderWorker, WorkerConfig};
use pending::PendingTable;
use protocol::{Assets, CompileRequest, CorrelationId, WorkerReply, WorkerRequest};

/// Client side of the worker boundary.
pub struct Bridge {
    next_id: AtomicU64,
    pending: Arc<PendingTable>,
    /// Set once the worker reports its renderer cannot be built
    failed: Arc<AtomicBool>,
    /// `None` once disposed
    requests: Mutex<Option<Sender<WorkerRequest>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl Bridge {
    /// Launch a render worker on its own thread and connect to it.
    ///
    /// Must be called within a tokio runtime (the reply pump is a task).
    pub fn spawn(
        factory: Arc<dyn RendererFactory>,
        config: WorkerConfig,
    ) -> std::io::Result<Self> {
        let (request_tx, request_rx) = crossbeam::channel::unbounded();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        // The renderer is built on, and never leaves, the worker thread.
        let handle = std::thread::Builder::new()
            .name("typlive-worker".into())
            .spawn(move || RenderWorker::new(factory, config).run(request_rx, reply_tx))?;

        let bridge = Self::connect(request_tx, reply_rx);
        *bridge.worker.lock() = Some(handle);
        Ok(bridge)
    }

    /// Connect to an already running worker through its channels.
    pub fn connect(
        requests: Sender<WorkerRequest>,
        replies: mpsc::UnboundedReceiver<WorkerReply>,
    ) -> Self {
        let pending = Arc::new(PendingTable::default());
        let failed = Arc::new(AtomicBool::new(false));
        let pump = tokio::spawn(pump_replies(
            Arc::clone(&pending),
            Arc::clone(&failed),
            replies,
        ));

        Self {
            next_id: AtomicU64::new(1),
            pending,
            failed,
            requests: Mutex::new(Some(requests)),
            pump: Mutex::new(Some(pump)),
            worker: Mutex::new(None),
        }
    }

    /// Send a compile request. The request is registered and sent before
    /// this returns; the future only waits for the matching reply.
    pub fn invoke(
        &self,
        source: String,
        assets: Assets,
    ) -> impl Future<Output = Result<WorkerReply, CompileError>> + Send + use<> {
        let (tx, rx) = oneshot::channel();
        let sent = self.send(tx, source, assets);

        async move {
            sent?;
            rx.await.unwrap_or(Err(CompileError::WorkerGone))
        }
    }

    fn send(
        &self,
        resolver: pending::Resolver,
        source: String,
        assets: Assets,
    ) -> Result<CorrelationId, CompileError> {
        let requests = self.requests.lock();
        let Some(requests) = requests.as_ref() else {
            return Err(CompileError::ClientDisposed);
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.insert(id, resolver);

        let request = WorkerRequest::Compile(CompileRequest {
            correlation_id: id,
            primary_source: source,
            auxiliary_assets: assets,
        });
        if requests.send(request).is_err() {
            self.pending.remove(id);
            return Err(CompileError::WorkerGone);
        }

        crate::debug!("bridge"; "sent request #{}", id);
        Ok(id)
    }

    /// Ask the worker to build its renderer now. No reply.
    pub fn warmup(&self) {
        if let Some(requests) = self.requests.lock().as_ref() {
            let _ = requests.send(WorkerRequest::Warmup);
        }
    }

    /// Requests still waiting for a reply.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the worker has answered with a fatal reply.
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.requests.lock().is_none()
    }

    /// Reject everything pending and shut the worker down.
    ///
    /// Closing the request channel ends the worker loop after its current
    /// unit; the thread is detached rather than joined, since a hung render
    /// would otherwise hang the caller.
    pub fn dispose(&self) {
        let Some(requests) = self.requests.lock().take() else {
            return;
        };
        drop(requests);

        let rejected = self.pending.fail_all(CompileError::ClientDisposed);
        if rejected > 0 {
            crate::debug!("bridge"; "disposed with {} pending request(s)", rejected);
        }

        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        if let Some(worker) = self.worker.lock().take() {
            drop(worker);
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Route worker replies to their pending entries until the worker hangs up.
async fn pump_replies(
    pending: Arc<PendingTable>,
    failed: Arc<AtomicBool>,
    mut replies: mpsc::UnboundedReceiver<WorkerReply>,
) {
    while let Some(reply) = replies.recv().await {
        if reply.fatal {
            failed.store(true, Ordering::SeqCst);
        }
        pending.resolve(reply);
    }

    let orphaned = pending.fail_all(CompileError::WorkerGone);
    if orphaned > 0 {
        crate::log!("bridge"; "worker exited with {} request(s) unanswered", orphaned);
    }
}
