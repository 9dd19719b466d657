//! Compile Coordinator - the sequencing authority
//!
//! Every `compile()` takes the next sequence number. When its reply comes
//! back, the reply counts only if no newer compile was issued meanwhile;
//! otherwise it is stale and dropped without touching status, artifact or
//! listeners. This is the only supersession mechanism: the in-flight unit
//! is never aborted, its result is simply ignored.
//!
//! ```text
//! compile(src) ─► seq += 1, status = compiling ─► Bridge::invoke
//!                                                    │
//!   seq == latest ? ──no──► CompileOutcome::stale()  ◄┘
//!        │yes
//!        ├─ success: replace artifact, status = done, on_success
//!        ├─ failure: status = error, on_error (artifact kept)
//!        └─ init failure: status = error, on_error, Err(RendererInit)
//! ```

mod artifact;
mod listeners;
mod status;


use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, ReentrantMutex};

use crate::bridge::Bridge;
use crate::bridge::protocol::{Assets, WorkerReply};
use crate::error::CompileError;
use crate::renderer::RendererFactory;
use crate::worker::WorkerConfig;
use artifact::ArtifactSlot;
use listeners::ListenerSet;

pub use artifact::ArtifactHandle;
pub use listeners::{CompileListener, Subscription};
pub use status::{CompileOutcome, CompileStatus};

/// Handle to a coordinator. Clones share the same state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    /// `None` once disposed
    bridge: ArcSwapOption<Bridge>,
    launcher: Option<Launcher>,
    sequence: AtomicU64,
    /// Status and artifact change together, under one lock
    state: Mutex<State>,
    /// Held from a state change until its notices are out, so listeners
    /// observe changes in the order they happened. Taken before `state`;
    /// reentrant because listeners may compile from a callback.
    delivery: ReentrantMutex<()>,
    listeners: ListenerSet,
    disposed: AtomicBool,
}

#[derive(Default)]
struct State {
    status: CompileStatus,
    artifact: ArtifactSlot,
}

/// Knows how to start a fresh worker after a fatal failure.
struct Launcher {
    factory: Arc<dyn RendererFactory>,
    config: WorkerConfig,
}

impl Launcher {
    fn launch(&self) -> Result<Bridge, CompileError> {
        Bridge::spawn(Arc::clone(&self.factory), self.config.clone())
            .map_err(|e| CompileError::WorkerSpawn(e.to_string()))
    }
}

enum Notice {
    Status(CompileStatus),
    Success(Arc<Vec<u8>>, ArtifactHandle),
    Error(String),
}

impl Coordinator {
    /// Coordinate an existing bridge. `restart()` is unavailable.
    pub fn new(bridge: Bridge) -> Self {
        Self::with_parts(bridge, None)
    }

    /// Launch a render worker and coordinate it.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(
        factory: Arc<dyn RendererFactory>,
        config: WorkerConfig,
    ) -> Result<Self, CompileError> {
        let launcher = Launcher { factory, config };
        let bridge = launcher.launch()?;
        Ok(Self::with_parts(bridge, Some(launcher)))
    }

    fn with_parts(bridge: Bridge, launcher: Option<Launcher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                bridge: ArcSwapOption::from_pointee(bridge),
                launcher,
                sequence: AtomicU64::new(0),
                state: Mutex::new(State::default()),
                delivery: ReentrantMutex::new(()),
                listeners: ListenerSet::default(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Compile `source` with no auxiliary assets.
    ///
    /// The sequence number is taken and `compiling` is emitted before this
    /// returns. The reply is handled by a background task whether or not
    /// the returned future is polled; the future only reports the outcome.
    pub fn compile<S: Into<String>>(
        &self,
        source: S,
    ) -> impl Future<Output = Result<CompileOutcome, CompileError>> + Send + use<S> {
        self.compile_with_assets(source, Assets::new())
    }

    pub fn compile_with_assets<S: Into<String>>(
        &self,
        source: S,
        assets: Assets,
    ) -> impl Future<Output = Result<CompileOutcome, CompileError>> + Send + use<S> {
        let inner = Arc::clone(&self.inner);
        let settled = inner.begin().map(move |(seq, bridge)| {
            let reply = bridge.invoke(source.into(), assets);
            tokio::spawn(async move { inner.finish(seq, reply.await) })
        });

        async move {
            // Dropping the handle detaches the task; it still settles.
            settled?.await.unwrap_or(Err(CompileError::WorkerGone))
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn CompileListener>) -> Subscription {
        self.inner.listeners.add(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub fn status(&self) -> CompileStatus {
        self.inner.state.lock().status
    }

    /// Sequence number of the latest compile.
    pub fn sequence(&self) -> u64 {
        self.inner.sequence.load(Ordering::SeqCst)
    }

    pub fn active_artifact(&self) -> Option<ArtifactHandle> {
        self.inner.state.lock().artifact.handle()
    }

    /// Bytes behind `handle`, if it is still the active artifact.
    pub fn resolve(&self, handle: &ArtifactHandle) -> Option<Arc<Vec<u8>>> {
        self.inner.state.lock().artifact.resolve(handle)
    }

    /// Build the renderer before the first compile needs it.
    pub fn warmup(&self) {
        if let Some(bridge) = self.inner.bridge.load_full() {
            bridge.warmup();
        }
    }

    /// Replace the render worker with a fresh one. Listeners, status and the
    /// active artifact are kept.
    pub fn restart(&self) -> Result<(), CompileError> {
        let current = self.inner.bridge.load_full();
        self.replace_bridge(current).map(|_| ())
    }

    /// Restart only if the current worker reported a renderer failure.
    ///
    /// Safe to call once per fatal reply: when several arrive together,
    /// one call replaces the failed worker and the rest return `Ok(false)`.
    pub fn recover(&self) -> Result<bool, CompileError> {
        match self.inner.bridge.load_full() {
            Some(current) if current.is_failed() => self.replace_bridge(Some(current)),
            Some(_) => Ok(false),
            None => Err(CompileError::CoordinatorDisposed),
        }
    }

    /// Swap in a fresh worker if `expected` is still the live bridge.
    fn replace_bridge(&self, expected: Option<Arc<Bridge>>) -> Result<bool, CompileError> {
        if self.is_disposed() {
            return Err(CompileError::CoordinatorDisposed);
        }
        let launcher = self
            .inner
            .launcher
            .as_ref()
            .ok_or_else(|| CompileError::WorkerSpawn("no worker launcher configured".into()))?;

        let fresh = Arc::new(launcher.launch()?);
        let previous = self
            .inner
            .bridge
            .compare_and_swap(&expected, Some(Arc::clone(&fresh)));
        if !same_bridge(&*previous, &expected) {
            crate::debug!("compile"; "render worker already replaced");
            fresh.dispose();
            return Ok(false);
        }
        if let Some(old) = expected {
            old.dispose();
        }
        // Lost a race with dispose(): do not leave a live worker behind.
        if self.is_disposed()
            && let Some(bridge) = self.inner.bridge.swap(None)
        {
            bridge.dispose();
            return Err(CompileError::CoordinatorDisposed);
        }

        crate::log!("compile"; "render worker restarted");
        Ok(true)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Release the bridge, the active artifact and every listener.
    /// Later `compile()` calls fail with `CoordinatorDisposed`.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(bridge) = self.inner.bridge.swap(None) {
            bridge.dispose();
        }
        self.inner.state.lock().artifact.release();
        self.inner.listeners.clear();
    }
}

impl Inner {
    fn begin(&self) -> Result<(u64, Arc<Bridge>), CompileError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CompileError::CoordinatorDisposed);
        }
        let bridge = self
            .bridge
            .load_full()
            .ok_or(CompileError::CoordinatorDisposed)?;

        let _delivery = self.delivery.lock();
        let seq = {
            let mut state = self.state.lock();
            state.status = CompileStatus::Compiling;
            self.sequence.fetch_add(1, Ordering::SeqCst) + 1
        };
        crate::debug!("compile"; "request #{}", seq);
        self.notify(vec![Notice::Status(CompileStatus::Compiling)]);

        Ok((seq, bridge))
    }

    fn finish(
        &self,
        seq: u64,
        reply: Result<WorkerReply, CompileError>,
    ) -> Result<CompileOutcome, CompileError> {
        let _delivery = self.delivery.lock();
        let mut state = self.state.lock();

        let latest = self.sequence.load(Ordering::SeqCst);
        if seq != latest {
            drop(state);
            crate::debug!("compile"; "discarding stale result #{} (latest #{})", seq, latest);
            return Ok(CompileOutcome::stale());
        }
        if self.disposed.load(Ordering::SeqCst) {
            return Ok(CompileOutcome::failed(
                CompileError::ClientDisposed.to_string(),
                Vec::new(),
            ));
        }

        let (result, notices) = match reply {
            Ok(WorkerReply {
                ok: true,
                artifact: Some(bytes),
                diagnostics,
                ..
            }) => {
                let (handle, bytes) = state.artifact.replace(bytes);
                state.status = CompileStatus::Done;
                (
                    Ok(CompileOutcome::done(handle.clone(), diagnostics)),
                    vec![
                        Notice::Status(CompileStatus::Done),
                        Notice::Success(bytes, handle),
                    ],
                )
            }
            Ok(WorkerReply {
                fatal: true,
                message,
                ..
            }) => {
                let error = CompileError::RendererInit(message.unwrap_or_default());
                state.status = CompileStatus::Error;
                let notices = vec![
                    Notice::Status(CompileStatus::Error),
                    Notice::Error(error.to_string()),
                ];
                (Err(error), notices)
            }
            Ok(reply) => {
                let message = reply
                    .message
                    .unwrap_or_else(|| "render produced no output".to_string());
                state.status = CompileStatus::Error;
                (
                    Ok(CompileOutcome::failed(message.clone(), reply.diagnostics)),
                    vec![Notice::Status(CompileStatus::Error), Notice::Error(message)],
                )
            }
            Err(error) => {
                let message = error.to_string();
                state.status = CompileStatus::Error;
                (
                    Ok(CompileOutcome::failed(message.clone(), Vec::new())),
                    vec![Notice::Status(CompileStatus::Error), Notice::Error(message)],
                )
            }
        };
        drop(state);

        self.notify(notices);
        result
    }

    /// Fan out outside every lock: listeners may call back into the coordinator.
    fn notify(&self, notices: Vec<Notice>) {
        let listeners = self.listeners.snapshot();
        if listeners.is_empty() {
            return;
        }
        for notice in &notices {
            for listener in &listeners {
                match notice {
                    Notice::Status(status) => listener.on_status_change(*status),
                    Notice::Success(bytes, handle) => listener.on_success(bytes, handle),
                    Notice::Error(message) => listener.on_error(message),
                }
            }
        }
    }
}

fn same_bridge(a: &Option<Arc<Bridge>>, b: &Option<Arc<Bridge>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
