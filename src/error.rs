//! Error types crossing the coordinator boundary.
//!
//! Render failures are not errors here: the document was wrong, the renderer
//! is fine, and the result travels as a failed `CompileOutcome`.

use thiserror::Error;

/// Failures of the compile machinery itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The bridge was disposed while the request was outstanding.
    #[error("client disposed")]
    ClientDisposed,

    /// `compile()` was called on a disposed coordinator.
    #[error("coordinator disposed")]
    CoordinatorDisposed,

    /// The render worker could not construct its renderer.
    /// Fatal to that worker instance; restart it instead of editing the document.
    #[error("renderer initialization failed: {0}")]
    RendererInit(String),

    /// The worker thread went away without answering.
    #[error("render worker exited")]
    WorkerGone,

    /// A new worker could not be launched.
    #[error("failed to launch render worker: {0}")]
    WorkerSpawn(String),
}
