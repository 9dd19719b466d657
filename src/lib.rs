//! typlive - live compile coordination for Typst documents
//!
//! ```text
//! edits ─► Coalescer ─► Coordinator ─► Bridge ═══► RenderWorker (own thread)
//!                          ▲            │  ◄═══ replies ═══╝
//!                          └── stale? ──┘
//! ```
//!
//! The editor side never blocks on rendering: it schedules compiles, the
//! coordinator numbers them, and only the reply to the latest request is
//! allowed to change status, artifact or listeners.

pub mod bridge;
pub mod coalesce;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logger;
pub mod renderer;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::Bridge;
pub use coalesce::Coalescer;
pub use coordinator::{
    ArtifactHandle, CompileListener, CompileOutcome, CompileStatus, Coordinator, Subscription,
};
pub use error::CompileError;
