//! Render Worker - owns the renderer on the background thread
//!
//! Units are handled strictly one after another, in arrival order: the
//! renderer is not reentrant, so the next unit starts only after the
//! previous `render` returned.
//!
//! Renderer lifecycle:
//!
//! ```text
//! Uninitialized ──first compile──► Base ──extended glyphs──► Upgraded
//!        │                           │
//!        └──────── init error ───────┴──► Failed (every later unit fails)
//! ```
//!
//! A document needing extended glyphs as the very first unit goes straight
//! to `Upgraded` with a single construction.

pub mod glyphs;


use std::sync::Arc;

use crossbeam::channel::Receiver;
use tokio::sync::mpsc::UnboundedSender;

use crate::bridge::protocol::{CompileRequest, WorkerReply, WorkerRequest};
use crate::renderer::{RenderOptions, Renderer, RendererFactory, ResourceConfig, ResourceSet};

pub use glyphs::needs_extended_glyphs;

/// Everything a worker needs besides its factory.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Virtual path the primary source is registered under
    pub entry: String,
    pub resources: ResourceConfig,
    pub options: RenderOptions,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            entry: "main.typ".into(),
            resources: ResourceConfig::default(),
            options: RenderOptions::default(),
        }
    }
}

/// Which resource set the current renderer was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    Uninitialized,
    Base,
    Upgraded,
    /// Construction failed; the message is replayed to every later unit.
    Failed(String),
}

pub struct RenderWorker {
    factory: Arc<dyn RendererFactory>,
    config: WorkerConfig,
    state: ResourceState,
    renderer: Option<Box<dyn Renderer>>,
}

impl RenderWorker {
    pub fn new(factory: Arc<dyn RendererFactory>, config: WorkerConfig) -> Self {
        Self {
            factory,
            config,
            state: ResourceState::Uninitialized,
            renderer: None,
        }
    }

    pub fn state(&self) -> &ResourceState {
        &self.state
    }

    /// Serve requests until the bridge hangs up.
    pub fn run(mut self, requests: Receiver<WorkerRequest>, replies: UnboundedSender<WorkerReply>) {
        crate::debug!("worker"; "started");

        for request in requests.iter() {
            match request {
                WorkerRequest::Warmup => {
                    if let Err(message) = self.renderer() {
                        crate::log!("worker"; "warmup failed: {}", message);
                    }
                }
                WorkerRequest::Compile(request) => {
                    let reply = self.handle(request);
                    if replies.send(reply).is_err() {
                        break;
                    }
                }
            }
        }

        crate::debug!("worker"; "stopped");
    }

    /// Process one compile unit to completion.
    pub fn handle(&mut self, request: CompileRequest) -> WorkerReply {
        let id = request.correlation_id;

        if needs_extended_glyphs(&request.primary_source)
            && let Err(message) = self.upgrade()
        {
            return WorkerReply::init_failed(id, message);
        }

        let entry = self.config.entry.clone();
        let options = self.config.options.clone();
        let renderer = match self.renderer() {
            Ok(renderer) => renderer,
            Err(message) => return WorkerReply::init_failed(id, message),
        };

        renderer.reset();
        if let Err(e) = renderer.register_source(&entry, &request.primary_source) {
            return WorkerReply::failure(id, format!("{entry}: {e}"), Vec::new());
        }
        for (name, bytes) in &request.auxiliary_assets {
            if let Err(e) = renderer.register_asset(name, bytes) {
                return WorkerReply::failure(id, format!("{name}: {e}"), Vec::new());
            }
        }

        let output = renderer.render(&entry, &options);
        match output.artifact {
            Some(artifact) => WorkerReply::success(id, artifact, output.diagnostics),
            None => {
                let message = if output.diagnostics.is_empty() {
                    "render produced no output".to_string()
                } else {
                    output.diagnostics.join("\n")
                };
                WorkerReply::failure(id, message, output.diagnostics)
            }
        }
    }

    /// The renderer, constructing it with the base set on first use.
    fn renderer(&mut self) -> Result<&mut (dyn Renderer + 'static), String> {
        if let ResourceState::Failed(message) = &self.state {
            return Err(message.clone());
        }
        if self.renderer.is_none() {
            self.install(self.config.resources.base_set(), ResourceState::Base)?;
        }
        match self.renderer.as_deref_mut() {
            Some(renderer) => Ok(renderer),
            None => Err("renderer unavailable".to_string()),
        }
    }

    /// Switch to the extended resource set. At most once per worker.
    fn upgrade(&mut self) -> Result<(), String> {
        match &self.state {
            ResourceState::Upgraded => return Ok(()),
            ResourceState::Failed(message) => return Err(message.clone()),
            ResourceState::Uninitialized | ResourceState::Base => {}
        }

        crate::log!("worker"; "loading extended fonts for wider glyph coverage");
        self.install(self.config.resources.upgraded_set(), ResourceState::Upgraded)
    }

    fn install(&mut self, resources: ResourceSet, next: ResourceState) -> Result<(), String> {
        match self.factory.init(&resources) {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.state = next;
                crate::debug!("worker"; "renderer ready ({:?})", self.state);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                crate::log!("worker"; "renderer initialization failed: {}", message);
                self.renderer = None;
                self.state = ResourceState::Failed(message.clone());
                Err(message)
            }
        }
    }
}
