//! Renderer capability consumed by the render worker.
//!
//! The rendering engine is external. The worker only needs four things from
//! it: construct with a resource set, register named inputs, render an entry
//! point, and report diagnostics.
//!
//! ```text
//! RendererFactory::init(ResourceSet) ──► Box<dyn Renderer>
//!                                           │ reset
//!                                           │ register_source / register_asset
//!                                           └ render(entry) ──► RenderOutput
//! ```
//!
//! - [`typst`] - `typst` executable backend

pub mod typst;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use typst::TypstCli;

/// Renderer construction failure (resource fetch, missing executable...).
#[derive(Debug, Error)]
pub enum InitError {
    #[error("renderer executable `{0}` not found")]
    MissingExecutable(String),

    #[error("font directory `{}` does not exist", .0.display())]
    MissingFontDir(PathBuf),

    #[error("failed to prepare work directory")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// Builds renderers. Shared between worker instances across restarts.
pub trait RendererFactory: Send + Sync + 'static {
    fn init(&self, resources: &ResourceSet) -> Result<Box<dyn Renderer>, InitError>;
}

/// A constructed renderer. Not reentrant: one call at a time.
pub trait Renderer {
    /// Forget inputs registered by the previous unit.
    fn reset(&mut self) {}

    fn register_source(&mut self, path: &str, text: &str) -> io::Result<()>;

    fn register_asset(&mut self, path: &str, bytes: &[u8]) -> io::Result<()>;

    /// Render `entry`. `artifact` is `None` when the document failed;
    /// `diagnostics` may be non-empty either way.
    fn render(&mut self, entry: &str, options: &RenderOptions) -> RenderOutput;
}

/// Result of one `render` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    pub artifact: Option<Vec<u8>>,
    pub diagnostics: Vec<String>,
}

/// Artifact format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Png,
    Svg,
}

impl OutputFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub format: OutputFormat,
}

/// Font directories, split into the default set and the extension loaded
/// the first time a document needs wider glyph coverage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceConfig {
    pub base: Vec<PathBuf>,
    pub extended: Vec<PathBuf>,
}

impl ResourceConfig {
    pub fn base_set(&self) -> ResourceSet {
        ResourceSet {
            font_dirs: self.base.clone(),
            extended: false,
        }
    }

    /// Union of base and extended directories, base first, no duplicates.
    pub fn upgraded_set(&self) -> ResourceSet {
        let mut font_dirs = self.base.clone();
        for dir in &self.extended {
            if !font_dirs.contains(dir) {
                font_dirs.push(dir.clone());
            }
        }
        ResourceSet {
            font_dirs,
            extended: true,
        }
    }
}

/// The resource set a renderer is constructed with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSet {
    pub font_dirs: Vec<PathBuf>,
    pub extended: bool,
}
