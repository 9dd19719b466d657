//! Configuration for `typlive.toml`.
//!
//! ```text
//! config/
//! ├── section/   # [compile], [renderer], [fonts]
//! ├── error      # ConfigError
//! ├── util       # config file discovery, path checks
//! └── mod.rs     # LiveConfig (this file)
//! ```
//!
//! The file is optional: without one every section takes its defaults and
//! the current directory is the root.

mod error;
pub mod section;
mod util;

pub use error::ConfigError;
pub use section::{CompileSection, FontsSection, RendererSection};
pub use util::find_config_file;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::log;
use crate::renderer::{RenderOptions, ResourceConfig, TypstCli};
use crate::worker::WorkerConfig;

/// Default config file name.
pub const CONFIG_FILE: &str = "typlive.toml";

/// Root configuration structure representing typlive.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Path of the loaded config file, `None` when running on defaults
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Directory relative font paths resolve against
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub compile: CompileSection,

    #[serde(default)]
    pub renderer: RendererSection,

    #[serde(default)]
    pub fonts: FontsSection,
}

impl LiveConfig {
    /// Search upward from `start` for `config_name` and load it, or fall
    /// back to defaults rooted at `start`.
    pub fn load(start: &Path, config_name: &Path) -> Result<Self, ConfigError> {
        let mut config = match find_config_file(start, config_name) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
                config.config_path = Some(path);
                config
            }
            None => Self {
                root: start.to_path_buf(),
                ..Self::default()
            },
        };

        config.resolve_paths();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    pub fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} are ignored:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Make font directories absolute against the root.
    fn resolve_paths(&mut self) {
        let root = self.root.clone();
        for dir in self.fonts.base.iter_mut().chain(self.fonts.extended.iter_mut()) {
            if dir.is_relative() {
                *dir = root.join(&*dir);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compile.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "compile.debounce_ms must be greater than 0".into(),
            ));
        }
        if !util::is_contained(Path::new(&self.compile.entry)) {
            return Err(ConfigError::Validation(format!(
                "compile.entry `{}` must be a relative path inside the project",
                self.compile.entry
            )));
        }
        if self.renderer.command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "renderer.command must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Overwrite a config value with a CLI value, if one was given.
    pub fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.compile.debounce_ms)
    }

    pub fn resources(&self) -> ResourceConfig {
        ResourceConfig {
            base: self.fonts.base.clone(),
            extended: self.fonts.extended.clone(),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            entry: self.compile.entry.clone(),
            resources: self.resources(),
            options: RenderOptions {
                format: self.renderer.format,
            },
        }
    }

    /// Renderer factory for the configured `typst` executable.
    pub fn factory(&self) -> TypstCli {
        TypstCli::new(self.renderer.command.clone())
            .ignore_system_fonts(self.renderer.ignore_system_fonts)
    }
}

#[cfg(test)]
pub fn test_parse_config(content: &str) -> LiveConfig {
    let (parsed, ignored) = LiveConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
