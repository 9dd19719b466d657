//! Common utilities shared across CLI commands.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use typlive::bridge::protocol::Assets;
use typlive::config::LiveConfig;
use typlive::log;

use super::CompileArgs;

/// Resolved inputs of a compile command.
#[derive(Debug, Clone)]
pub struct Job {
    pub file: PathBuf,
    pub output: PathBuf,
    pub assets: Vec<PathBuf>,
}

impl Job {
    pub fn new(args: &CompileArgs, config: &LiveConfig) -> Self {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| args.file.with_extension(config.renderer.format.extension()));
        Self {
            file: args.file.clone(),
            output,
            assets: args.assets.clone(),
        }
    }

    pub fn read_source(&self) -> Result<String> {
        fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read `{}`", self.file.display()))
    }

    /// Read every asset, keyed by its path relative to the source file.
    pub fn read_assets(&self) -> Result<Assets> {
        let base = self.file.parent().unwrap_or(Path::new(""));
        let mut assets = Assets::new();
        for path in &self.assets {
            let bytes = fs::read(path)
                .with_context(|| format!("failed to read asset `{}`", path.display()))?;
            assets.insert(asset_key(base, path), bytes);
        }
        Ok(assets)
    }
}

/// Virtual path an asset is registered under: relative to `base` when it
/// lives below it, otherwise its file name.
pub fn asset_key(base: &Path, path: &Path) -> String {
    let relative = path
        .strip_prefix(base)
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| path.file_name().map(Path::new))
        .unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

/// Replace `path` atomically so viewers never read a half-written file.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("failed to create `{}`", dir.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".typlive-")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temp file in `{}`", dir.display()))?;
    tmp.write_all(bytes)?;
    tmp.persist(path)
        .with_context(|| format!("failed to write `{}`", path.display()))?;
    Ok(())
}

/// Print renderer diagnostics, errors in red, everything else as warnings.
pub fn print_diagnostics(diagnostics: &[String]) {
    for line in diagnostics {
        if line.contains("error:") {
            log!("error"; "{}", line);
        } else {
            log!("warning"; "{}", line);
        }
    }
}
