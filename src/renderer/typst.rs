//! `typst` executable backend.
//!
//! Each renderer owns a private work directory. Registered inputs are
//! written into it and `typst compile` runs with `--root` pointing there,
//! so virtual paths like `main.typ` resolve exactly as registered.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use tempfile::{Builder as TempDirBuilder, TempDir};

use super::{
    InitError, OutputFormat, RenderOptions, RenderOutput, Renderer, RendererFactory, ResourceSet,
};

/// Factory for renderers backed by the `typst` CLI.
#[derive(Debug, Clone)]
pub struct TypstCli {
    command: String,
    ignore_system_fonts: bool,
}

impl TypstCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ignore_system_fonts: false,
        }
    }

    /// Only use fonts from the resource set.
    pub fn ignore_system_fonts(mut self, ignore: bool) -> Self {
        self.ignore_system_fonts = ignore;
        self
    }
}

impl Default for TypstCli {
    fn default() -> Self {
        Self::new("typst")
    }
}

impl RendererFactory for TypstCli {
    fn init(&self, resources: &ResourceSet) -> Result<Box<dyn Renderer>, InitError> {
        let program = which::which(&self.command)
            .map_err(|_| InitError::MissingExecutable(self.command.clone()))?;

        if let Some(missing) = resources.font_dirs.iter().find(|dir| !dir.is_dir()) {
            return Err(InitError::MissingFontDir(missing.clone()));
        }

        let workdir = TempDirBuilder::new().prefix("typlive_").tempdir()?;
        crate::debug!(
            "worker";
            "typst at {} with {} font dir(s){}",
            program.display(),
            resources.font_dirs.len(),
            if resources.extended { " (extended)" } else { "" }
        );

        Ok(Box::new(TypstSession {
            program,
            font_dirs: resources.font_dirs.clone(),
            ignore_system_fonts: self.ignore_system_fonts,
            workdir,
        }))
    }
}

struct TypstSession {
    program: PathBuf,
    font_dirs: Vec<PathBuf>,
    ignore_system_fonts: bool,
    workdir: TempDir,
}

impl TypstSession {
    fn write_input(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let target = resolve_virtual(self.workdir.path(), path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, bytes)
    }

    fn output_path(&self, format: OutputFormat) -> PathBuf {
        self.workdir
            .path()
            .join(format!(".typlive-output.{}", format.extension()))
    }
}

impl Renderer for TypstSession {
    fn reset(&mut self) {
        let Ok(entries) = fs::read_dir(self.workdir.path()) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = removed {
                crate::debug!("worker"; "failed to clear {}: {}", path.display(), e);
            }
        }
    }

    fn register_source(&mut self, path: &str, text: &str) -> io::Result<()> {
        self.write_input(path, text.as_bytes())
    }

    fn register_asset(&mut self, path: &str, bytes: &[u8]) -> io::Result<()> {
        self.write_input(path, bytes)
    }

    fn render(&mut self, entry: &str, options: &RenderOptions) -> RenderOutput {
        let root = self.workdir.path();
        let input = match resolve_virtual(root, entry) {
            Ok(input) => input,
            Err(e) => {
                return RenderOutput {
                    artifact: None,
                    diagnostics: vec![format!("{entry}: {e}")],
                };
            }
        };
        let output = self.output_path(options.format);

        let mut cmd = Command::new(&self.program);
        cmd.arg("compile")
            .arg("--root")
            .arg(root)
            .arg("--diagnostic-format")
            .arg("short")
            .arg("--format")
            .arg(options.format.extension());
        for dir in &self.font_dirs {
            cmd.arg("--font-path").arg(dir);
        }
        if self.ignore_system_fonts {
            cmd.arg("--ignore-system-fonts");
        }
        if options.format != OutputFormat::Pdf {
            // Image formats write one file per page; preview the first.
            cmd.arg("--pages").arg("1");
        }
        cmd.arg(&input).arg(&output);

        let result = match cmd.output() {
            Ok(result) => result,
            Err(e) => {
                return RenderOutput {
                    artifact: None,
                    diagnostics: vec![format!("failed to run {}: {}", self.program.display(), e)],
                };
            }
        };

        let diagnostics = parse_diagnostics(&String::from_utf8_lossy(&result.stderr), root);
        let artifact = if result.status.success() {
            fs::read(&output).ok()
        } else {
            None
        };
        let _ = fs::remove_file(&output);

        RenderOutput {
            artifact,
            diagnostics,
        }
    }
}

/// Map a registered path into the work directory, refusing escapes.
fn resolve_virtual(root: &Path, path: &str) -> io::Result<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid input path `{path}`"),
        ));
    }
    Ok(root.join(relative))
}

/// Split typst stderr into diagnostics, stripping the work directory so
/// messages mention virtual paths only.
fn parse_diagnostics(stderr: &str, root: &Path) -> Vec<String> {
    let root_prefix = format!("{}{}", root.display(), std::path::MAIN_SEPARATOR);
    stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.replace(&root_prefix, ""))
        .collect()
}
