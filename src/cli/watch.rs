//! `typlive watch`: recompile on every change until Ctrl+C.
//!
//! ```text
//! notify (thread) ─► InputWatcher ─► Coalescer ─► Coordinator::compile
//!                                                      │
//!                   StatusReporter ◄── listeners ◄─────┘ (writes artifact)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind};
use rustc_hash::FxHashSet;
use tokio::sync::mpsc;
use typlive::config::LiveConfig;
use typlive::logger::{status_error, status_pending, status_success, status_warning};
use typlive::{
    ArtifactHandle, Coalescer, CompileError, CompileListener, CompileStatus, Coordinator, debug,
    log,
};

use super::common::{Job, write_artifact};

pub async fn run(job: Job, config: &LiveConfig) -> Result<()> {
    let job = Arc::new(job);
    let (inputs, mut events) = InputWatcher::new(
        std::iter::once(job.file.as_path()).chain(job.assets.iter().map(PathBuf::as_path)),
    )?;

    let coordinator = Coordinator::spawn(Arc::new(config.factory()), config.worker_config())?;
    let _subscription = coordinator.add_listener(Arc::new(StatusReporter {
        output: job.output.clone(),
    }));
    coordinator.warmup();

    let coalescer = {
        let coordinator = coordinator.clone();
        let job = Arc::clone(&job);
        Coalescer::new(config.debounce(), move |()| start_compile(&coordinator, &job))
    };

    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .map_err(|e| anyhow!("failed to set Ctrl+C handler: {}", e))?;

    log!("watch"; "watching {} (Ctrl+C to stop)", job.file.display());
    start_compile(&coordinator, &job);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = events.recv() => match event {
                Some(event) if inputs.is_relevant(&event) => {
                    debug!("watch"; "change: {:?}", event.paths);
                    coalescer.schedule(());
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    coalescer.cancel();
    coordinator.dispose();
    log!("watch"; "stopped");
    Ok(())
}

/// Read the current inputs and hand them to the coordinator.
fn start_compile(coordinator: &Coordinator, job: &Job) {
    let inputs = job
        .read_source()
        .and_then(|source| Ok((source, job.read_assets()?)));
    // Editors may briefly remove the file while saving; the next event retries.
    let (source, assets) = match inputs {
        Ok(inputs) => inputs,
        Err(e) => {
            status_warning(&format!("{e:#}"));
            return;
        }
    };

    let pending = coordinator.compile_with_assets(source, assets);
    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        match pending.await {
            Ok(_) => {}
            Err(CompileError::RendererInit(_)) => {
                // This worker is done for; the next change gets a fresh one.
                match coordinator.recover() {
                    Ok(_) | Err(CompileError::CoordinatorDisposed) => {}
                    Err(e) => log!("error"; "failed to restart render worker: {}", e),
                }
            }
            Err(e) => debug!("watch"; "compile ended: {}", e),
        }
    });
}

/// Watches the directories of the input files and filters their events.
struct InputWatcher {
    _watcher: RecommendedWatcher,
    files: FxHashSet<PathBuf>,
}

impl InputWatcher {
    /// Start watching; events arrive on the returned receiver.
    fn new<'a>(
        paths: impl IntoIterator<Item = &'a Path>,
    ) -> Result<(Self, mpsc::Receiver<notify::Event>)> {
        // notify only offers a sync callback
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        // Watch parent directories: atomic saves replace the file itself.
        let mut files = FxHashSet::default();
        let mut dirs = FxHashSet::default();
        for path in paths {
            let path = path
                .canonicalize()
                .with_context(|| format!("cannot watch `{}`", path.display()))?;
            if let Some(dir) = path.parent() {
                dirs.insert(dir.to_path_buf());
            }
            files.insert(path);
        }
        for dir in &dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }

        let (event_tx, event_rx) = mpsc::channel(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if event_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        let watcher = Self {
            _watcher: watcher,
            files,
        };
        Ok((watcher, event_rx))
    }

    fn is_relevant(&self, event: &notify::Event) -> bool {
        let content_change = match event.kind {
            EventKind::Create(_) | EventKind::Remove(_) => true,
            // mtime/atime/chmod noise
            EventKind::Modify(ModifyKind::Metadata(_)) => false,
            EventKind::Modify(_) => true,
            _ => false,
        };
        content_change && event.paths.iter().any(|p| self.files.contains(p))
    }
}

/// Shows compile status and writes every new artifact to `output`.
struct StatusReporter {
    output: PathBuf,
}

impl StatusReporter {
    fn publish(&self, artifact: &[u8]) -> Result<()> {
        write_artifact(&self.output, artifact)
    }
}

impl CompileListener for StatusReporter {
    fn on_status_change(&self, status: CompileStatus) {
        if status == CompileStatus::Compiling {
            status_pending("compiling...");
        }
    }

    fn on_success(&self, artifact: &[u8], handle: &ArtifactHandle) {
        match self.publish(artifact) {
            Ok(()) => {
                debug!("watch"; "{} -> {}", handle, self.output.display());
                status_success(&format!("wrote {}", self.output.display()));
            }
            Err(e) => status_error("failed to write artifact", &format!("{e:#}")),
        }
    }

    fn on_error(&self, message: &str) {
        status_error("compile failed", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind};
    use std::fs;

    #[test]
    fn test_relevant_events() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.typ");
        fs::write(&file, "= Hello").unwrap();

        let (watcher, _events) = InputWatcher::new([file.as_path()]).unwrap();
        let file = file.canonicalize().unwrap();

        let content = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(file.clone());
        assert!(watcher.is_relevant(&content));

        let created = notify::Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());
        assert!(watcher.is_relevant(&created));

        let metadata = notify::Event::new(EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::WriteTime,
        )))
        .add_path(file.clone());
        assert!(!watcher.is_relevant(&metadata));

        let sibling = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(file.with_file_name("notes.typ"));
        assert!(!watcher.is_relevant(&sibling));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.typ");
        assert!(InputWatcher::new([missing.as_path()]).is_err());
    }

    #[test]
    fn test_reporter_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = StatusReporter {
            output: dir.path().join("out/main.pdf"),
        };

        reporter.publish(b"%PDF-1.7 first").unwrap();
        reporter.publish(b"%PDF-1.7 second").unwrap();
        assert_eq!(
            fs::read(dir.path().join("out/main.pdf")).unwrap(),
            b"%PDF-1.7 second"
        );
    }
}
