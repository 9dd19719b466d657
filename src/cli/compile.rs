//! `typlive compile`: one compile, one artifact.

use std::sync::Arc;

use anyhow::{Result, bail};
use typlive::config::LiveConfig;
use typlive::{Coordinator, log};

use super::common::{Job, print_diagnostics, write_artifact};

pub async fn run(job: &Job, config: &LiveConfig) -> Result<()> {
    let source = job.read_source()?;
    let assets = job.read_assets()?;

    let coordinator = Coordinator::spawn(Arc::new(config.factory()), config.worker_config())?;
    let result = coordinator.compile_with_assets(source, assets).await;

    // Resolve before dispose() releases the artifact.
    let bytes = match &result {
        Ok(outcome) => outcome
            .artifact
            .as_ref()
            .and_then(|handle| coordinator.resolve(handle)),
        Err(_) => None,
    };
    coordinator.dispose();

    let outcome = result?;
    print_diagnostics(&outcome.diagnostics);

    match bytes {
        Some(bytes) if outcome.success => {
            write_artifact(&job.output, &bytes)?;
            log!("compile"; "wrote {}", job.output.display());
            Ok(())
        }
        // Diagnostics already explain the failure.
        _ if !outcome.diagnostics.is_empty() => {
            bail!("compilation of `{}` failed", job.file.display())
        }
        _ => {
            let message = outcome.message.unwrap_or_else(|| "no artifact".into());
            bail!("compilation of `{}` failed: {}", job.file.display(), message)
        }
    }
}
