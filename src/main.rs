//! typlive - live compile for Typst documents.

mod cli;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, common::Job};
use typlive::config::LiveConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    typlive::logger::set_verbose(cli.verbose);

    let cwd = std::env::current_dir().context("Failed to get current working directory")?;
    let mut config = LiveConfig::load(&cwd, &cli.config)?;
    LiveConfig::update_option(&mut config.compile.debounce_ms, cli.debounce().as_ref());
    config.validate()?;

    let job = Job::new(cli.args(), &config);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match cli.command {
        Commands::Compile { .. } => runtime.block_on(cli::compile::run(&job, &config)),
        Commands::Watch { .. } => runtime.block_on(cli::watch::run(job, &config)),
    }
}
