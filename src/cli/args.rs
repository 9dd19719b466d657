//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// typlive live Typst compiler CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print debug logs (worker, bridge, stale results)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, default_value = "typlive.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compile a document once and write the artifact
    #[command(visible_alias = "c")]
    Compile {
        #[command(flatten)]
        args: CompileArgs,
    },

    /// Recompile on every change until Ctrl+C
    #[command(visible_alias = "w")]
    Watch {
        #[command(flatten)]
        args: CompileArgs,

        /// Quiet period in milliseconds before a change is compiled
        #[arg(short, long, value_name = "MS")]
        debounce: Option<u64>,
    },
}

/// Shared arguments for Compile and Watch
#[derive(clap::Args, Debug, Clone)]
pub struct CompileArgs {
    /// Typst source file
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub file: PathBuf,

    /// Artifact path (default: source path with the format's extension)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Extra file the document reads (image, data, bibliography), repeatable
    #[arg(short, long = "asset", value_name = "PATH", value_hint = clap::ValueHint::FilePath)]
    pub assets: Vec<PathBuf>,
}

impl Cli {
    pub fn args(&self) -> &CompileArgs {
        match &self.command {
            Commands::Compile { args } | Commands::Watch { args, .. } => args,
        }
    }

    pub fn debounce(&self) -> Option<u64> {
        match &self.command {
            Commands::Watch { debounce, .. } => *debounce,
            Commands::Compile { .. } => None,
        }
    }
}
