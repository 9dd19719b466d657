//! Command-line interface module.

mod args;
pub mod common;
pub mod compile;
pub mod watch;

pub use args::{Cli, CompileArgs, Commands};
