//! Formwright CLI Library
//!
//! Command-line front end for the Formwright fill engine: `plan` shows
//! what a record and mapping would fill, `fill` drives a live browser
//! session alongside the operator.

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{Cli, ColorArg, Commands, FillArgs, InputArgs, PlanArgs, PlanFormat};
pub use config::{init_logging, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::Reporter;
