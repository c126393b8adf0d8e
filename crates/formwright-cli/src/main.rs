//! Formwright CLI: fill policy intake forms from extracted records
//!
//! ## Usage
//!
//! ```bash
//! formwright plan --json poliza.json --mapping absanet.yaml
//! formwright plan --json poliza.json --mapping absanet.yaml --dry-run
//! formwright fill --json poliza.json --mapping absanet.yaml \
//!     --url https://broker.example/ --tabs condiciones,items_modal
//! ```

use clap::Parser;
use formwright_cli::{
    handlers::{run_fill, run_plan},
    init_logging, Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    init_logging(&config);

    match cli.command {
        Commands::Plan(args) => run_plan(&config, &args),
        Commands::Fill(args) => run_fill(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(ColorChoice::from(cli.color.clone()))
}
