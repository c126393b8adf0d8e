//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Formwright: fill policy intake forms from extracted records
#[derive(Parser, Debug)]
#[command(name = "formwright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the fill plan for a record and mapping
    Plan(PlanArgs),

    /// Open the browser, wait for the intake form and fill it (never submits)
    Fill(FillArgs),
}

/// Record and mapping inputs shared by every command
#[derive(Parser, Debug, Clone)]
pub struct InputArgs {
    /// Extracted policy record (JSON)
    #[arg(long = "json", value_name = "FILE")]
    pub record: PathBuf,

    /// Field mapping (YAML)
    #[arg(long, visible_alias = "yaml", value_name = "FILE")]
    pub mapping: PathBuf,
}

/// Arguments for the plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Only list steps of these form tabs (comma-separated)
    #[arg(long)]
    pub tabs: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: PlanFormat,

    /// Also print the dry-run log the plan would produce
    #[arg(long)]
    pub dry_run: bool,
}

/// Plan output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlanFormat {
    /// One line per step
    #[default]
    Text,
    /// The plan as JSON
    Json,
}

/// Arguments for the fill command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct FillArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Site URL to open (the operator logs in and navigates from there)
    #[arg(long)]
    pub url: String,

    /// URL fragment that identifies the intake page
    #[arg(long, default_value = formwright::INTAKE_URL_PATTERN)]
    pub url_pattern: String,

    /// Comma-separated selectors; filling starts when any is visible
    /// (default: #idAseguradora,#Moneda,#TipoVigencia,#idProductor)
    #[arg(long)]
    pub wait_any: Option<String>,

    /// Stages to run: form tabs, items_modal, costos_preview
    #[arg(long, default_value = "condiciones")]
    pub tabs: String,

    /// Seconds to wait for each field's element
    #[arg(long, default_value = "5")]
    pub sel_timeout: u64,

    /// Shorter result and verification waits on search-selects, also capping per-field overrides
    #[arg(long)]
    pub fast: bool,

    /// Log what would be filled without touching the form
    #[arg(long)]
    pub dry_run: bool,

    /// Run the browser without a window (also HEADLESS=1)
    #[arg(long)]
    pub headless: bool,

    /// Disable the browser sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Browser executable (also read from CHROMIUM_PATH)
    #[arg(long, value_name = "PATH")]
    pub chromium: Option<PathBuf>,

    /// Close the browser when done instead of leaving it open for review
    #[arg(long)]
    pub close: bool,
}

/// Color output argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ColorChoice;

    fn plan_args(cli: Cli) -> Option<PlanArgs> {
        match cli.command {
            Commands::Plan(args) => Some(args),
            Commands::Fill(_) => None,
        }
    }

    fn fill_args(cli: Cli) -> Option<FillArgs> {
        match cli.command {
            Commands::Fill(args) => Some(args),
            Commands::Plan(_) => None,
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan() {
        let cli = Cli::parse_from([
            "formwright",
            "plan",
            "--json",
            "poliza.json",
            "--yaml",
            "absanet.yaml",
            "--tabs",
            "condiciones",
            "-f",
            "json",
        ]);
        let args = plan_args(cli).unwrap();
        assert_eq!(args.input.record, PathBuf::from("poliza.json"));
        assert_eq!(args.input.mapping, PathBuf::from("absanet.yaml"));
        assert_eq!(args.tabs.as_deref(), Some("condiciones"));
        assert_eq!(args.format, PlanFormat::Json);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_parse_fill_defaults() {
        let cli = Cli::parse_from([
            "formwright",
            "fill",
            "--json",
            "p.json",
            "--mapping",
            "m.yaml",
            "--url",
            "https://broker.example/",
        ]);
        let args = fill_args(cli).unwrap();
        assert_eq!(args.url_pattern, "/Poliza/Alta/");
        assert_eq!(args.tabs, "condiciones");
        assert_eq!(args.sel_timeout, 5);
        assert!(args.wait_any.is_none());
        assert!(!args.dry_run && !args.fast && !args.close);
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from([
            "formwright", "-vv", "--color", "never", "plan", "--json", "a", "--mapping", "b",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(ColorChoice::from(cli.color), ColorChoice::Never);
    }
}
