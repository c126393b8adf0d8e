//! Fill command: drive a real browser through an operator-assisted session

use crate::commands::FillArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::handlers::plan::load_inputs;
use formwright::{
    form_tabs, parse_stages, FieldMapping, FillOptions, FillPlan, PolicyRecord, RunMode, Stage,
};

/// Inputs resolved from the command line, before any browser work
#[derive(Debug)]
pub struct FillJob {
    pub record: PolicyRecord,
    pub mapping: FieldMapping,
    pub plan: FillPlan,
    pub stages: Vec<Stage>,
    pub mode: RunMode,
    pub options: FillOptions,
}

/// Timing options from `--sel-timeout` and `--fast`
#[must_use]
pub fn fill_options(args: &FillArgs) -> FillOptions {
    let options = FillOptions::default().with_element_timeout(args.sel_timeout.saturating_mul(1000));
    if args.fast {
        options.fast()
    } else {
        options
    }
}

/// Load the inputs and resolve stages, plan and options
pub fn prepare(args: &FillArgs) -> CliResult<FillJob> {
    let stages = parse_stages(&args.tabs).map_err(|e| CliError::invalid_argument(e.to_string()))?;
    if stages.is_empty() {
        return Err(CliError::invalid_argument("--tabs names no stage"));
    }
    let (record, mapping) = load_inputs(&args.input)?;
    let plan = FillPlan::build(&record, &mapping).restrict_to(&form_tabs(&stages));
    Ok(FillJob {
        record,
        mapping,
        plan,
        stages,
        mode: if args.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Live
        },
        options: fill_options(args),
    })
}

/// Run the fill command
pub fn run_fill(config: &CliConfig, args: &FillArgs) -> CliResult<()> {
    let job = prepare(args)?;
    tracing::info!(
        steps = job.plan.len(),
        stages = ?job.stages,
        mode = ?job.mode,
        "fill session prepared"
    );
    run_in_browser(config, args, &job)
}

#[cfg(feature = "browser")]
fn run_in_browser(config: &CliConfig, args: &FillArgs, job: &FillJob) -> CliResult<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(live::session(config, args, job))
}

#[cfg(not(feature = "browser"))]
fn run_in_browser(_config: &CliConfig, _args: &FillArgs, _job: &FillJob) -> CliResult<()> {
    Err(CliError::unsupported(
        "Browser control not enabled. Rebuild with --features browser",
    ))
}

#[cfg(feature = "browser")]
mod live {
    use super::FillJob;
    use crate::commands::FillArgs;
    use crate::config::CliConfig;
    use crate::error::CliResult;
    use crate::handlers::plan::missing_summary;
    use crate::output::Reporter;
    use formwright::{
        readiness_locators, run_session, wait_for_any_visible, wait_for_url, ChromiumDriver,
        LaunchConfig, PageDriver, PreviewDeck, SessionInputs,
    };
    use std::time::Instant;

    /// `HEADLESS=1` has the same effect as `--headless`
    const HEADLESS_ENV: &str = "HEADLESS";

    fn env_flag(value: Option<&str>) -> bool {
        matches!(
            value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("1" | "true" | "yes")
        )
    }

    fn launch_config(args: &FillArgs) -> LaunchConfig {
        let headless = args.headless || env_flag(std::env::var(HEADLESS_ENV).ok().as_deref());
        let mut launch = LaunchConfig::default().with_headless(headless);
        if args.no_sandbox {
            launch = launch.with_no_sandbox();
        }
        if let Some(path) = &args.chromium {
            launch = launch.with_executable(path);
        }
        launch
    }

    pub(super) async fn session(
        config: &CliConfig,
        args: &FillArgs,
        job: &FillJob,
    ) -> CliResult<()> {
        let mut reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());

        let driver = ChromiumDriver::launch(&launch_config(args)).await?;
        driver.navigate(&args.url).await?;
        reporter.info(&format!("Opened {}; log in and open the new policy form", args.url));

        reporter.start_wait(&format!("Waiting for a URL containing {}", args.url_pattern));
        let waited = wait_for_url(&driver, &args.url_pattern).await;
        reporter.finish_wait("Intake page open", waited);

        reporter.start_wait("Waiting for the form to render");
        let ready = readiness_locators(args.wait_any.as_deref());
        let waited = wait_for_any_visible(&driver, &ready).await;
        reporter.finish_wait("Form ready", waited);

        let started = Instant::now();
        let mut deck = PreviewDeck::new();
        let inputs = SessionInputs {
            record: &job.record,
            mapping: &job.mapping,
            plan: &job.plan,
            stages: &job.stages,
        };
        let log = run_session(&driver, &driver, &mut deck, inputs, job.mode, job.options).await;

        reporter.header("Fill log");
        reporter.log(&log);
        for (field, reason) in job.plan.skipped() {
            reporter.info(&format!("{field} skipped ({reason})"));
        }
        if let Some(line) = missing_summary(&job.record) {
            reporter.info(&line);
        }
        reporter.summary(&log, started.elapsed());

        if !args.close {
            reporter.info("Browser left open for review. Press Ctrl+C to exit");
            tokio::signal::ctrl_c().await?;
        }
        driver.close().await?;
        Ok(())
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    mod tests {
        use super::*;
        use crate::commands::{Cli, Commands};
        use clap::Parser;
        use std::path::PathBuf;

        #[test]
        fn test_env_flag() {
            assert!(env_flag(Some("1")));
            assert!(env_flag(Some(" TRUE ")));
            assert!(!env_flag(Some("0")));
            assert!(!env_flag(None));
        }

        #[test]
        fn test_launch_config_from_flags() {
            let cli = Cli::parse_from([
                "formwright",
                "fill",
                "--json",
                "p.json",
                "--mapping",
                "m.yaml",
                "--url",
                "https://broker.example/",
                "--headless",
                "--no-sandbox",
                "--chromium",
                "/opt/chromium/chrome",
            ]);
            let Commands::Fill(args) = cli.command else {
                return;
            };
            let launch = launch_config(&args);
            assert!(launch.headless);
            assert!(!launch.sandbox);
            assert_eq!(launch.executable, Some(PathBuf::from("/opt/chromium/chrome")));
        }
    }
}
