//! Plan command: show what a fill would do without a browser

use crate::commands::{InputArgs, PlanArgs, PlanFormat};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use formwright::mock::MockPage;
use formwright::{
    execute_plan, parse_tabs, ExecutionLog, FieldMapping, FillOptions, FillPlan, FillStep,
    PolicyRecord, RunMode,
};
use std::fmt::Write as _;

/// Read the record and the mapping named on the command line
pub fn load_inputs(input: &InputArgs) -> CliResult<(PolicyRecord, FieldMapping)> {
    let record = PolicyRecord::load(&input.record)
        .map_err(|e| CliError::config(format!("{}: {e}", input.record.display())))?;
    let mapping = FieldMapping::load(&input.mapping)
        .map_err(|e| CliError::config(format!("{}: {e}", input.mapping.display())))?;
    Ok((record, mapping))
}

/// Build the plan, restricted to `tabs` when given
pub fn build_plan(
    record: &PolicyRecord,
    mapping: &FieldMapping,
    tabs: Option<&str>,
) -> CliResult<FillPlan> {
    let plan = FillPlan::build(record, mapping);
    match tabs {
        Some(list) => {
            let tabs = parse_tabs(list).map_err(|e| CliError::invalid_argument(e.to_string()))?;
            if tabs.is_empty() {
                return Err(CliError::invalid_argument("--tabs names no tab"));
            }
            Ok(plan.restrict_to(&tabs))
        }
        None => Ok(plan),
    }
}

/// `field: value -> locator (kind, tab)`
#[must_use]
pub fn format_step(step: &FillStep) -> String {
    format!(
        "{}: {} -> {} ({}, {})",
        step.field,
        step.value,
        step.target.locator,
        step.target.kind,
        step.tab
    )
}

/// Numbered steps followed by the skipped fields
#[must_use]
pub fn render_plan_text(plan: &FillPlan) -> String {
    let mut out = String::new();
    for (i, step) in plan.iter().enumerate() {
        let _ = writeln!(out, "{:>3}. {}", i + 1, format_step(step));
    }
    for (field, reason) in plan.skipped() {
        let _ = writeln!(out, "  -  {field} skipped ({reason})");
    }
    out
}

/// `missing from record: a, b`, or `None` when every field has a value
#[must_use]
pub fn missing_summary(record: &PolicyRecord) -> Option<String> {
    let missing = record.missing();
    if missing.is_empty() {
        return None;
    }
    let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
    Some(format!("missing from record: {}", names.join(", ")))
}

/// The log a dry run of `plan` produces, computed on a blank simulated page
pub fn dry_run_log(mapping: &FieldMapping, plan: &FillPlan) -> CliResult<ExecutionLog> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let page = MockPage::new();
    Ok(runtime.block_on(execute_plan(
        &page,
        mapping,
        plan,
        RunMode::DryRun,
        FillOptions::default(),
    )))
}

/// Run the plan command
pub fn run_plan(config: &CliConfig, args: &PlanArgs) -> CliResult<()> {
    let (record, mapping) = load_inputs(&args.input)?;
    let plan = build_plan(&record, &mapping, args.tabs.as_deref())?;

    match args.format {
        PlanFormat::Json => {
            let log = if args.dry_run {
                Some(dry_run_log(&mapping, &plan)?)
            } else {
                None
            };
            let doc = serde_json::json!({ "plan": plan, "dry_run": log });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        PlanFormat::Text => {
            print!("{}", render_plan_text(&plan));
            if let Some(line) = missing_summary(&record) {
                println!("{line}");
            }
            if args.dry_run {
                let reporter =
                    Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
                reporter.header("Dry run");
                print!("{}", dry_run_log(&mapping, &plan)?);
            }
        }
    }
    Ok(())
}
