//! Fill Executor.
//!
//! Drives a [`FillPlan`] against the page, one step at a time:
//!
//! ```text
//! for step in plan:
//!   close stray search-select overlays      (live only)
//!   tab changed?  → TabNavigator            → "Switched to tab: X"
//!   dry run?      → "Would fill X"
//!   StepFiller    → settle rule             → "Filled X"
//!                 ↘ error                   → "ERROR filling X: …"
//! ```
//!
//! A failing field is logged and the run goes on; the form is reviewed by
//! a person afterwards, so partial output beats an aborted run.

use crate::driver::PageDriver;
use crate::mapping::FieldMapping;
use crate::plan::{FillPlan, FillStep, Tab};
use crate::result::FillResult;
use crate::settle::settle;
use crate::tabs::{TabNavigator, TabOutcome};
use crate::widget::{close_open_overlays, FillOptions, WidgetFiller};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Fills one planned step; the executor's seam to the widget layer
#[async_trait]
pub trait StepFiller: Send + Sync {
    async fn fill_step(&self, step: &FillStep) -> FillResult<()>;
}

/// Whether the executor touches the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Log the intended actions only
    #[default]
    DryRun,
    Live,
}

/// One operator-facing outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    TabSwitch { tab: Tab },
    TabUnavailable { tab: Tab, detail: String },
    WouldSwitch { tab: Tab },
    WouldFill { field: String },
    Filled { field: String },
    Failed { field: String, detail: String },
    Note { message: String },
}

impl LogEntry {
    #[must_use]
    pub fn note(message: impl Into<String>) -> Self {
        Self::Note {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TabSwitch { tab } => write!(f, "Switched to tab: {tab}"),
            Self::TabUnavailable { tab, detail } => {
                write!(f, "Switched to tab: {tab} (not activated: {detail})")
            }
            Self::WouldSwitch { tab } => write!(f, "Would switch to tab: {tab}"),
            Self::WouldFill { field } => write!(f, "Would fill {field}"),
            Self::Filled { field } => write!(f, "Filled {field}"),
            Self::Failed { field, detail } => write!(f, "ERROR filling {field}: {detail}"),
            Self::Note { message } => f.write_str(message),
        }
    }
}

/// Append-only outcome list of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Rendered lines, in order
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.is_failure()).collect()
    }

    #[must_use]
    pub fn filled_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, LogEntry::Filled { .. }))
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Extend<LogEntry> for ExecutionLog {
    fn extend<I: IntoIterator<Item = LogEntry>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ExecutionLog {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for ExecutionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// Runs plans on one page
pub struct FillExecutor<'a> {
    driver: &'a dyn PageDriver,
    mapping: &'a FieldMapping,
    filler: &'a dyn StepFiller,
    options: FillOptions,
}

impl fmt::Debug for FillExecutor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillExecutor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> FillExecutor<'a> {
    #[must_use]
    pub fn new(
        driver: &'a dyn PageDriver,
        mapping: &'a FieldMapping,
        filler: &'a dyn StepFiller,
        options: FillOptions,
    ) -> Self {
        Self {
            driver,
            mapping,
            filler,
            options,
        }
    }

    /// Run every step of `plan` and return the outcomes
    pub async fn execute(&self, plan: &FillPlan, mode: RunMode) -> ExecutionLog {
        let mut log = ExecutionLog::new();
        let mut tabs = TabNavigator::new(self.driver, self.mapping, self.options.element_wait());
        let mut current: Option<Tab> = None;

        for step in plan {
            let field = step.field.as_str();
            if mode == RunMode::Live {
                let closed = close_open_overlays(self.driver, self.options.element_wait()).await;
                if !closed.success {
                    tracing::debug!(field, "stray overlay still open");
                }
            }

            if current != Some(step.tab) {
                current = Some(step.tab);
                let entry = match mode {
                    RunMode::DryRun => LogEntry::WouldSwitch { tab: step.tab },
                    RunMode::Live => match tabs.activate(step.tab).await {
                        TabOutcome::Unavailable(detail) => LogEntry::TabUnavailable {
                            tab: step.tab,
                            detail,
                        },
                        _ => LogEntry::TabSwitch { tab: step.tab },
                    },
                };
                log.push(entry);
            }

            if mode == RunMode::DryRun {
                log.push(LogEntry::WouldFill {
                    field: field.to_string(),
                });
                continue;
            }

            match self.filler.fill_step(step).await {
                Ok(()) => {
                    let settled = settle(self.driver, &step.target.profile.settle).await;
                    if !settled.success {
                        tracing::warn!(field, waited_for = %settled.waited_for, "dependent fields did not settle");
                    }
                    tracing::info!(field, "filled");
                    log.push(LogEntry::Filled {
                        field: field.to_string(),
                    });
                }
                Err(err) => {
                    tracing::warn!(field, error = %err, "field failed");
                    log.push(LogEntry::Failed {
                        field: field.to_string(),
                        detail: err.to_string(),
                    });
                }
            }
        }
        log
    }
}

/// Run `plan` with the standard widget filler
pub async fn execute_plan(
    driver: &dyn PageDriver,
    mapping: &FieldMapping,
    plan: &FillPlan,
    mode: RunMode,
    options: FillOptions,
) -> ExecutionLog {
    let filler = WidgetFiller::new(driver, mapping, options);
    FillExecutor::new(driver, mapping, &filler, options)
        .execute(plan, mode)
        .await
}
