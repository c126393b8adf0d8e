//! Operator hand-off points of a fill session.
//!
//! The operator logs in and navigates by hand; the engine waits for the
//! intake page, then for the form to render. The vehicle items modal is
//! opened by the operator too. These waits poll without a deadline.

use crate::driver::PageDriver;
use crate::executor::{ExecutionLog, FillExecutor, LogEntry, RunMode};
use crate::locator::Locator;
use crate::mapping::FieldMapping;
use crate::plan::{FillPlan, Tab};
use crate::preview::{
    conditions_pane, costs_pane, show_pane, vehicle_pane, PreviewDeck, ReviewPanel,
};
use crate::record::{PolicyField, PolicyRecord};
use crate::result::{FillError, FillResult};
use crate::wait::{self, poll_forever, WaitOptions, OPERATOR_POLL_INTERVAL_MS};
use crate::widget::{FillOptions, WidgetFiller};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// URL fragment of the policy intake page
pub const INTAKE_URL_PATTERN: &str = "/Poliza/Alta/";

/// Elements whose appearance means the form has rendered
pub const DEFAULT_READY_SELECTORS: [&str; 4] =
    ["#idAseguradora", "#Moneda", "#TipoVigencia", "#idProductor"];

/// Id of the vehicle items modal
pub const ITEMS_MODAL_ID: &str = "ModalGeneral";

/// Poll interval while waiting for the items modal
pub const MODAL_POLL_MS: u64 = 50;

/// Plain inputs filled inside the items modal
pub const ITEM_INPUTS: [(PolicyField, &str); 3] = [
    (PolicyField::Patente, "Patente"),
    (PolicyField::Chasis, "Chasis"),
    (PolicyField::Motor, "Motor"),
];

/// One selectable part of a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Plan steps of one form tab
    Form(Tab),
    /// The vehicle items modal
    ItemsModal,
    /// The costs review pane
    CostsPreview,
}

impl FromStr for Stage {
    type Err = FillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "items_modal" => Ok(Self::ItemsModal),
            "costos_preview" => Ok(Self::CostsPreview),
            other => other.parse().map(Self::Form),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Form(tab) => write!(f, "{tab}"),
            Self::ItemsModal => f.write_str("items_modal"),
            Self::CostsPreview => f.write_str("costos_preview"),
        }
    }
}

/// Parse a comma-separated stage list such as `condiciones,items_modal`
pub fn parse_stages(list: &str) -> FillResult<Vec<Stage>> {
    let mut stages: Vec<Stage> = Vec::new();
    for part in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let stage = part.parse()?;
        if !stages.contains(&stage) {
            stages.push(stage);
        }
    }
    Ok(stages)
}

/// Form tabs named by `stages`
#[must_use]
pub fn form_tabs(stages: &[Stage]) -> Vec<Tab> {
    stages
        .iter()
        .filter_map(|s| match s {
            Stage::Form(tab) => Some(*tab),
            _ => None,
        })
        .collect()
}

/// Readiness locators from a comma-separated list, or the defaults
#[must_use]
pub fn readiness_locators(list: Option<&str>) -> Vec<Locator> {
    let parsed: Vec<Locator> = list
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Locator::shorthand)
        .collect();
    if parsed.is_empty() {
        DEFAULT_READY_SELECTORS.iter().map(|s| Locator::shorthand(s)).collect()
    } else {
        parsed
    }
}

/// Block until the page URL contains `fragment`
pub async fn wait_for_url(driver: &dyn PageDriver, fragment: &str) -> Duration {
    poll_forever(OPERATOR_POLL_INTERVAL_MS, || async move {
        Ok(driver.current_url().await?.contains(fragment))
    })
    .await
}

/// Block until any of `locators` is displayed
pub async fn wait_for_any_visible(driver: &dyn PageDriver, locators: &[Locator]) -> Duration {
    poll_forever(OPERATOR_POLL_INTERVAL_MS, || async move {
        for locator in locators {
            if let Some(el) = driver.find(locator).await? {
                if driver.is_displayed(&el).await? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    })
    .await
}

/// Wait for the operator to open the items modal, show the vehicle pane,
/// then type the plain vehicle identifiers.
///
/// Year and make are composite selectors inside the modal and are left to
/// the operator.
pub async fn fill_items_modal(
    driver: &dyn PageDriver,
    record: &PolicyRecord,
    deck: &mut PreviewDeck,
    panel: &dyn ReviewPanel,
    options: WaitOptions,
) -> ExecutionLog {
    let mut log = ExecutionLog::new();
    log.push(LogEntry::note(format!("Items: waiting for {ITEMS_MODAL_ID}")));

    let modal_locator = Locator::id(ITEMS_MODAL_ID);
    let modal_locator = &modal_locator;
    poll_forever(MODAL_POLL_MS, || async move {
        match driver.find(modal_locator).await? {
            Some(el) => driver.is_displayed(&el).await,
            None => Ok(false),
        }
    })
    .await;
    if let Ok(Some(modal)) = driver.find(modal_locator).await {
        if let Err(err) = driver.scroll_into_view(&modal).await {
            tracing::debug!(error = %err, "scroll to items modal failed");
        }
    }

    show_pane(panel, deck, vehicle_pane(record)).await;

    for (field, id) in ITEM_INPUTS {
        let Some(value) = record.present(field) else {
            continue;
        };
        match type_into(driver, id, &value.to_string(), options).await {
            Ok(()) => log.push(LogEntry::note(format!("Items: Filled {field}"))),
            Err(err) => {
                tracing::warn!(%field, error = %err, "items modal input failed");
                log.push(LogEntry::note(format!("ERROR: {id}: {err}")));
            }
        }
    }
    log
}

async fn type_into(
    driver: &dyn PageDriver,
    id: &str,
    text: &str,
    options: WaitOptions,
) -> FillResult<()> {
    let el = wait::wait_for_element(driver, &Locator::id(id), options).await?;
    if let Err(err) = driver.scroll_into_view(&el).await {
        tracing::debug!(id, error = %err, "scroll to items input failed");
    }
    if let Err(err) = driver.clear(&el).await {
        tracing::debug!(id, error = %err, "clearing items input failed");
    }
    driver.send_keys(&el, text).await?;
    Ok(())
}

/// Inputs of one session run
#[derive(Debug, Clone, Copy)]
pub struct SessionInputs<'a> {
    pub record: &'a PolicyRecord,
    pub mapping: &'a FieldMapping,
    pub plan: &'a FillPlan,
    pub stages: &'a [Stage],
}

/// Run the selected stages on a page that already shows the form.
///
/// All three review panes are pushed first so the operator can page
/// through them; then the plan runs, then the items modal, then the costs
/// pane is brought to the front.
pub async fn run_session(
    driver: &dyn PageDriver,
    panel: &dyn ReviewPanel,
    deck: &mut PreviewDeck,
    inputs: SessionInputs<'_>,
    mode: RunMode,
    options: FillOptions,
) -> ExecutionLog {
    let SessionInputs {
        record,
        mapping,
        plan,
        stages,
    } = inputs;
    for pane in [
        conditions_pane(record),
        vehicle_pane(record),
        costs_pane(record),
    ] {
        show_pane(panel, deck, pane).await;
    }

    let mut log = ExecutionLog::new();
    if stages.iter().any(|s| matches!(s, Stage::Form(_))) {
        let filler = WidgetFiller::new(driver, mapping, options);
        let executor = FillExecutor::new(driver, mapping, &filler, options);
        log.extend(executor.execute(plan, mode).await.entries().iter().cloned());
    }

    if stages.contains(&Stage::ItemsModal) {
        match mode {
            RunMode::Live => {
                let items =
                    fill_items_modal(driver, record, deck, panel, options.element_wait()).await;
                log.extend(items.entries().iter().cloned());
            }
            RunMode::DryRun => {
                for (field, _) in ITEM_INPUTS {
                    if record.present(field).is_some() {
                        log.push(LogEntry::WouldFill {
                            field: field.as_str().to_string(),
                        });
                    }
                }
            }
        }
    }

    if stages.contains(&Stage::CostsPreview) {
        show_pane(panel, deck, costs_pane(record)).await;
    }
    log
}
