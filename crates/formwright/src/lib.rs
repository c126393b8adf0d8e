//! Formwright: resilient fill orchestration for AJAX-heavy intake forms.
//!
//! Takes an extracted [`PolicyRecord`] and a declarative [`FieldMapping`]
//! and fills an insurance intake form in a live browser, field by field,
//! without submitting it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │ PolicyRecord │──►│ FillPlan  │──►│ FillExecutor │──►│ ExecutionLog │
//! │ FieldMapping │   │ (ordered) │   │  tabs/settle │   │              │
//! └──────────────┘   └───────────┘   └──────┬───────┘   └──────────────┘
//!                                           │ StepFiller
//!                                    ┌──────▼───────┐
//!                                    │ WidgetFiller │ input, select,
//!                                    │              │ search-select, …
//!                                    └──────┬───────┘
//!                                           │ PageDriver
//!                              ┌────────────┴────────────┐
//!                       ChromiumDriver (CDP)        MockPage (tests)
//! ```
//!
//! Every interaction waits for observable readiness first; nothing assumes
//! the page has caught up with the previous action.

// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

#[allow(clippy::missing_errors_doc)]
mod browser;
mod driver;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod executor;
mod locator;
#[allow(clippy::missing_errors_doc)]
mod mapping;
mod normalize;
#[allow(clippy::missing_errors_doc)]
mod plan;
mod preview;
#[allow(clippy::missing_errors_doc)]
mod record;
mod result;
#[allow(clippy::missing_errors_doc)]
mod session;
mod settle;
mod tabs;
#[allow(clippy::missing_errors_doc)]
mod wait;
#[allow(clippy::missing_errors_doc)]
mod widget;

/// Deterministic simulated page
///
/// Implements [`PageDriver`] and [`ReviewPanel`] without a browser. Used by
/// the test suites and by offline dry runs.
#[allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
pub mod mock;

pub use browser::{LaunchConfig, CHROMIUM_PATH_ENV, FALLBACK_EXECUTABLES};
#[cfg(feature = "browser")]
pub use browser::ChromiumDriver;
pub use driver::{DomEvent, ElementRef, Key, PageDriver, SelectOption};
pub use executor::{execute_plan, ExecutionLog, FillExecutor, LogEntry, RunMode, StepFiller};
pub use locator::{Locator, LocatorStrategy};
pub use mapping::{
    FieldLocator, FieldMapping, FieldProfile, InputMode, ProfileOverride, SettleRule, TabLocator,
    WidgetKind,
};
pub use normalize::{is_placeholder, normalize, same_text, truncate_query};
pub use plan::{parse_tabs, FillPlan, FillStep, SkipReason, Tab, FILL_ORDER};
pub use preview::{
    conditions_pane, costs_pane, show_pane, vehicle_pane, PreviewDeck, PreviewPane, ReviewPanel,
    CONDITIONS_TITLE, COSTS_TITLE, VEHICLE_TITLE,
};
pub use record::{FieldValue, PolicyField, PolicyRecord};
pub use result::{DriverError, DriverResult, FillError, FillResult};
pub use session::{
    fill_items_modal, form_tabs, parse_stages, readiness_locators, run_session,
    wait_for_any_visible, wait_for_url, SessionInputs, Stage, DEFAULT_READY_SELECTORS,
    INTAKE_URL_PATTERN, ITEMS_MODAL_ID, ITEM_INPUTS,
};
pub use settle::settle;
pub use tabs::{TabNavigator, TabOutcome};
pub use wait::{
    pause, poll_for, poll_forever, poll_until, wait_for_absent, wait_for_element,
    wait_for_interactable, WaitOptions, WaitResult, DEFAULT_ELEMENT_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS, OPERATOR_POLL_INTERVAL_MS,
};
pub use widget::{
    close_open_overlays, date_portion, match_option, strategy_for, AutocompleteFill,
    ComboboxFill, ComboboxTimings, FillContext, FillOptions, FillStrategy, InputFill,
    MaskedDateFill, NativeSelectFill, WidgetFiller,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        execute_plan, ExecutionLog, FieldMapping, FillError, FillOptions, FillPlan, FillResult,
        LogEntry, PageDriver, PolicyField, PolicyRecord, PreviewDeck, ReviewPanel, RunMode,
        SessionInputs, Stage, Tab,
    };
    #[cfg(feature = "browser")]
    pub use super::{ChromiumDriver, LaunchConfig};
}
