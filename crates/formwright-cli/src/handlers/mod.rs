//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains the execution logic for one CLI command
//! plus the pure helpers it is built from.

pub mod fill;
pub mod plan;

pub use fill::{fill_options, prepare, run_fill, FillJob};
pub use plan::{build_plan, dry_run_log, format_step, load_inputs, render_plan_text, run_plan};
