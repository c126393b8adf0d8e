//! Widget Filler.
//!
//! One [`FillStrategy`] per [`WidgetKind`]. The filler resolves the display
//! value (translation tables apply to native selects only), picks the
//! strategy and runs it against the page.
//!
//! ```text
//! WidgetFiller::fill
//!   ├── profile.date_mask      → MaskedDateFill
//!   └── WidgetKind::strategy()
//!         ├── Input             → InputFill
//!         ├── NativeSelect      → NativeSelectFill
//!         ├── CompositeSelector → ComboboxFill
//!         └── Autocomplete      → AutocompleteFill
//! ```

mod autocomplete;
mod combobox;
mod date;
mod input;
mod native_select;

pub use autocomplete::AutocompleteFill;
pub use combobox::{close_open_overlays, ComboboxFill, ComboboxTimings};
pub use date::{date_portion, MaskedDateFill};
pub use input::InputFill;
pub use native_select::{match_option, NativeSelectFill};

use crate::driver::{ElementRef, PageDriver};
use crate::executor::StepFiller;
use crate::mapping::{FieldLocator, FieldMapping, WidgetKind};
use crate::plan::FillStep;
use crate::record::FieldValue;
use crate::result::FillResult;
use crate::wait::{self, WaitOptions, DEFAULT_ELEMENT_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS};
use async_trait::async_trait;

/// Caller-controlled timing for a fill session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOptions {
    /// How long to wait for a field's element to appear
    pub element_timeout_ms: u64,
    /// Polling interval for element waits
    pub poll_interval_ms: u64,
    /// Prefer speed: shorter result and verification waits
    pub fast: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            element_timeout_ms: DEFAULT_ELEMENT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            fast: false,
        }
    }
}

impl FillOptions {
    #[must_use]
    pub const fn with_element_timeout(mut self, ms: u64) -> Self {
        self.element_timeout_ms = ms;
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    #[must_use]
    pub const fn fast(mut self) -> Self {
        self.fast = true;
        self
    }

    /// Wait options for element lookups
    #[must_use]
    pub const fn element_wait(&self) -> WaitOptions {
        WaitOptions::new(self.element_timeout_ms).with_poll_interval(self.poll_interval_ms)
    }
}

/// Everything a strategy needs to fill one field
#[derive(Clone, Copy)]
pub struct FillContext<'a> {
    pub driver: &'a dyn PageDriver,
    /// Field name, for logging
    pub field: &'a str,
    pub target: &'a FieldLocator,
    pub options: FillOptions,
}

impl std::fmt::Debug for FillContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FillContext")
            .field("field", &self.field)
            .field("target", &self.target)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl FillContext<'_> {
    /// Wait for the field's element and scroll it into view
    pub async fn resolve(&self) -> FillResult<ElementRef> {
        let el =
            wait::wait_for_element(self.driver, &self.target.locator, self.options.element_wait())
                .await?;
        if let Err(err) = self.driver.scroll_into_view(&el).await {
            tracing::debug!(field = %self.field, error = %err, "scroll into view failed");
        }
        Ok(el)
    }
}

/// Fill protocol for one widget kind
#[async_trait]
pub trait FillStrategy: Send + Sync {
    /// Put `value` into the field, raising on irrecoverable failure
    async fn fill(&self, ctx: &FillContext<'_>, value: &str) -> FillResult<()>;
}

impl WidgetKind {
    /// The fill protocol for this kind
    #[must_use]
    pub fn strategy(self) -> &'static dyn FillStrategy {
        match self {
            Self::Input => &InputFill,
            Self::NativeSelect => &NativeSelectFill,
            Self::CompositeSelector => &ComboboxFill,
            Self::Autocomplete => &AutocompleteFill,
        }
    }
}

/// Strategy for a configured field; the date-mask bypass wins over the kind
#[must_use]
pub fn strategy_for(target: &FieldLocator) -> &'static dyn FillStrategy {
    if target.profile.date_mask {
        &MaskedDateFill
    } else {
        target.kind.strategy()
    }
}

/// Fills fields on one page using one mapping
pub struct WidgetFiller<'a> {
    driver: &'a dyn PageDriver,
    mapping: &'a FieldMapping,
    options: FillOptions,
}

impl std::fmt::Debug for WidgetFiller<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetFiller")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> WidgetFiller<'a> {
    #[must_use]
    pub fn new(driver: &'a dyn PageDriver, mapping: &'a FieldMapping, options: FillOptions) -> Self {
        Self {
            driver,
            mapping,
            options,
        }
    }

    #[must_use]
    pub const fn options(&self) -> FillOptions {
        self.options
    }

    /// Fill `field` at `target` with `value`
    pub async fn fill(
        &self,
        field: &str,
        target: &FieldLocator,
        value: &FieldValue,
    ) -> FillResult<()> {
        let text = match target.kind {
            WidgetKind::NativeSelect => self.mapping.translate(field, value),
            _ => value.to_string(),
        };
        let ctx = FillContext {
            driver: self.driver,
            field,
            target,
            options: self.options,
        };
        tracing::debug!(field, kind = %target.kind, locator = %target.locator, "filling");
        strategy_for(target).fill(&ctx, &text).await
    }
}

#[async_trait]
impl<'a> StepFiller for WidgetFiller<'a> {
    async fn fill_step(&self, step: &FillStep) -> FillResult<()> {
        self.fill(step.field.as_str(), &step.target, &step.value).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use crate::mock::MockPage;
    use crate::result::FillError;

    #[test]
    fn test_fill_options_defaults() {
        let opts = FillOptions::default();
        assert_eq!(opts.element_timeout_ms, 5_000);
        assert_eq!(opts.poll_interval_ms, 50);
        assert!(!opts.fast);
        assert!(FillOptions::default().fast().fast);
        assert_eq!(opts.with_element_timeout(800).element_wait().timeout_ms, 800);
    }

    #[tokio::test(start_paused = true)]
    async fn test_date_mask_overrides_kind() {
        let page = MockPage::new();
        page.add_input("FechaInicio");
        let mapping = FieldMapping::default();
        let filler = WidgetFiller::new(&page, &mapping, FillOptions::default());
        let target =
            FieldLocator::new("inicio_vigencia", Locator::id("FechaInicio"), WidgetKind::Input);
        filler
            .fill("inicio_vigencia", &target, &FieldValue::from("01/03/2025 00:00"))
            .await
            .unwrap();
        assert_eq!(page.value_of("FechaInicio").unwrap(), "01/03/2025");
        assert!(!page.was_called("send_keys"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_select_uses_translation() {
        let page = MockPage::new();
        page.add_select(
            "TipoIva",
            &[("Seleccione", ""), ("Consumidor Final", "5"), ("Exento", "6")],
        );
        let mapping = FieldMapping::default()
            .with_field(
                "tipo_iva",
                FieldLocator::new("tipo_iva", Locator::id("TipoIva"), WidgetKind::NativeSelect),
            )
            .with_translation("tipo_iva", "CF", "Consumidor Final");
        let filler = WidgetFiller::new(&page, &mapping, FillOptions::default());
        let target = mapping.locator_for("tipo_iva").unwrap();
        filler
            .fill("tipo_iva", target, &FieldValue::from("CF"))
            .await
            .unwrap();
        assert_eq!(page.value_of("TipoIva").unwrap(), "5");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_element_is_field_failure() {
        let page = MockPage::new();
        let mapping = FieldMapping::default();
        let filler =
            WidgetFiller::new(&page, &mapping, FillOptions::default().with_element_timeout(300));
        let target = FieldLocator::new("patente", Locator::id("Patente"), WidgetKind::Input);
        let err = filler
            .fill("patente", &target, &FieldValue::from("AB123CD"))
            .await
            .unwrap_err();
        assert!(matches!(err, FillError::ElementNotFound { ms: 300, .. }));
    }
}
