use super::{FillContext, FillStrategy};
use crate::driver::{DomEvent, Key};
use crate::result::FillResult;
use async_trait::async_trait;

/// Date part of a "date time" value
#[must_use]
pub fn date_portion(value: &str) -> &str {
    let value = value.trim();
    value.split_once(' ').map_or(value, |(date, _)| date)
}

/// Masked date control: write the value directly so the input mask never
/// sees keystrokes. Falls back to typing when the direct write is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskedDateFill;

#[async_trait]
impl FillStrategy for MaskedDateFill {
    async fn fill(&self, ctx: &FillContext<'_>, value: &str) -> FillResult<()> {
        let el = ctx.resolve().await?;
        let date = date_portion(value);
        match ctx
            .driver
            .set_value(&el, date, &[DomEvent::Input, DomEvent::Change])
            .await
        {
            Ok(()) => {
                if let Err(err) = ctx.driver.dispatch(&el, DomEvent::Blur).await {
                    tracing::debug!(field = %ctx.field, error = %err, "blur failed");
                }
                Ok(())
            }
            Err(err) => {
                tracing::debug!(field = %ctx.field, error = %err, "direct write rejected, typing");
                if let Err(err) = ctx.driver.clear(&el).await {
                    tracing::debug!(field = %ctx.field, error = %err, "clear failed");
                }
                ctx.driver.send_keys(&el, date).await?;
                ctx.driver.press_key(&el, Key::Tab).await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use crate::mapping::{FieldLocator, WidgetKind};
    use crate::mock::MockPage;
    use crate::widget::FillOptions;

    #[test]
    fn test_date_portion() {
        assert_eq!(date_portion("01/03/2025 12:00"), "01/03/2025");
        assert_eq!(date_portion(" 01/03/2025 "), "01/03/2025");
        assert_eq!(date_portion("01/03/2025"), "01/03/2025");
        assert_eq!(date_portion(""), "");
    }

    fn target() -> FieldLocator {
        FieldLocator::new("inicio_vigencia", Locator::id("FechaInicio"), WidgetKind::Input)
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_write() {
        let page = MockPage::new();
        page.add_input("FechaInicio");
        let target = target();
        let ctx = FillContext {
            driver: &page,
            field: "inicio_vigencia",
            target: &target,
            options: FillOptions::default(),
        };
        MaskedDateFill.fill(&ctx, "15/02/2025 00:00:00").await.unwrap();
        assert_eq!(page.value_of("FechaInicio").unwrap(), "15/02/2025");
        assert!(page.history().contains(&"dispatch:#FechaInicio=blur".to_string()));
        assert!(!page.was_called("send_keys"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_typing() {
        let page = MockPage::new();
        page.add_input("FechaInicio");
        page.reject_direct_writes("FechaInicio");
        let target = target();
        let ctx = FillContext {
            driver: &page,
            field: "inicio_vigencia",
            target: &target,
            options: FillOptions::default(),
        };
        MaskedDateFill.fill(&ctx, "15/02/2025 00:00").await.unwrap();
        assert_eq!(page.value_of("FechaInicio").unwrap(), "15/02/2025");
        assert!(page
            .history()
            .contains(&"press_key:#FechaInicio=Tab".to_string()));
    }
}
