use super::{FillContext, FillStrategy};
use crate::driver::{DomEvent, Key};
use crate::locator::Locator;
use crate::normalize::is_placeholder;
use crate::result::FillResult;
use crate::wait::{poll_for, WaitOptions};
use async_trait::async_trait;

/// Rows of any suggestion list the page may render
pub const SUGGESTION_ROWS: &str =
    "[role='listbox'] li, ul.ui-autocomplete li, .select2-results__option";

/// Characters typed before waiting for suggestions
pub const PREFIX_CHARS: usize = 4;

/// Type-ahead input: type a prefix, pick the first visible data suggestion
#[derive(Debug, Clone, Copy, Default)]
pub struct AutocompleteFill;

#[async_trait]
impl FillStrategy for AutocompleteFill {
    async fn fill(&self, ctx: &FillContext<'_>, value: &str) -> FillResult<()> {
        let el = ctx.resolve().await?;
        ctx.driver.clear(&el).await?;
        let prefix: String = value.chars().take(PREFIX_CHARS).collect();
        ctx.driver.send_keys(&el, &prefix).await?;

        let rows = Locator::css(SUGGESTION_ROWS);
        let rows = &rows;
        let wait = WaitOptions::new(ctx.options.element_timeout_ms)
            .with_poll_interval(ctx.options.poll_interval_ms);
        let first = poll_for(wait, || async move {
            for row in ctx.driver.find_all(rows).await? {
                if !ctx.driver.is_displayed(&row).await.unwrap_or(false) {
                    continue;
                }
                if let Ok(text) = ctx.driver.text(&row).await {
                    if !is_placeholder(&text) {
                        return Ok(Some(row));
                    }
                }
            }
            Ok(None)
        })
        .await;

        match first {
            Some(row) => {
                if let Err(err) = ctx.driver.click(&row).await {
                    tracing::debug!(field = %ctx.field, error = %err, "suggestion click failed, using keyboard");
                    ctx.driver.press_key(&el, Key::ArrowDown).await?;
                    ctx.driver.press_key(&el, Key::Enter).await?;
                }
            }
            None => {
                tracing::debug!(field = %ctx.field, "no suggestions rendered");
                ctx.driver.press_key(&el, Key::Enter).await?;
            }
        }

        for event in [DomEvent::Change, DomEvent::Blur] {
            if let Err(err) = ctx.driver.dispatch(&el, event).await {
                tracing::debug!(field = %ctx.field, event = event.name(), error = %err, "dispatch failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mapping::{FieldLocator, WidgetKind};
    use crate::mock::{AutocompleteSim, MockPage};
    use crate::widget::FillOptions;

    fn target() -> FieldLocator {
        FieldLocator::new("marca", Locator::id("Marca"), WidgetKind::Autocomplete)
    }

    fn ctx<'a>(page: &'a MockPage, target: &'a FieldLocator) -> FillContext<'a> {
        FillContext {
            driver: page,
            field: "marca",
            target,
            options: FillOptions::default().with_element_timeout(1_000),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_types_prefix_and_clicks_first_row() {
        let page = MockPage::new();
        page.add_autocomplete(
            AutocompleteSim::new("Marca", &["VOLKSWAGEN", "VOLVO"]).with_latency_ms(300),
        );
        let target = target();
        AutocompleteFill.fill(&ctx(&page, &target), "VOLKSWAGEN").await.unwrap();
        assert!(page.was_called("send_keys"));
        assert!(page
            .history()
            .contains(&"send_keys:#Marca=VOLK".to_string()));
        assert_eq!(page.value_of("Marca").unwrap(), "VOLKSWAGEN");
        assert!(page.history().contains(&"dispatch:#Marca=blur".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_when_no_list() {
        let page = MockPage::new();
        page.add_autocomplete(AutocompleteSim::new("Marca", &["FORD"]));
        let target = target();
        AutocompleteFill.fill(&ctx(&page, &target), "ZANELLA").await.unwrap();
        assert_eq!(page.value_of("Marca").unwrap(), "ZANE");
        assert!(page.history().contains(&"press_key:#Marca=Enter".to_string()));
        assert!(page.history().contains(&"dispatch:#Marca=change".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_fallback_when_click_fails() {
        let page = MockPage::new();
        page.add_autocomplete(AutocompleteSim::new("Marca", &["FIAT"]));
        let target = target();
        // clear and send_keys pass, the row click goes stale
        page.inject_stale_after(2, 1);
        AutocompleteFill.fill(&ctx(&page, &target), "FIAT").await.unwrap();
        assert!(page.history().contains(&"press_key:#Marca=ArrowDown".to_string()));
        assert_eq!(page.value_of("Marca").unwrap(), "FIAT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_placeholder_row() {
        let page = MockPage::new();
        page.add_autocomplete(AutocompleteSim::new("Marca", &["Buscando fiat...", "FIAT"]));
        let target = target();
        AutocompleteFill.fill(&ctx(&page, &target), "FIAT").await.unwrap();
        assert_eq!(page.value_of("Marca").unwrap(), "FIAT");
    }
}
