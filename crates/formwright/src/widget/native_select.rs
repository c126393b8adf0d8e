use super::{FillContext, FillStrategy};
use crate::driver::SelectOption;
use crate::normalize::normalize;
use crate::result::{FillError, FillResult};
use async_trait::async_trait;

/// Index of the option matching `target`.
///
/// First pass: normalized text or value equals the target. Second pass:
/// normalized text or value contains it. An empty target matches nothing.
#[must_use]
pub fn match_option(options: &[SelectOption], target: &str) -> Option<usize> {
    let want = normalize(target);
    if want.is_empty() {
        return None;
    }
    let norm: Vec<(String, String)> = options
        .iter()
        .map(|o| (normalize(&o.text), normalize(&o.value)))
        .collect();
    norm.iter()
        .position(|(text, value)| *text == want || *value == want)
        .or_else(|| {
            norm.iter()
                .position(|(text, value)| text.contains(&want) || value.contains(&want))
        })
}

/// Native `<select>`: match an option, select it, fire change
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSelectFill;

#[async_trait]
impl FillStrategy for NativeSelectFill {
    async fn fill(&self, ctx: &FillContext<'_>, value: &str) -> FillResult<()> {
        let el = ctx.resolve().await?;
        let options = ctx.driver.options(&el).await?;
        let index = match_option(&options, value).ok_or_else(|| FillError::NoMatchingOption {
            value: value.to_string(),
        })?;
        tracing::debug!(field = %ctx.field, index, option = %options[index].text, "option matched");
        ctx.driver.select_index(&el, index).await?;
        Ok(())
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

    fn opts(texts: &[&str]) -> Vec<SelectOption> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| SelectOption::new(*t, i.to_string()))
            .collect()
    }

    mod matcher_tests {
        use super::*;

        #[test]
        fn test_exact_normalized_match() {
            let options = opts(&["Seleccione", "Consumidor Final", "Responsable Inscripto"]);
            assert_eq!(match_option(&options, "consumidor final"), Some(1));
            assert_eq!(match_option(&options, "RESPONSABLE INSCRIPTO"), Some(2));
        }

        #[test]
        fn test_exact_beats_earlier_substring() {
            let options = opts(&["Pesos Argentinos", "Pesos"]);
            assert_eq!(match_option(&options, "pesos"), Some(1));
        }

        #[test]
        fn test_substring_fallback() {
            let options = opts(&["Seleccione", "Anual renovable"]);
            assert_eq!(match_option(&options, "anual"), Some(1));
        }

        #[test]
        fn test_matches_on_value() {
            let options = vec![
                SelectOption::new("Seleccione", ""),
                SelectOption::new("Dólar", "USD"),
            ];
            assert_eq!(match_option(&options, "usd"), Some(1));
            assert_eq!(match_option(&options, "dolar"), Some(1));
        }

        #[test]
        fn test_no_match_and_empty_target() {
            let options = opts(&["Seleccione", "Mensual"]);
            assert_eq!(match_option(&options, "trimestral"), None);
            assert_eq!(match_option(&options, "  "), None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_selects_matching_option() {
        let page = MockPage::new();
        page.add_select("Moneda", &[("Seleccione", ""), ("Pesos", "1"), ("Dólares", "2")]);
        let target = FieldLocator::new("moneda", Locator::id("Moneda"), WidgetKind::NativeSelect);
        let ctx = FillContext {
            driver: &page,
            field: "moneda",
            target: &target,
            options: FillOptions::default(),
        };
        NativeSelectFill.fill(&ctx, "DOLARES").await.unwrap();
        assert_eq!(page.value_of("Moneda").unwrap(), "2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_option_raises() {
        let page = MockPage::new();
        page.add_select("Moneda", &[("Seleccione", ""), ("Pesos", "1")]);
        let target = FieldLocator::new("moneda", Locator::id("Moneda"), WidgetKind::NativeSelect);
        let ctx = FillContext {
            driver: &page,
            field: "moneda",
            target: &target,
            options: FillOptions::default(),
        };
        let err = NativeSelectFill.fill(&ctx, "Euros").await.unwrap_err();
        assert!(matches!(err, FillError::NoMatchingOption { value } if value == "Euros"));
        assert!(!page.was_called("select_index"));
    }
}
