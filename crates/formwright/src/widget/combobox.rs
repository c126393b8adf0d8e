//! Search-select protocol.
//!
//! Drives a composite selector: a hidden `<select>` holding the
//! authoritative value, plus a visual control that opens a search box and
//! an asynchronously populated result list.
//!
//! ```text
//! requires guard ─► ┌───────────── attempt (≤ 3) ─────────────┐
//!                   │ close stale ► open ► query ► results    │
//!                   │ ► commit (key / click) ► verify         │
//!                   │ ► re-click ► force ► blur               │
//!                   └─────────── transient? retry ────────────┘
//! ```
//!
//! Every attempt ends with the focused element blurred. Failures that a
//! fresh attempt may fix (stale handles, controls not yet interactable, an
//! unverified commit) restart the attempt; anything else is returned as is.

use super::{FillContext, FillStrategy};
use crate::driver::{DomEvent, ElementRef, Key, PageDriver};
use crate::locator::Locator;
use crate::mapping::InputMode;
use crate::normalize::{is_placeholder, normalize, same_text, truncate_query};
use crate::result::{DriverError, DriverResult, FillError, FillResult};
use crate::wait::{self, pause, poll_for, poll_until, WaitOptions, WaitResult};
use async_trait::async_trait;

/// Search box of the currently open dropdown
const OPEN_SEARCH: &str = ".select2-container--open .select2-search__field";
/// Result list of the currently open dropdown
const OPEN_RESULTS: &str = ".select2-container--open .select2-results__options";
/// Marker present while any dropdown is open
const OPEN_MARKER: &str = ".select2-container--open";
/// Result rows that are not status messages
const RESULT_ROWS: &str = ".select2-results__option:not(.select2-results__message)";
/// Keyboard-highlighted row
const HIGHLIGHTED_ROW: &str = ".select2-results__option--highlighted";

/// Timing constants of the protocol, in milliseconds unless noted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboboxTimings {
    /// Attempts before giving up (count)
    pub attempts: u32,
    /// Pause between attempts
    pub retry_pause_ms: u64,
    /// Deadline for the prerequisite guard
    pub prerequisite_timeout_ms: u64,
    pub prerequisite_poll_ms: u64,
    /// Result wait
    pub result_timeout_ms: u64,
    pub fast_result_timeout_ms: u64,
    pub result_poll_ms: u64,
    /// Pause once results are visible
    pub post_result_pause_ms: u64,
    pub fast_post_result_pause_ms: u64,
    /// Rendered-text verification
    pub verify_timeout_ms: u64,
    pub fast_verify_timeout_ms: u64,
    pub verify_poll_ms: u64,
    /// Char-by-char input
    pub pre_typing_pause_ms: u64,
    pub char_delay_ms: u64,
    /// Direct-set input: pause after the write, then for the remote search
    pub direct_set_pause_ms: u64,
    pub remote_search_pause_ms: u64,
    /// Confirm key: pause before focusing, after focusing, after the key
    pub confirm_pause_ms: u64,
    pub focus_pause_ms: u64,
    pub key_settle_ms: u64,
    /// Pause after clicking a row
    pub click_settle_ms: u64,
    /// Hidden-value checks, including the first one (count)
    pub hidden_value_checks: u32,
    pub hidden_value_pause_ms: u64,
}

impl ComboboxTimings {
    pub const STANDARD: Self = Self {
        attempts: 3,
        retry_pause_ms: 150,
        prerequisite_timeout_ms: 4_000,
        prerequisite_poll_ms: 100,
        result_timeout_ms: 3_000,
        fast_result_timeout_ms: 800,
        result_poll_ms: 50,
        post_result_pause_ms: 150,
        fast_post_result_pause_ms: 50,
        verify_timeout_ms: 2_000,
        fast_verify_timeout_ms: 600,
        verify_poll_ms: 50,
        pre_typing_pause_ms: 500,
        char_delay_ms: 80,
        direct_set_pause_ms: 200,
        remote_search_pause_ms: 2_000,
        confirm_pause_ms: 200,
        focus_pause_ms: 50,
        key_settle_ms: 150,
        click_settle_ms: 150,
        hidden_value_checks: 3,
        hidden_value_pause_ms: 200,
    };
}

impl Default for ComboboxTimings {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Composite selector strategy with the standard timings
#[derive(Debug, Clone, Copy, Default)]
pub struct ComboboxFill;

#[async_trait]
impl FillStrategy for ComboboxFill {
    async fn fill(&self, ctx: &FillContext<'_>, value: &str) -> FillResult<()> {
        fill_with(ctx, value, &ComboboxTimings::STANDARD).await
    }
}

/// Run the protocol with explicit timings
pub async fn fill_with(
    ctx: &FillContext<'_>,
    value: &str,
    timings: &ComboboxTimings,
) -> FillResult<()> {
    let protocol = SearchSelect::new(ctx, value, timings);
    protocol.guard_prerequisite().await;

    let mut last: Option<FillError> = None;
    for attempt in 1..=timings.attempts {
        match protocol.attempt().await {
            Ok(()) => {
                tracing::debug!(field = %ctx.field, attempt, "selection committed");
                return Ok(());
            }
            Err(err) if err.is_transient() => {
                tracing::debug!(field = %ctx.field, attempt, error = %err, "attempt failed, retrying");
                last = Some(err);
                if attempt < timings.attempts {
                    pause(timings.retry_pause_ms).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(FillError::RetriesExhausted {
        attempts: timings.attempts,
        last: last.map(|e| e.to_string()).unwrap_or_default(),
    })
}

/// Close any open dropdown: Escape in its search box, then wait for its
/// result list to go away
pub async fn close_open_overlays(driver: &dyn PageDriver, options: WaitOptions) -> WaitResult {
    let search = Locator::css(OPEN_SEARCH);
    if let Ok(open) = driver.find_all(&search).await {
        if let Some(field) = open.last() {
            if let Err(err) = driver.press_key(field, Key::Escape).await {
                tracing::debug!(error = %err, "escape on open search box failed");
            }
        }
    }
    wait::wait_for_absent(driver, &Locator::css(OPEN_RESULTS), options).await
}

/// Index of the row to commit.
///
/// Exact normalized match on the full value or the query, then substring
/// containment of either, then the highlighted row, then the first row.
#[must_use]
pub fn pick_row(
    rows: &[String],
    value: &str,
    query: &str,
    highlighted: Option<usize>,
) -> Option<usize> {
    if rows.is_empty() {
        return None;
    }
    let full = normalize(value);
    let short = normalize(query);
    let norm: Vec<String> = rows.iter().map(|r| normalize(r)).collect();
    norm.iter()
        .position(|r| *r == full || *r == short)
        .or_else(|| {
            norm.iter().position(|r| {
                (!full.is_empty() && r.contains(&full)) || (!short.is_empty() && r.contains(&short))
            })
        })
        .or(highlighted.filter(|h| *h < rows.len()))
        .or(Some(0))
}

/// Per-field deadline. A profile override replaces the default, but in
/// fast mode the fast value is an upper bound on it.
#[must_use]
pub fn field_timeout(profile: Option<u64>, normal_ms: u64, fast_ms: u64, fast: bool) -> u64 {
    match (profile, fast) {
        (Some(ms), true) => ms.min(fast_ms),
        (None, true) => fast_ms,
        (Some(ms), false) => ms,
        (None, false) => normal_ms,
    }
}

#[derive(Debug, Clone)]
struct Row {
    el: ElementRef,
    text: String,
}

#[derive(Debug, Clone)]
struct Chosen {
    el: ElementRef,
    text: String,
    /// Option value carried by the row, for forcing
    value: Option<String>,
}

/// One field's protocol state
struct SearchSelect<'a> {
    ctx: &'a FillContext<'a>,
    value: &'a str,
    query: &'a str,
    timings: &'a ComboboxTimings,
    /// Rows scoped to this widget's result list, when the holder has an id
    scoped_rows: Option<Locator>,
    /// This widget's rendered selection, when the holder has an id
    rendered: Option<Locator>,
}

impl<'a> SearchSelect<'a> {
    fn new(ctx: &'a FillContext<'a>, value: &'a str, timings: &'a ComboboxTimings) -> Self {
        let query = if ctx.target.profile.query_truncation {
            truncate_query(value)
        } else {
            value
        };
        let id = ctx.target.locator.element_id();
        let scoped_rows = id.and_then(|id| {
            Locator::id(format!("select2-{id}-results"))
                .to_css()
                .map(|results| Locator::css(format!("{results} {RESULT_ROWS}")))
        });
        let rendered = id.map(|id| Locator::id(format!("select2-{id}-container")));
        Self {
            ctx,
            value,
            query,
            timings,
            scoped_rows,
            rendered,
        }
    }

    fn driver(&self) -> &'a dyn PageDriver {
        self.ctx.driver
    }

    fn result_timeout_ms(&self) -> u64 {
        field_timeout(
            self.ctx.target.profile.result_timeout_ms,
            self.timings.result_timeout_ms,
            self.timings.fast_result_timeout_ms,
            self.ctx.options.fast,
        )
    }

    fn verify_timeout_ms(&self) -> u64 {
        field_timeout(
            self.ctx.target.profile.verify_timeout_ms,
            self.timings.verify_timeout_ms,
            self.timings.fast_verify_timeout_ms,
            self.ctx.options.fast,
        )
    }

    /// Block until the prerequisite holder carries a value and this
    /// holder is enabled. Proceeds anyway at the deadline.
    async fn guard_prerequisite(&self) {
        let Some(required) = &self.ctx.target.profile.requires else {
            return;
        };
        let driver = self.driver();
        let holder = &self.ctx.target.locator;
        let options = WaitOptions::new(self.timings.prerequisite_timeout_ms)
            .with_poll_interval(self.timings.prerequisite_poll_ms);
        let ready = poll_until(options, "prerequisite value", || async move {
            let (Some(req), Some(own)) = (driver.find(required).await?, driver.find(holder).await?)
            else {
                return Ok(false);
            };
            Ok(!driver.value(&req).await?.trim().is_empty() && driver.is_enabled(&own).await?)
        })
        .await;
        if !ready.success {
            tracing::debug!(field = %self.ctx.field, requires = %required, "prerequisite not ready, opening anyway");
        }
    }

    async fn attempt(&self) -> FillResult<()> {
        let outcome = self.attempt_inner().await;
        if let Err(err) = self.driver().blur_active().await {
            tracing::debug!(field = %self.ctx.field, error = %err, "blur failed");
        }
        outcome
    }

    async fn attempt_inner(&self) -> FillResult<()> {
        let driver = self.driver();
        let element_wait = self.ctx.options.element_wait();

        close_open_overlays(driver, element_wait).await;
        let holder = self.ctx.resolve().await?;
        let control = driver
            .adjacent(&holder, "select2")
            .await?
            .ok_or_else(|| DriverError::not_interactable("search-select control not rendered"))?;

        let search = self.open(&control).await?;
        if let Some(search) = &search {
            self.deliver_query(search).await?;
        }

        let rows_wait = WaitOptions::new(self.result_timeout_ms())
            .with_poll_interval(self.timings.result_poll_ms);
        let results = poll_until(rows_wait, "result rows", || async move {
            Ok(!self.real_rows().await?.is_empty())
        })
        .await;
        pause(if self.ctx.options.fast {
            self.timings.fast_post_result_pause_ms
        } else {
            self.timings.post_result_pause_ms
        })
        .await;
        tracing::debug!(field = %self.ctx.field, query = %self.query, found = results.success, "results wait done");

        let chosen = self.choose().await?.ok_or_else(|| FillError::Unverified {
            value: self.value.to_string(),
            detail: format!("no results for '{}'", self.query),
        })?;
        tracing::debug!(field = %self.ctx.field, row = %chosen.text, "row chosen");

        if self.commit(&holder, &control, search.as_ref(), &chosen).await? {
            Ok(())
        } else {
            let rendered = self.rendered_text(&control).await.unwrap_or_default();
            let hidden = driver.value(&holder).await.unwrap_or_default();
            Err(FillError::Unverified {
                value: self.value.to_string(),
                detail: format!("rendered '{rendered}', holder value '{hidden}'"),
            })
        }
    }

    /// Open the dropdown; returns its search box, if it has one
    async fn open(&self, control: &ElementRef) -> FillResult<Option<ElementRef>> {
        let driver = self.driver();
        let element_wait = self.ctx.options.element_wait();
        let selection = driver
            .find_within(control, &Locator::css(".select2-selection"))
            .await?
            .ok_or_else(|| DriverError::not_interactable("search-select has no selection box"))?;
        if !wait::wait_for_interactable(driver, &selection, element_wait).await.success {
            return Err(DriverError::not_interactable("search-select is not interactable").into());
        }
        driver.pointer_click(&selection).await?;

        let marker = Locator::css(OPEN_MARKER);
        let marker = &marker;
        if poll_for(element_wait, || async move { driver.find(marker).await })
            .await
            .is_none()
        {
            return Err(DriverError::not_interactable("dropdown did not open").into());
        }
        tracing::debug!(field = %self.ctx.field, "dropdown open");

        let search = driver.find_all(&Locator::css(OPEN_SEARCH)).await?.pop();
        if let Some(search) = &search {
            if let Err(err) = driver.focus(search).await {
                tracing::debug!(field = %self.ctx.field, error = %err, "search box focus failed");
            }
        }
        Ok(search)
    }

    async fn deliver_query(&self, search: &ElementRef) -> FillResult<()> {
        let driver = self.driver();
        if let Err(err) = driver.clear(search).await {
            tracing::debug!(field = %self.ctx.field, error = %err, "search box clear failed");
        }
        match self.ctx.target.profile.input_mode {
            InputMode::Batch => driver.send_keys(search, self.query).await?,
            InputMode::CharByChar => {
                pause(self.timings.pre_typing_pause_ms).await;
                for ch in self.query.chars() {
                    driver.send_keys(search, &ch.to_string()).await?;
                    for event in [DomEvent::Input, DomEvent::KeyUp(ch)] {
                        if let Err(err) = driver.dispatch(search, event).await {
                            tracing::debug!(field = %self.ctx.field, error = %err, "keystroke event failed");
                        }
                    }
                    pause(self.timings.char_delay_ms).await;
                }
            }
            InputMode::DirectSet => {
                match driver.set_value(search, self.query, &[DomEvent::Input]).await {
                    Ok(()) => pause(self.timings.direct_set_pause_ms).await,
                    Err(err) => {
                        tracing::debug!(field = %self.ctx.field, error = %err, "direct set failed, typing");
                        driver.send_keys(search, self.query).await?;
                    }
                }
                pause(self.timings.remote_search_pause_ms).await;
            }
        }
        tracing::debug!(field = %self.ctx.field, query = %self.query, mode = ?self.ctx.target.profile.input_mode, "query delivered");
        Ok(())
    }

    /// Result rows with real data, scoped to this widget when possible
    async fn real_rows(&self) -> DriverResult<Vec<Row>> {
        let driver = self.driver();
        let mut els = match &self.scoped_rows {
            Some(scoped) => driver.find_all(scoped).await?,
            None => Vec::new(),
        };
        if els.is_empty() {
            els = driver.find_all(&Locator::css(RESULT_ROWS)).await?;
        }
        let mut rows = Vec::with_capacity(els.len());
        for el in els {
            if let Ok(text) = driver.text(&el).await {
                if !is_placeholder(&text) {
                    rows.push(Row { el, text });
                }
            }
        }
        Ok(rows)
    }

    async fn choose(&self) -> FillResult<Option<Chosen>> {
        let driver = self.driver();
        let rows = self.real_rows().await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let highlighted = driver
            .find_all(&Locator::css(HIGHLIGHTED_ROW))
            .await
            .unwrap_or_default()
            .into_iter()
            .find_map(|h| rows.iter().position(|r| r.el == h));
        let texts: Vec<String> = rows.iter().map(|r| r.text.clone()).collect();
        let Some(index) = pick_row(&texts, self.value, self.query, highlighted) else {
            return Ok(None);
        };
        let row = rows[index].clone();
        let value = match driver.attribute(&row.el, "data-select2-id").await {
            Ok(Some(v)) if !v.is_empty() => Some(v),
            _ => driver.attribute(&row.el, "id").await.ok().flatten(),
        };
        Ok(Some(Chosen {
            el: row.el,
            text: row.text,
            value,
        }))
    }

    /// Commit `chosen` and verify; true once the selection is observed
    async fn commit(
        &self,
        holder: &ElementRef,
        control: &ElementRef,
        search: Option<&ElementRef>,
        chosen: &Chosen,
    ) -> FillResult<bool> {
        let driver = self.driver();
        let profile = &self.ctx.target.profile;
        let targets = [self.value, self.query, chosen.text.as_str()];

        let mut keyed = false;
        if profile.confirm_with_key {
            if let Some(search) = search {
                keyed = self.confirm_with_key(search).await
                    && self.committed(holder, control, &targets).await.unwrap_or(false);
            }
        }
        if !keyed {
            driver.pointer_click(&chosen.el).await?;
            pause(self.timings.click_settle_ms).await;
        }

        let verify = WaitOptions::new(self.verify_timeout_ms())
            .with_poll_interval(self.timings.verify_poll_ms);
        let targets = &targets;
        let verified = poll_until(verify, "committed selection", || async move {
            self.committed(holder, control, targets).await
        })
        .await;
        if verified.success {
            return Ok(true);
        }

        if profile.verify_hidden_value {
            for check in 1..self.timings.hidden_value_checks {
                pause(self.timings.hidden_value_pause_ms).await;
                if let Err(err) = driver.pointer_click(&chosen.el).await {
                    tracing::debug!(field = %self.ctx.field, check, error = %err, "re-click failed");
                }
                pause(self.timings.hidden_value_pause_ms).await;
                if self.committed(holder, control, targets).await.unwrap_or(false) {
                    return Ok(true);
                }
            }
        }

        if profile.force_fallback {
            if let Some(value) = chosen.value.as_deref().filter(|v| !v.is_empty()) {
                tracing::debug!(field = %self.ctx.field, value, "forcing selection");
                if driver.force_selection(holder, value, &chosen.text).await? {
                    pause(self.timings.click_settle_ms).await;
                    return Ok(self.committed(holder, control, targets).await.unwrap_or(false));
                }
            }
        }
        Ok(false)
    }

    async fn confirm_with_key(&self, search: &ElementRef) -> bool {
        let driver = self.driver();
        pause(self.timings.confirm_pause_ms).await;
        if driver.focus(search).await.is_err() {
            return false;
        }
        pause(self.timings.focus_pause_ms).await;
        if !driver.is_focused(search).await.unwrap_or(false) {
            return false;
        }
        if let Err(err) = driver.press_key(search, Key::Enter).await {
            tracing::debug!(field = %self.ctx.field, error = %err, "confirm key failed");
            return false;
        }
        pause(self.timings.key_settle_ms).await;
        true
    }

    async fn rendered_text(&self, control: &ElementRef) -> DriverResult<String> {
        let driver = self.driver();
        let el = match &self.rendered {
            Some(rendered) => driver.find(rendered).await?,
            None => {
                driver
                    .find_within(control, &Locator::css(".select2-selection__rendered"))
                    .await?
            }
        };
        match el {
            Some(el) => driver.text(&el).await,
            None => Ok(String::new()),
        }
    }

    /// Whether the widget shows a committed selection.
    ///
    /// With hidden-value verification the holder must carry a real value
    /// and the rendered text must not be a placeholder; otherwise the
    /// rendered text must match the value, the query or the chosen row.
    async fn committed(
        &self,
        holder: &ElementRef,
        control: &ElementRef,
        targets: &[&str],
    ) -> DriverResult<bool> {
        let text = self.rendered_text(control).await?;
        if is_placeholder(&text) {
            return Ok(false);
        }
        if self.ctx.target.profile.verify_hidden_value {
            let hidden = self.driver().value(holder).await?;
            let hidden = hidden.trim();
            return Ok(!hidden.is_empty() && hidden != "0");
        }
        Ok(targets.iter().any(|t| same_text(t, &text)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mapping::{FieldLocator, FieldProfile, WidgetKind};
    use crate::mock::{ComboboxSim, MockPage};
    use crate::widget::FillOptions;

    fn target(field: &str, id: &str) -> FieldLocator {
        FieldLocator::new(field, Locator::id(id), WidgetKind::CompositeSelector)
    }

    fn ctx<'a>(page: &'a MockPage, field: &'a str, target: &'a FieldLocator) -> FillContext<'a> {
        FillContext {
            driver: page,
            field,
            target,
            options: FillOptions::default(),
        }
    }

    mod pick_tests {
        use super::*;

        fn rows(texts: &[&str]) -> Vec<String> {
            texts.iter().map(ToString::to_string).collect()
        }

        #[test]
        fn test_exact_match_wins() {
            let r = rows(&["ACME S.A. SUCURSAL", "acme s.a."]);
            assert_eq!(pick_row(&r, "ACME S.A.", "ACME S.A.", None), Some(1));
        }

        #[test]
        fn test_exact_match_on_truncated_query() {
            let r = rows(&["GARCIA, ANA", "Pérez Juan"]);
            assert_eq!(pick_row(&r, "PEREZ JUAN, 1234", "PEREZ JUAN", None), Some(1));
        }

        #[test]
        fn test_substring_then_highlight_then_first() {
            let r = rows(&["ZETA", "LA SEGUNDA COOP"]);
            assert_eq!(pick_row(&r, "segunda", "segunda", Some(0)), Some(1));
            assert_eq!(pick_row(&r, "otra", "otra", Some(1)), Some(1));
            assert_eq!(pick_row(&r, "otra", "otra", None), Some(0));
            assert_eq!(pick_row(&r, "otra", "otra", Some(9)), Some(0));
            assert_eq!(pick_row(&[], "otra", "otra", None), None);
        }
    }

    mod protocol_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_batch_query_and_click() {
            let page = MockPage::new();
            page.add_combobox(
                ComboboxSim::new("idAseguradora")
                    .with_options(&["ALLIANZ ARGENTINA", "SANCOR"])
                    .with_result_latency_ms(400),
            );
            let t = target("aseguradora", "idAseguradora");
            ComboboxFill
                .fill(&ctx(&page, "aseguradora", &t), "Allianz Argentina")
                .await
                .unwrap();
            assert_eq!(page.rendered_text("idAseguradora").unwrap(), "ALLIANZ ARGENTINA");
            assert_eq!(page.value_of("idAseguradora").unwrap(), "1");
            assert!(page
                .history()
                .contains(&"send_keys:input.select2-search__field=Allianz Argentina".to_string()));
            assert!(page.was_called("blur_active"));
            assert!(!page.is_open("idAseguradora"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_truncated_query() {
            let page = MockPage::new();
            page.add_combobox(
                ComboboxSim::new("idProductor").with_options(&["PEREZ JUAN", "PEREZ ANA"]),
            );
            let t = target("productor", "idProductor");
            ComboboxFill
                .fill(&ctx(&page, "productor", &t), "PEREZ JUAN, 1234")
                .await
                .unwrap();
            assert!(page
                .history()
                .contains(&"send_keys:input.select2-search__field=PEREZ JUAN".to_string()));
            assert_eq!(page.rendered_text("idProductor").unwrap(), "PEREZ JUAN");
        }

        #[tokio::test(start_paused = true)]
        async fn test_char_by_char_with_prerequisite() {
            let page = MockPage::new();
            page.add_select("idAseguradora", &[("ALLIANZ", "7")]);
            page.add_combobox(
                ComboboxSim::new("idRiesgo")
                    .with_options(&["AUTOMOTORES", "MOTOS"])
                    .disabled(),
            );
            page.schedule(
                1_000,
                crate::mock::PageChange::Enabled {
                    id: "idRiesgo".into(),
                    enabled: true,
                },
            );
            let t = target("riesgo", "idRiesgo");
            let start = tokio::time::Instant::now();
            ComboboxFill
                .fill(&ctx(&page, "riesgo", &t), "AUTO")
                .await
                .unwrap();
            assert!(start.elapsed() >= std::time::Duration::from_millis(1_500));
            let typed: Vec<String> = page
                .history()
                .into_iter()
                .filter(|c| c.starts_with("send_keys:"))
                .collect();
            assert_eq!(typed.len(), 4);
            assert!(page.history().contains(&"dispatch:input.select2-search__field=keyup".to_string()));
            assert_eq!(page.rendered_text("idRiesgo").unwrap(), "AUTOMOTORES");
        }

        #[tokio::test(start_paused = true)]
        async fn test_direct_set_commits_with_enter() {
            let page = MockPage::new();
            page.add_combobox(
                ComboboxSim::new("idCliente")
                    .with_option("ACME S.A.", "4411")
                    .with_result_latency_ms(1_500),
            );
            let t = target("cliente", "idCliente");
            ComboboxFill
                .fill(&ctx(&page, "cliente", &t), "ACME S.A.")
                .await
                .unwrap();
            let history = page.history();
            assert!(history.contains(&"set_value:input.select2-search__field=ACME S.A.".to_string()));
            assert!(history.contains(&"press_key:input.select2-search__field=Enter".to_string()));
            assert!(!history.iter().any(|c| c.starts_with("pointer_click:li")));
            assert_eq!(page.value_of("idCliente").unwrap(), "4411");
        }

        #[tokio::test(start_paused = true)]
        async fn test_force_when_nothing_commits() {
            let page = MockPage::new();
            page.add_combobox(
                ComboboxSim::new("idCliente")
                    .with_option("ACME S.A.", "4411")
                    .ignoring_enter()
                    .ignoring_clicks(10),
            );
            let t = target("cliente", "idCliente");
            ComboboxFill
                .fill(&ctx(&page, "cliente", &t), "ACME")
                .await
                .unwrap();
            assert!(page.was_called("force_selection"));
            assert_eq!(page.value_of("idCliente").unwrap(), "4411");
            assert_eq!(page.rendered_text("idCliente").unwrap(), "ACME S.A.");
            let reclicks = page
                .history()
                .iter()
                .filter(|c| c.starts_with("pointer_click:li"))
                .count();
            assert_eq!(reclicks, 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_framework_hook_exhausts_retries() {
            let page = MockPage::new();
            page.without_framework_hook();
            page.add_combobox(
                ComboboxSim::new("idCliente")
                    .with_option("ACME S.A.", "4411")
                    .ignoring_enter()
                    .ignoring_clicks(100),
            );
            let t = target("cliente", "idCliente");
            let err = ComboboxFill
                .fill(&ctx(&page, "cliente", &t), "ACME")
                .await
                .unwrap_err();
            assert!(matches!(err, FillError::RetriesExhausted { attempts: 3, .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_stale_handle_is_retried() {
            let page = MockPage::new();
            page.add_combobox(ComboboxSim::new("idAseguradora").with_options(&["SANCOR"]));
            page.inject_stale(1);
            let t = target("aseguradora", "idAseguradora");
            ComboboxFill
                .fill(&ctx(&page, "aseguradora", &t), "SANCOR")
                .await
                .unwrap();
            assert_eq!(page.rendered_text("idAseguradora").unwrap(), "SANCOR");
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_results_exhausts_retries() {
            let page = MockPage::new();
            page.add_combobox(ComboboxSim::new("idAseguradora").with_options(&["SANCOR"]));
            let t = target("aseguradora", "idAseguradora");
            let err = ComboboxFill
                .fill(&ctx(&page, "aseguradora", &t), "ZURICH")
                .await
                .unwrap_err();
            assert!(
                matches!(&err, FillError::RetriesExhausted { attempts: 3, last } if last.contains("no results")),
                "{err}"
            );
            assert!(page.was_called("blur_active"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_holder_is_not_retried() {
            let page = MockPage::new();
            let t = target("aseguradora", "idAseguradora");
            let ctx = FillContext {
                driver: &page,
                field: "aseguradora",
                target: &t,
                options: FillOptions::default().with_element_timeout(200),
            };
            let err = ComboboxFill.fill(&ctx, "SANCOR").await.unwrap_err();
            assert!(matches!(err, FillError::ElementNotFound { .. }));
        }
    }

    mod delayed_commit_tests {
        use super::*;

        fn slow_page() -> MockPage {
            let page = MockPage::new();
            page.add_combobox(
                ComboboxSim::new("idCompania")
                    .with_options(&["ACME S.A."])
                    .with_commit_delay_ms(2_000),
            );
            page
        }

        fn with_verify(ms: u64) -> FieldLocator {
            target("compania", "idCompania").with_profile(FieldProfile {
                verify_timeout_ms: Some(ms),
                ..FieldProfile::default()
            })
        }

        #[tokio::test(start_paused = true)]
        async fn test_deadline_longer_than_delay_succeeds() {
            let page = slow_page();
            let t = with_verify(3_000);
            ComboboxFill
                .fill(&ctx(&page, "compania", &t), "ACME S.A.")
                .await
                .unwrap();
            assert_eq!(page.rendered_text("idCompania").unwrap(), "ACME S.A.");
        }

        #[tokio::test(start_paused = true)]
        async fn test_deadline_shorter_than_delay_fails() {
            let page = slow_page();
            let t = with_verify(500);
            let err = ComboboxFill
                .fill(&ctx(&page, "compania", &t), "ACME S.A.")
                .await
                .unwrap_err();
            assert!(matches!(err, FillError::RetriesExhausted { attempts: 3, .. }));
            assert_eq!(page.rendered_text("idCompania").unwrap(), "Seleccione");
        }

        #[tokio::test(start_paused = true)]
        async fn test_fast_mode_caps_profile_deadline() {
            let page = slow_page();
            let t = with_verify(3_000);
            let ctx = FillContext {
                driver: &page,
                field: "compania",
                target: &t,
                options: FillOptions::default().fast(),
            };
            let err = ComboboxFill.fill(&ctx, "ACME S.A.").await.unwrap_err();
            assert!(matches!(err, FillError::RetriesExhausted { attempts: 3, .. }));
        }
    }

    mod timeout_tests {
        use super::*;

        #[test]
        fn test_profile_overrides_normal_default() {
            assert_eq!(field_timeout(Some(5_000), 3_000, 800, false), 5_000);
            assert_eq!(field_timeout(None, 3_000, 800, false), 3_000);
        }

        #[test]
        fn test_fast_bounds_profile() {
            assert_eq!(field_timeout(Some(5_000), 3_000, 800, true), 800);
            assert_eq!(field_timeout(Some(300), 3_000, 800, true), 300);
            assert_eq!(field_timeout(None, 3_000, 800, true), 800);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_open_overlays() {
        let page = MockPage::new();
        let holder = page.add_combobox(ComboboxSim::new("idProductor").with_options(&["A"]));
        let control = page.adjacent(&holder, "select2").await.unwrap().unwrap();
        let selection = page
            .find_within(&control, &Locator::css(".select2-selection"))
            .await
            .unwrap()
            .unwrap();
        page.pointer_click(&selection).await.unwrap();
        assert!(page.is_open("idProductor"));
        let result = close_open_overlays(&page, WaitOptions::new(500)).await;
        assert!(result.success);
        assert!(!page.is_open("idProductor"));

        let idle = close_open_overlays(&page, WaitOptions::new(500)).await;
        assert!(idle.success);
    }
}
