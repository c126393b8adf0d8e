//! Tab Navigator.
//!
//! Tracks the active form tab and clicks a tab header only when the plan
//! crosses into a new tab. A tab that is unmapped, missing or never becomes
//! clickable is reported, not raised: the rest of the plan still runs.

use crate::driver::PageDriver;
use crate::locator::Locator;
use crate::mapping::FieldMapping;
use crate::plan::Tab;
use crate::result::FillResult;
use crate::wait::{self, WaitOptions};

/// What [`TabNavigator::activate`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabOutcome {
    /// The tab was already active; nothing happened
    AlreadyActive,
    /// The tab header was clicked
    Switched,
    /// The mapping has no entry for the tab
    Unmapped,
    /// The header could not be found or clicked
    Unavailable(String),
}

/// Activates form tabs on one page
pub struct TabNavigator<'a> {
    driver: &'a dyn PageDriver,
    mapping: &'a FieldMapping,
    wait: WaitOptions,
    current: Option<Tab>,
}

impl std::fmt::Debug for TabNavigator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabNavigator")
            .field("wait", &self.wait)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl<'a> TabNavigator<'a> {
    #[must_use]
    pub fn new(driver: &'a dyn PageDriver, mapping: &'a FieldMapping, wait: WaitOptions) -> Self {
        Self {
            driver,
            mapping,
            wait,
            current: None,
        }
    }

    /// Tab the navigator last moved to
    #[must_use]
    pub const fn current(&self) -> Option<Tab> {
        self.current
    }

    /// Move to `tab`. The tab counts as current afterwards whatever the
    /// outcome, so a broken header is not retried for every field.
    pub async fn activate(&mut self, tab: Tab) -> TabOutcome {
        if self.current == Some(tab) {
            return TabOutcome::AlreadyActive;
        }
        self.current = Some(tab);
        let Some(locator) = self.mapping.tab_locator(tab.as_str()) else {
            tracing::debug!(%tab, "tab not mapped");
            return TabOutcome::Unmapped;
        };
        match self.click(&locator.click).await {
            Ok(()) => {
                tracing::info!(%tab, "switched tab");
                TabOutcome::Switched
            }
            Err(err) => {
                tracing::warn!(%tab, error = %err, "tab not activated");
                TabOutcome::Unavailable(err.to_string())
            }
        }
    }

    async fn click(&self, locator: &Locator) -> FillResult<()> {
        let header = wait::wait_for_element(self.driver, locator, self.wait).await?;
        // Click anyway on timeout; the driver reports why it failed
        let ready = wait::wait_for_interactable(self.driver, &header, self.wait).await;
        if !ready.success {
            tracing::debug!(%locator, "tab header not interactable yet");
        }
        self.driver.click(&header).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::MockPage;

    fn mapping() -> FieldMapping {
        FieldMapping::default()
            .with_tab("condiciones", Locator::css("#tabCondiciones"))
            .with_tab("vehiculo", Locator::id("tabVehiculo"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_once_per_tab() {
        let page = MockPage::new();
        page.add_element(None, "a", Some("tabCondiciones"), &["nav-link"]);
        page.add_element(None, "a", Some("tabVehiculo"), &["nav-link"]);
        let mapping = mapping();
        let mut nav = TabNavigator::new(&page, &mapping, WaitOptions::new(500));

        assert_eq!(nav.activate(Tab::Condiciones).await, TabOutcome::Switched);
        assert_eq!(nav.activate(Tab::Condiciones).await, TabOutcome::AlreadyActive);
        assert_eq!(nav.activate(Tab::Vehiculo).await, TabOutcome::Switched);
        assert_eq!(nav.current(), Some(Tab::Vehiculo));

        let clicks: Vec<String> = page
            .history()
            .into_iter()
            .filter(|c| c.starts_with("click:"))
            .collect();
        assert_eq!(clicks, ["click:#tabCondiciones", "click:#tabVehiculo"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmapped_tab_is_noop() {
        let page = MockPage::new();
        let mapping = mapping();
        let mut nav = TabNavigator::new(&page, &mapping, WaitOptions::new(500));
        assert_eq!(nav.activate(Tab::Montos).await, TabOutcome::Unmapped);
        assert_eq!(nav.current(), Some(Tab::Montos));
        assert!(page.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_header_is_swallowed() {
        let page = MockPage::new();
        let mapping = mapping();
        let mut nav = TabNavigator::new(&page, &mapping, WaitOptions::new(300));
        let outcome = nav.activate(Tab::Vehiculo).await;
        assert!(matches!(outcome, TabOutcome::Unavailable(ref d) if d.contains("not found")));
        assert_eq!(nav.activate(Tab::Vehiculo).await, TabOutcome::AlreadyActive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_header_is_unavailable() {
        let page = MockPage::new();
        page.add_element(None, "a", Some("tabCondiciones"), &[]);
        page.set_displayed("tabCondiciones", false);
        let mapping = mapping();
        let mut nav = TabNavigator::new(&page, &mapping, WaitOptions::new(300));
        assert!(matches!(
            nav.activate(Tab::Condiciones).await,
            TabOutcome::Unavailable(_)
        ));
    }
}
