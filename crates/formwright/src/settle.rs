//! Dependency Wait Protocol.
//!
//! Some fields trigger AJAX work on the page once committed: the insurer
//! repopulates the risk list, the client recalculates currency, renewal,
//! coverage and installment selects. [`settle`] blocks (bounded) until the
//! dependent widgets stop showing a loading state. A settle timeout is not
//! a field failure; the executor logs it and moves on.

use crate::driver::PageDriver;
use crate::locator::Locator;
use crate::mapping::SettleRule;
use crate::normalize::is_placeholder;
use crate::result::DriverResult;
use crate::wait::{pause, poll_until, WaitOptions, WaitResult};
use std::time::Duration;
use tokio::time::Instant;

/// Deadline for the polling settle rules
pub const SETTLE_TIMEOUT_MS: u64 = 3_000;

/// Poll interval for the polling settle rules
pub const SETTLE_POLL_MS: u64 = 100;

/// Pause before polling a dependent list, so the old options are gone
pub const DEPENDENT_LEAD_MS: u64 = 250;

/// Wait out `rule` after a field has been filled
pub async fn settle(driver: &dyn PageDriver, rule: &SettleRule) -> WaitResult {
    let options = WaitOptions::new(SETTLE_TIMEOUT_MS).with_poll_interval(SETTLE_POLL_MS);
    match rule {
        SettleRule::None => WaitResult::success(Duration::ZERO, "nothing"),
        SettleRule::Pause { ms } => {
            let start = Instant::now();
            pause(*ms).await;
            WaitResult::success(start.elapsed(), "fixed pause")
        }
        SettleRule::DependentOptions { target } => {
            let start = Instant::now();
            pause(DEPENDENT_LEAD_MS).await;
            let waited_for = format!("options of {target}");
            let mut result = poll_until(options, &waited_for, || async move {
                dependent_populated(driver, target).await
            })
            .await;
            result.elapsed = start.elapsed();
            result
        }
        SettleRule::DownstreamReady { targets } => {
            poll_until(options, "downstream selects", || async move {
                for target in targets {
                    if !select_ready(driver, target).await? {
                        return Ok(false);
                    }
                }
                Ok(true)
            })
            .await
        }
    }
}

/// More than one option, and the first is not a loading label
async fn dependent_populated(driver: &dyn PageDriver, target: &Locator) -> DriverResult<bool> {
    let Some(el) = driver.find(target).await? else {
        return Ok(false);
    };
    let options = driver.options(&el).await?;
    Ok(options.len() > 1 && options.first().is_some_and(|o| !is_placeholder(&o.text)))
}

/// Enabled, non-empty, and the first option is not a loading label
async fn select_ready(driver: &dyn PageDriver, target: &Locator) -> DriverResult<bool> {
    let Some(el) = driver.find(target).await? else {
        return Ok(false);
    };
    if !driver.is_enabled(&el).await? {
        return Ok(false);
    }
    let options = driver.options(&el).await?;
    Ok(options.first().is_some_and(|o| !is_placeholder(&o.text)))
}
