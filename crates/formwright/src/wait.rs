//! Polling waits.
//!
//! Every wait in the engine is a probe polled on an interval. Bounded waits
//! report a [`WaitResult`] instead of failing, so callers decide whether a
//! timeout matters. Probe errors count as "not yet": a node that went stale
//! mid-poll is just another negative observation.
//!
//! Time goes through `tokio::time`, so tests can run on a paused clock.

use crate::driver::{ElementRef, PageDriver};
use crate::locator::Locator;
use crate::result::{DriverResult, FillError, FillResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default timeout for element lookups (5 seconds)
pub const DEFAULT_ELEMENT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Polling interval for waits on a human operator (20ms)
pub const OPERATOR_POLL_INTERVAL_MS: u64 = 20;

/// Options for a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_ELEMENT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create wait options with the given timeout and the default interval
    #[must_use]
    pub const fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Outcome of a bounded wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// Whether the condition was observed before the deadline
    pub success: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// What was waited for
    pub waited_for: String,
}

impl WaitResult {
    #[must_use]
    pub fn success(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            success: true,
            elapsed,
            waited_for: waited_for.into(),
        }
    }

    #[must_use]
    pub fn timeout(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed,
            waited_for: waited_for.into(),
        }
    }
}

/// Sleep for `ms` milliseconds
pub async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Poll `probe` until it yields `Some`, or the deadline passes.
///
/// The probe always runs at least once.
pub async fn poll_for<T, F, Fut>(options: WaitOptions, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DriverResult<Option<T>>>,
{
    let start = Instant::now();
    loop {
        if let Ok(Some(found)) = probe().await {
            return Some(found);
        }
        if start.elapsed() >= options.timeout() {
            return None;
        }
        tokio::time::sleep(options.poll_interval()).await;
    }
}

/// Poll `probe` until it reports true, or the deadline passes
pub async fn poll_until<F, Fut>(options: WaitOptions, waited_for: &str, mut probe: F) -> WaitResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DriverResult<bool>>,
{
    let start = Instant::now();
    let hit = poll_for(options, || {
        let attempt = probe();
        async move { attempt.await.map(|ok| ok.then_some(())) }
    })
    .await;
    if hit.is_some() {
        WaitResult::success(start.elapsed(), waited_for)
    } else {
        tracing::debug!(waited_for, timeout_ms = options.timeout_ms, "wait timed out");
        WaitResult::timeout(start.elapsed(), waited_for)
    }
}

/// Poll `probe` with no deadline; returns the time spent.
///
/// Reserved for waits on a human operator, which must not time out.
pub async fn poll_forever<F, Fut>(interval_ms: u64, mut probe: F) -> Duration
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DriverResult<bool>>,
{
    let start = Instant::now();
    let interval = Duration::from_millis(interval_ms.max(1));
    loop {
        if matches!(probe().await, Ok(true)) {
            return start.elapsed();
        }
        tokio::time::sleep(interval).await;
    }
}

/// Wait until `locator` resolves to an element
pub async fn wait_for_element(
    driver: &dyn PageDriver,
    locator: &Locator,
    options: WaitOptions,
) -> FillResult<ElementRef> {
    poll_for(options, || driver.find(locator))
        .await
        .ok_or_else(|| FillError::ElementNotFound {
            locator: locator.to_string(),
            ms: options.timeout_ms,
        })
}

/// Wait until `element` is displayed and enabled
pub async fn wait_for_interactable(
    driver: &dyn PageDriver,
    element: &ElementRef,
    options: WaitOptions,
) -> WaitResult {
    poll_until(options, "interactable", || async move {
        Ok(driver.is_displayed(element).await? && driver.is_enabled(element).await?)
    })
    .await
}

/// Wait until nothing matches `locator`
pub async fn wait_for_absent(
    driver: &dyn PageDriver,
    locator: &Locator,
    options: WaitOptions,
) -> WaitResult {
    poll_until(options, &locator.to_string(), || async move {
        Ok(driver.find_all(locator).await?.is_empty())
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::result::DriverError;
    use std::sync::atomic::{AtomicU32, Ordering};

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, 5_000);
            assert_eq!(opts.poll_interval_ms, 50);
        }

        #[test]
        fn test_builders() {
            let opts = WaitOptions::new(800).with_poll_interval(100);
            assert_eq!(opts.timeout(), Duration::from_millis(800));
            assert_eq!(opts.poll_interval(), Duration::from_millis(100));
        }
    }

    mod poll_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_succeeds_once_probe_turns_true() {
            let calls = AtomicU32::new(0);
            let result = poll_until(WaitOptions::new(1_000), "third call", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(n >= 2) }
            })
            .await;
            assert!(result.success);
            assert_eq!(calls.load(Ordering::SeqCst), 3);
            assert_eq!(result.elapsed, Duration::from_millis(100));
        }

        #[tokio::test(start_paused = true)]
        async fn test_times_out() {
            let result =
                poll_until(WaitOptions::new(300), "never", || async { Ok(false) }).await;
            assert!(!result.success);
            assert!(result.elapsed >= Duration::from_millis(300));
            assert_eq!(result.waited_for, "never");
        }

        #[tokio::test(start_paused = true)]
        async fn test_probe_errors_count_as_not_yet() {
            let calls = AtomicU32::new(0);
            let result = poll_until(WaitOptions::new(1_000), "stale then ok", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(DriverError::StaleElement {
                            handle: "e1".into(),
                        })
                    } else {
                        Ok(true)
                    }
                }
            })
            .await;
            assert!(result.success);
        }

        #[tokio::test(start_paused = true)]
        async fn test_zero_timeout_probes_once() {
            let calls = AtomicU32::new(0);
            let found = poll_for(WaitOptions::new(0), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Some(7)) }
            })
            .await;
            assert_eq!(found, Some(7));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_poll_forever_waits_past_any_timeout() {
            let calls = AtomicU32::new(0);
            let elapsed = poll_forever(20, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(n >= 3_000) }
            })
            .await;
            assert_eq!(elapsed, Duration::from_millis(60_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_advances_clock() {
        let start = Instant::now();
        pause(250).await;
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }
}
