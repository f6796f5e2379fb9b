//! Wait mechanisms: generic condition polling, element-stability sampling
//! and a bounded retry helper.
//!
//! Asynchronous UI state has no authoritative "done" signal, so everything
//! here reconciles "the action is logically complete" with "the DOM has
//! caught up" by observation: poll, compare, bound every wait.

use crate::driver::{BoundingBox, ElementState, VitrinaDriver};
use crate::result::{VitrinaError, VitrinaResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Consecutive equal bounding-box comparisons required to call an element
/// stable
pub const STABLE_SAMPLES_REQUIRED: u32 = 3;

/// Options for wait operations
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Timeout as a Duration
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as a Duration
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Poll an async predicate until it holds or the bound elapses.
///
/// Probe errors propagate immediately: a probe that wants to tolerate
/// transient failure reports `Ok(false)` instead. Returns the elapsed time
/// on success.
pub async fn wait_until<F, Fut>(
    waiting_for: &str,
    options: &WaitOptions,
    mut probe: F,
) -> VitrinaResult<Duration>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = VitrinaResult<bool>>,
{
    let start = Instant::now();
    loop {
        if probe().await? {
            return Ok(start.elapsed());
        }
        if start.elapsed() >= options.timeout() {
            return Err(VitrinaError::timeout(options.timeout_ms, waiting_for));
        }
        tokio::time::sleep(options.poll_interval()).await;
    }
}

/// Declares an element stable once its bounding box stops changing across
/// consecutive samples.
///
/// Animated entries, layout shifts and late style application all move the
/// box; once it holds still for [`STABLE_SAMPLES_REQUIRED`] comparisons the
/// element is safe to interact with. An element with no box at all (hidden,
/// detached) is never considered stable: absence is not the same as
/// no-movement.
#[derive(Debug, Clone)]
pub struct StabilityWaiter {
    samples_required: u32,
    options: WaitOptions,
}

impl Default for StabilityWaiter {
    fn default() -> Self {
        Self {
            samples_required: STABLE_SAMPLES_REQUIRED,
            options: WaitOptions::new().with_timeout(10_000),
        }
    }
}

impl StabilityWaiter {
    /// Create a waiter with defaults (3 samples, 10s bound, 100ms interval)
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the required consecutive equal comparisons
    pub const fn with_samples(mut self, samples: u32) -> Self {
        self.samples_required = samples;
        self
    }

    /// Override timeout and polling interval
    pub fn with_options(mut self, options: WaitOptions) -> Self {
        self.options = options;
        self
    }

    /// Wait until the element's bounding box holds still.
    ///
    /// Waits for visibility first, then samples the box every poll tick.
    /// Any inequality (including a missing box) resets the streak.
    pub async fn wait_until_stable(
        &self,
        driver: &dyn VitrinaDriver,
        selector: &str,
    ) -> VitrinaResult<()> {
        driver
            .wait_for(selector, ElementState::Visible, self.options.timeout())
            .await?;

        let start = Instant::now();
        let mut previous: Option<BoundingBox> = None;
        let mut streak = 0u32;

        loop {
            if start.elapsed() >= self.options.timeout() {
                return Err(VitrinaError::timeout(
                    self.options.timeout_ms,
                    format!("{selector} to stop moving"),
                ));
            }
            tokio::time::sleep(self.options.poll_interval()).await;

            let current = driver.bounding_box(selector).await?;
            match (previous, current) {
                (Some(prev), Some(curr)) if prev == curr => {
                    streak += 1;
                    if streak >= self.samples_required {
                        return Ok(());
                    }
                }
                (_, curr) => {
                    streak = 0;
                    previous = curr;
                }
            }
        }
    }
}

/// Bounded retry for flaky actions: fixed backoff, no exponential cleverness.
///
/// Structural failures should not be routed through this; retrying cannot
/// fix a page that no longer matches the expected shape.
#[derive(Debug, Clone)]
pub struct Retry {
    attempts: u32,
    backoff: Duration,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(1000),
        }
    }
}

impl Retry {
    /// Create a retry policy with defaults (3 attempts, 1s backoff)
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the attempt count
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Override the fixed backoff between attempts
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run the operation until it succeeds or attempts are exhausted.
    /// The final attempt's error propagates verbatim.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> VitrinaResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = VitrinaResult<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts => {
                    tracing::warn!(label, attempt, error = %err, "attempt failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{El, SimPage};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn page_with(elements: Vec<El>) -> SimPage {
        let page = SimPage::new();
        page.mount(elements);
        page
    }

    mod wait_until_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn resolves_once_predicate_holds() {
            let counter = AtomicU32::new(0);
            let options = WaitOptions::new().with_timeout(1_000).with_poll_interval(50);
            let elapsed = wait_until("counter to reach 3", &options, || async {
                Ok(counter.fetch_add(1, Ordering::SeqCst) >= 3)
            })
            .await
            .unwrap();
            assert_eq!(elapsed, Duration::from_millis(150));
        }

        #[tokio::test(start_paused = true)]
        async fn rejects_exactly_at_the_bound() {
            let options = WaitOptions::new().with_timeout(500).with_poll_interval(100);
            let err = wait_until("a condition that never holds", &options, || async {
                Ok(false)
            })
            .await
            .unwrap_err();
            match err {
                VitrinaError::Timeout { ms, .. } => assert_eq!(ms, 500),
                other => panic!("expected timeout, got {other}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn probe_errors_propagate() {
            let options = WaitOptions::new().with_timeout(500).with_poll_interval(100);
            let err = wait_until("a broken probe", &options, || async {
                Err(VitrinaError::driver("probe exploded"))
            })
            .await
            .unwrap_err();
            assert!(matches!(err, VitrinaError::Driver { .. }));
        }
    }

    mod stability_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn static_element_is_stable() {
            let page = page_with(vec![El::new(".hero").rect(10.0, 20.0, 300.0, 150.0)]);
            StabilityWaiter::new()
                .wait_until_stable(&page, ".hero")
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn settling_element_becomes_stable_before_the_bound() {
            let page = page_with(vec![El::new(".product-item-link")
                .rect(0.0, 0.0, 120.0, 40.0)
                .settles_after_ms(350)]);
            StabilityWaiter::new()
                .wait_until_stable(&page, ".product-item-link")
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn perpetual_motion_rejects_at_the_bound() {
            let page = page_with(vec![El::new(".carousel")
                .rect(0.0, 0.0, 600.0, 200.0)
                .settles_after_ms(3_600_000)]);
            let waiter = StabilityWaiter::new()
                .with_options(WaitOptions::new().with_timeout(2_000).with_poll_interval(100));
            let err = waiter
                .wait_until_stable(&page, ".carousel")
                .await
                .unwrap_err();
            match err {
                VitrinaError::Timeout { ms, .. } => assert_eq!(ms, 2_000),
                other => panic!("expected timeout, got {other}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn missing_element_never_stabilizes() {
            let page = page_with(vec![]);
            let waiter = StabilityWaiter::new()
                .with_options(WaitOptions::new().with_timeout(1_000).with_poll_interval(100));
            let err = waiter.wait_until_stable(&page, ".ghost").await.unwrap_err();
            assert!(err.is_timeout());
        }

        #[tokio::test(start_paused = true)]
        async fn boxless_element_never_stabilizes() {
            // Visible but never laid out: the box stays absent, and two
            // absent boxes are not equal, so the streak never starts.
            let page = page_with(vec![El::new(".flicker")]);
            let waiter = StabilityWaiter::new()
                .with_options(WaitOptions::new().with_timeout(800).with_poll_interval(100));
            let err = waiter.wait_until_stable(&page, ".flicker").await.unwrap_err();
            assert!(err.is_timeout());
        }
    }

    mod retry_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn succeeds_after_transient_failures() {
            let attempts = AtomicU32::new(0);
            let value = Retry::new()
                .run("flaky click", || async {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(VitrinaError::driver("not yet"))
                    } else {
                        Ok(42)
                    }
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
            assert_eq!(attempts.load(Ordering::SeqCst), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn exhausted_attempts_propagate_the_last_error() {
            let attempts = AtomicU32::new(0);
            let err = Retry::new()
                .with_attempts(3)
                .run("doomed click", || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(VitrinaError::driver("still broken"))
                })
                .await
                .unwrap_err();
            assert_eq!(attempts.load(Ordering::SeqCst), 3);
            assert!(matches!(err, VitrinaError::Driver { .. }));
        }
    }
}
