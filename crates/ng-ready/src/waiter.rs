//! The readiness waiter.
//!
//! One public operation: [`Waiter::wait_until_ready`], which blocks the
//! calling task until the page's AngularJS app reports no pending work, the
//! page turns out not to be an Angular app at all, or the deadline expires.
//!
//! The wait is a single cooperative polling loop. Script round-trips are
//! strictly sequential; the only concurrency being awaited lives inside the
//! browser. Everything except the process-wide default timeout is scoped to
//! one call: a second call on the same page starts from scratch.

use crate::error::{ReadyError, Result, TimeoutDiagnostics};
use crate::page::PageDriver;
use crate::probe::{self, ReadinessStrategy, ReadyState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default poll interval between flag reads (10ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Fallback for the process-wide maximum wait (2 seconds).
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(2);

// Process-wide max-wait setting, in milliseconds. Read once per wait call
// via WaitConfig::default(); writable for suites that need a global knob.
static DEFAULT_MAX_WAIT_MS: AtomicU64 = AtomicU64::new(2_000);

/// Returns the process-wide default maximum wait.
#[must_use]
pub fn default_max_wait() -> Duration {
    Duration::from_millis(DEFAULT_MAX_WAIT_MS.load(Ordering::Relaxed))
}

/// Sets the process-wide default maximum wait.
///
/// Affects every subsequently constructed [`WaitConfig`]; waits already in
/// progress keep the deadline they computed at the start.
#[allow(clippy::cast_possible_truncation)]
pub fn set_default_max_wait(max_wait: Duration) {
    DEFAULT_MAX_WAIT_MS.store(max_wait.as_millis() as u64, Ordering::Relaxed);
}

/// Configuration for one wait call.
#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    /// Maximum time to wait for the framework to become idle.
    pub timeout: Duration,

    /// How often to re-read the readiness flag.
    pub poll_interval: Duration,
}

impl WaitConfig {
    /// Creates a new wait configuration.
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Creates a config with a custom timeout and the default poll interval.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }
}

impl Default for WaitConfig {
    /// Consults the process-wide max-wait setting at construction time.
    fn default() -> Self {
        Self::new(default_max_wait(), DEFAULT_POLL_INTERVAL)
    }
}

/// Blocks a test until the page's Angular app has no pending work.
///
/// Borrows the page handle for the duration of each call; it never owns or
/// closes the page. Safe to call on any page: non-Angular pages succeed
/// vacuously after a single detection probe.
///
/// # Example
///
/// ```ignore
/// let waiter = Waiter::new(&page);
/// page.navigate(url).await?;
/// waiter.wait_until_ready().await?;
/// // DOM is stable, assert away.
/// ```
#[derive(Debug)]
pub struct Waiter<'a, D: PageDriver + ?Sized> {
    page: &'a D,
    config: WaitConfig,
}

impl<'a, D: PageDriver + ?Sized> Waiter<'a, D> {
    /// Creates a waiter with the default configuration.
    pub fn new(page: &'a D) -> Self {
        Self::with_config(page, WaitConfig::default())
    }

    /// Creates a waiter with an explicit configuration.
    pub fn with_config(page: &'a D, config: WaitConfig) -> Self {
        Self { page, config }
    }

    /// Waits until the framework reports itself idle.
    ///
    /// Returns immediately (vacuous success) when the page is not an Angular
    /// app, including when the driver cannot evaluate scripts at all.
    /// Otherwise installs the readiness probe and polls its flag until it
    /// turns true. A flag that vanishes mid-wait means the page navigated:
    /// the waiter re-detects and, if the framework is still there,
    /// re-installs the probe and keeps polling against the original deadline.
    ///
    /// # Errors
    ///
    /// `WaitTimeout` when the deadline expires, carrying the probe install
    /// count, pending network requests, and any framework-internal
    /// outstanding-request info. This is the only error this method returns;
    /// evaluation failures along the way are absorbed into the loop.
    pub async fn wait_until_ready(&self) -> Result<()> {
        if !self.detect().await {
            return Ok(());
        }

        let mut setup_count: u32 = 0;
        self.install(&mut setup_count).await;

        let start = Instant::now();
        loop {
            match self.poll().await {
                ReadyState::Ready => {
                    debug!(setup_count, elapsed = ?start.elapsed(), "angular is idle");
                    return Ok(());
                }
                ReadyState::NotReady => {}
                ReadyState::Reset => {
                    // Navigation wiped the script environment (or probe
                    // setup threw). If the new page isn't Angular anymore
                    // the wait is over; otherwise start a fresh epoch.
                    if !self.detect().await {
                        debug!(setup_count, "page left angular during wait");
                        return Ok(());
                    }
                    self.install(&mut setup_count).await;
                }
            }

            if start.elapsed() >= self.config.timeout {
                return Err(self.timeout_error(setup_count).await);
            }

            sleep(self.config.poll_interval).await;
        }
    }

    /// Framework detection. Any evaluation failure counts as "not detected";
    /// in particular `EvaluationUnsupported` pages succeed vacuously.
    async fn detect(&self) -> bool {
        match self.page.evaluate(probe::DETECT_SCRIPT).await {
            Ok(value) => probe::decode_detect(&value),
            Err(ReadyError::EvaluationUnsupported) => {
                debug!("driver cannot evaluate scripts, treating as non-angular page");
                false
            }
            Err(e) => {
                debug!(error = %e, "detection probe failed, treating as non-angular page");
                false
            }
        }
    }

    /// Selects a strategy and injects the probe, bumping the epoch counter.
    ///
    /// Injection failures are absorbed: the flag stays unset, the next poll
    /// observes a reset, and the deadline bounds the retries.
    async fn install(&self, setup_count: &mut u32) {
        let strategy = match self.page.evaluate(probe::STRATEGY_SCRIPT).await {
            Ok(value) => probe::decode_strategy(&value),
            Err(_) => ReadinessStrategy::OutstandingRequests,
        };

        if let Err(e) = self.page.execute(strategy.install_script()).await {
            warn!(error = %e, ?strategy, "readiness probe injection failed");
        }

        *setup_count += 1;
        debug!(setup_count = *setup_count, ?strategy, "readiness probe installed");
    }

    /// Reads the flag. Evaluation failures are treated as "not ready yet":
    /// transient CDP hiccups shouldn't abort the wait, and the deadline
    /// still bounds it.
    async fn poll(&self) -> ReadyState {
        match self.page.evaluate(probe::POLL_SCRIPT).await {
            Ok(value) => probe::decode_poll(&value),
            Err(e) => {
                debug!(error = %e, "readiness poll failed, retrying");
                ReadyState::NotReady
            }
        }
    }

    /// Assembles the timeout error. Diagnostics are best-effort; a page that
    /// can no longer answer the framework-info probe still produces a
    /// useful error.
    async fn timeout_error(&self, setup_count: u32) -> ReadyError {
        let pending_requests: Vec<_> = self
            .page
            .network_activity()
            .into_iter()
            .filter(|r| !r.finished)
            .collect();

        let framework_info = self
            .page
            .evaluate(probe::DIAGNOSTIC_SCRIPT)
            .await
            .ok()
            .and_then(|v| probe::decode_diagnostic(&v));

        let diagnostics = TimeoutDiagnostics {
            setup_count,
            pending_requests,
            framework_info,
        };

        warn!(timeout = ?self.config.timeout, %diagnostics, "timed out waiting for angular");

        ReadyError::WaitTimeout {
            timeout: self.config.timeout,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_config_constructors() {
        let config = WaitConfig::new(Duration::from_millis(500), Duration::from_millis(5));
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.poll_interval, Duration::from_millis(5));

        let config = WaitConfig::with_timeout(Duration::from_secs(1));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    // Single test for the global so nothing races the setter.
    #[test]
    fn default_config_follows_process_wide_setting() {
        assert_eq!(WaitConfig::default().timeout, default_max_wait());

        set_default_max_wait(Duration::from_millis(750));
        assert_eq!(default_max_wait(), Duration::from_millis(750));
        assert_eq!(WaitConfig::default().timeout, Duration::from_millis(750));

        set_default_max_wait(DEFAULT_MAX_WAIT);
    }
}
