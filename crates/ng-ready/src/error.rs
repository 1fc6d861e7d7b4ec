//! Error types for readiness synchronization.
//!
//! The only failure a caller of [`Waiter::wait_until_ready`] ever sees is
//! `WaitTimeout`; every other evaluation problem is absorbed into the wait
//! loop as a control-flow signal (not detected, keep polling, re-install).
//! The remaining variants exist for the Chrome harness and for drivers to
//! report evaluation problems to the waiter.
//!
//! [`Waiter::wait_until_ready`]: crate::waiter::Waiter::wait_until_ready

use crate::network::RequestDescriptor;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The main error type for readiness-wait operations.
///
/// Uses thiserror for Display and source chaining. `WaitTimeout` is the
/// single contract-level failure mode of the waiter; it is always returned
/// when the deadline is exhausted and never swallowed or downgraded.
#[derive(Debug, Error)]
pub enum ReadyError {
    /// The readiness flag never became true within the deadline.
    ///
    /// Carries diagnostic context captured at the moment of timeout: how many
    /// times the probe was installed, which network requests were still
    /// in flight, and (when the page exposes it) the framework's own
    /// outstanding-request bookkeeping.
    #[error("timed out after {timeout:?} waiting for angular: {diagnostics}")]
    WaitTimeout {
        /// The configured maximum wait that was exhausted.
        timeout: Duration,
        /// Context captured when the deadline expired.
        diagnostics: TimeoutDiagnostics,
    },

    /// The driver cannot evaluate scripts on the current page.
    ///
    /// Raised by [`PageDriver::evaluate`] implementations for pages with no
    /// script engine. Framework detection converts this into a definitive
    /// "not detected", so it never escapes `wait_until_ready`.
    ///
    /// [`PageDriver::evaluate`]: crate::page::PageDriver::evaluate
    #[error("script evaluation is not supported on this page")]
    EvaluationUnsupported,

    /// JavaScript evaluation in the page context failed.
    #[error("script evaluation failed: {0}")]
    ScriptExecutionFailed(String),

    /// Navigation to a URL failed or timed out (harness only).
    #[error("navigation to '{url}' failed: {reason}")]
    NavigationFailed {
        /// The URL that failed to load.
        url: String,
        /// Reason for the navigation failure.
        reason: String,
    },

    /// Failed to launch the browser process (harness only).
    #[error("failed to launch browser: {reason}")]
    LaunchFailed {
        /// Human-readable reason for the launch failure.
        reason: String,
        /// Optional underlying error that caused the failure.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failed to establish or keep the DevTools connection (harness only).
    #[error("CDP connection failed: {0}")]
    ConnectionFailed(String),

    /// An operation was attempted on a closed harness.
    #[error("browser instance is already closed")]
    AlreadyClosed,

    /// Wraps errors from the chromiumoxide library.
    #[error("chromiumoxide error: {0}")]
    ChromiumOxide(#[from] chromiumoxide::error::CdpError),

    /// Generic I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for readiness-wait operations.
pub type Result<T> = std::result::Result<T, ReadyError>;

/// Context captured when a wait deadline expires.
///
/// Diagnostic only: nothing here feeds back into control flow. The pending
/// request list comes from the driver's network capture; `framework_info` is
/// the legacy `$browser` outstanding-request report when the page can still
/// produce one.
#[derive(Debug, Clone)]
pub struct TimeoutDiagnostics {
    /// How many times the readiness probe was (re-)installed during the wait.
    pub setup_count: u32,
    /// Requests that had not completed when the deadline expired.
    pub pending_requests: Vec<RequestDescriptor>,
    /// Outstanding-request info reported by the framework itself, if obtainable.
    pub framework_info: Option<String>,
}

impl fmt::Display for TimeoutDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "probe installed {} time(s), {} pending request(s)",
            self.setup_count,
            self.pending_requests.len()
        )?;

        for request in &self.pending_requests {
            write!(f, "\n  {} {} (id {})", request.method, request.url, request.id)?;
        }

        if let Some(info) = &self.framework_info {
            write!(f, "\n  framework: {info}")?;
        }

        Ok(())
    }
}
