//! # ng-ready
//!
//! Readiness synchronization for browser tests against AngularJS pages.
//!
//! After a click or a navigation, an Angular app usually still has work in
//! flight: `$http` requests, `$timeout`s, digest cycles. Asserting against
//! the DOM at that moment is a race. This crate blocks the test until the
//! framework reports itself idle, so assertions made afterward see a stable
//! page.
//!
//! ## Architecture
//!
//! - **Waiter**: the polling loop; one call = one bounded wait
//! - **PageDriver**: the seam to the browser automation layer
//! - **CdpPage**: `PageDriver` over chromiumoxide, with network capture
//! - **probe**: the injected scripts and their typed decoders
//! - **ChromeHarness**: headless Chrome launcher for integration tests
//!
//! ## How a wait works
//!
//! The waiter first checks whether the page is an Angular app at all; if
//! not, it returns immediately. Otherwise it injects a probe that registers
//! with the framework's idle notification (the `getTestability` hook on
//! modern builds, `$browser.notifyWhenNoOutstandingRequests` on legacy
//! ones) and reports through a single page global. The host polls that
//! global at a fixed interval. If the page navigates mid-wait the global
//! vanishes; the waiter re-detects and re-installs, all against the same
//! deadline. On timeout it fails with the probe install count, pending
//! network requests, and any framework-internal request bookkeeping.
//!
//! ## Example Usage
//!
//! ```ignore
//! use ng_ready::{ChromeHarness, HarnessConfig, PageDriver, Waiter};
//!
//! #[tokio::test]
//! async fn dashboard_renders() -> Result<(), Box<dyn std::error::Error>> {
//!     let harness = ChromeHarness::launch(HarnessConfig::default()).await?;
//!     let page = harness.new_page().await?;
//!
//!     page.navigate("http://localhost:3000/dashboard").await?;
//!     Waiter::new(&page).wait_until_ready().await?;
//!
//!     // Angular is idle; the DOM is stable.
//!     let rows = page.evaluate("document.querySelectorAll('tr').length").await?;
//!     assert_eq!(rows.as_i64(), Some(12));
//!
//!     harness.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Testing Strategy
//!
//! 1. **Unit tests**: probe decoding, capture bookkeeping, config handling
//! 2. **Fake-page tests** (`tests/waiter.rs`): the full wait loop against an
//!    in-memory `PageDriver`, no browser required
//! 3. **Integration tests** (`tests/integration.rs`): real headless Chrome,
//!    `#[ignore]`d by default
//!
//! Run with `cargo test` (unit + fake) or `cargo test -- --ignored`
//! (integration, requires Chrome installed).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod browser;
pub mod error;
pub mod network;
pub mod page;
pub mod probe;
pub mod waiter;

// Re-export main types for convenience
pub use browser::{ChromeHarness, HarnessConfig};
pub use error::{ReadyError, Result, TimeoutDiagnostics};
pub use network::{NetworkCapture, RequestDescriptor};
pub use page::{CdpPage, PageDriver};
pub use probe::{ReadinessStrategy, ReadyState};
pub use waiter::{
    default_max_wait, set_default_max_wait, WaitConfig, Waiter, DEFAULT_MAX_WAIT,
    DEFAULT_POLL_INTERVAL,
};
