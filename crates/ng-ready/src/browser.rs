//! Headless Chrome harness for integration tests.
//!
//! The waiter itself never owns a browser; it borrows a page handle from
//! whatever harness the test suite uses. This module is the harness we ship
//! for our own integration tests: launch headless Chrome, hand out
//! [`CdpPage`]s, shut down cleanly. Chromiumoxide's Drop kills the process
//! if a test panics before `close()`.

use crate::error::{ReadyError, Result};
use crate::page::CdpPage;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Configuration for launching the harness browser.
#[derive(Debug, Clone, Default)]
pub struct HarnessConfig {
    /// Chrome executable path (None = auto-detect).
    pub chrome_path: Option<String>,

    /// Additional Chrome arguments.
    pub extra_args: Vec<String>,
}

impl HarnessConfig {
    fn to_browser_config(&self) -> Result<BrowserConfig> {
        let mut config = BrowserConfig::builder()
            .arg("--headless")
            // Required in containers where user namespaces are unavailable;
            // never run untrusted content with this harness.
            .arg("--no-sandbox")
            // Prevents /dev/shm exhaustion in containerized environments.
            .arg("--disable-dev-shm-usage");

        // Unique profile dir so parallel test binaries don't trip Chrome's
        // ProcessSingleton lock.
        let user_data_dir = std::env::temp_dir().join(format!("ng-ready-{}", uuid::Uuid::new_v4()));
        config = config.arg(format!("--user-data-dir={}", user_data_dir.display()));

        for arg in &self.extra_args {
            config = config.arg(arg.clone());
        }

        if let Some(path) = &self.chrome_path {
            config = config.chrome_executable(path.clone());
        }

        config.build().map_err(|e| ReadyError::LaunchFailed {
            reason: format!("invalid browser configuration: {e}"),
            source: None,
        })
    }
}

/// A managed headless Chrome instance.
///
/// Prefer calling [`close`](ChromeHarness::close) explicitly at the end of a
/// test; Drop cleanup is a fallback for panicking tests.
pub struct ChromeHarness {
    inner: Mutex<Option<Browser>>,
}

impl ChromeHarness {
    /// Launches headless Chrome with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `LaunchFailed` if Chrome is not installed or fails to start.
    pub async fn launch(config: HarnessConfig) -> Result<Self> {
        let browser_config = config.to_browser_config()?;

        let (browser, mut handler) =
            Browser::launch(browser_config)
                .await
                .map_err(|e| ReadyError::LaunchFailed {
                    reason: "failed to launch Chrome process".to_string(),
                    source: Some(Box::new(e)),
                })?;

        // Drive the CDP event loop; chromiumoxide needs this polled.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("browser handler error: {e}");
                }
            }
        });

        debug!("harness browser launched");

        Ok(Self {
            inner: Mutex::new(Some(browser)),
        })
    }

    /// Opens a fresh tab with network capture enabled.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosed` if the harness was closed, or a connection
    /// error if the tab cannot be created.
    pub async fn new_page(&self) -> Result<CdpPage> {
        let guard = self.inner.lock().await;
        let browser = guard.as_ref().ok_or(ReadyError::AlreadyClosed)?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ReadyError::ConnectionFailed(e.to_string()))?;

        CdpPage::new(page).await
    }

    /// Closes the browser and kills the Chrome process.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser fails to close gracefully.
    pub async fn close(self) -> Result<()> {
        let mut guard = self.inner.lock().await;

        if let Some(mut browser) = guard.take() {
            debug!("closing harness browser");
            browser
                .close()
                .await
                .map_err(|e| ReadyError::ConnectionFailed(e.to_string()))?;
        }

        Ok(())
    }
}
