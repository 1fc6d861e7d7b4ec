//! The page-driver seam and its chromiumoxide implementation.
//!
//! The waiter never talks to a browser library directly; it talks to
//! [`PageDriver`], which is the full surface it needs: sequential script
//! round-trips plus a snapshot of observed network activity. Tests drive the
//! waiter with an in-memory fake, production code uses [`CdpPage`] over the
//! Chrome DevTools Protocol.

use crate::error::{ReadyError, Result};
use crate::network::{NetworkCapture, RequestDescriptor};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::page::Page as ChromePage;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// A live browser page as the waiter sees it.
///
/// Implementations must keep script round-trips strictly sequential per
/// page: the waiter awaits each call before issuing the next, and assumes no
/// other evaluation is in flight concurrently.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Evaluates a script and returns its JSON-serializable result.
    ///
    /// A JavaScript `undefined` result must come back as `Value::Null`, not
    /// as an error: the waiter distinguishes "flag is false" from "flag is
    /// gone" through exactly this difference.
    ///
    /// # Errors
    ///
    /// Returns `EvaluationUnsupported` when the page has no script engine,
    /// `ScriptExecutionFailed` for other evaluation failures.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Executes a script for its side effects, discarding the result.
    ///
    /// # Errors
    ///
    /// Returns `ScriptExecutionFailed` if the injection fails.
    async fn execute(&self, script: &str) -> Result<()>;

    /// Snapshot of network requests observed on this page.
    ///
    /// Only consulted to enrich timeout diagnostics; an empty vec is a valid
    /// answer for drivers that do not track traffic.
    fn network_activity(&self) -> Vec<RequestDescriptor>;
}

/// [`PageDriver`] backed by chromiumoxide.
///
/// Wraps a `chromiumoxide::page::Page`, enables the CDP Network domain, and
/// listens for request lifecycle events in background tasks so that timeout
/// diagnostics can report what was still in flight.
#[derive(Debug)]
pub struct CdpPage {
    inner: Arc<ChromePage>,
    network: NetworkCapture,
    _network_tasks: Vec<JoinHandle<()>>,
}

impl CdpPage {
    /// Wraps a chromiumoxide page and starts network capture.
    ///
    /// # Errors
    ///
    /// Returns an error if the Network domain cannot be enabled or an event
    /// listener cannot be registered.
    pub async fn new(page: ChromePage) -> Result<Self> {
        let inner = Arc::new(page);
        let network = NetworkCapture::new();

        inner.execute(EnableParams::default()).await?;

        let mut tasks = Vec::with_capacity(3);

        let capture = network.clone();
        let mut sent = inner.event_listener::<EventRequestWillBeSent>().await?;
        tasks.push(tokio::spawn(async move {
            while let Some(event) = sent.next().await {
                capture.begin(RequestDescriptor::new(
                    event.request_id.inner().clone(),
                    event.request.url.clone(),
                    event.request.method.clone(),
                ));
            }
        }));

        let capture = network.clone();
        let mut finished = inner.event_listener::<EventLoadingFinished>().await?;
        tasks.push(tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                capture.finish(event.request_id.inner());
            }
        }));

        let capture = network.clone();
        let mut failed = inner.event_listener::<EventLoadingFailed>().await?;
        tasks.push(tokio::spawn(async move {
            while let Some(event) = failed.next().await {
                capture.fail(event.request_id.inner(), event.error_text.clone());
            }
        }));

        Ok(Self {
            inner,
            network,
            _network_tasks: tasks,
        })
    }

    /// Returns a handle to the network capture.
    #[must_use]
    pub fn network(&self) -> &NetworkCapture {
        &self.network
    }

    /// Navigates to a URL and waits for `document.readyState` to leave
    /// `loading`.
    ///
    /// # Errors
    ///
    /// Returns `NavigationFailed` if the page fails to load or the document
    /// never becomes ready.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        debug!(url, "navigating");

        self.inner
            .goto(url)
            .await
            .map_err(|e| ReadyError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let state: Value = self
                .evaluate("document.readyState")
                .await
                .unwrap_or(Value::Null);
            if state.as_str().is_some_and(|s| s != "loading") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ReadyError::NavigationFailed {
                    url: url.to_string(),
                    reason: "document never became ready".to_string(),
                });
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .inner
            .evaluate(script)
            .await
            .map_err(|e| ReadyError::ScriptExecutionFailed(e.to_string()))?;

        // chromiumoxide reports `undefined` as an absent value.
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn execute(&self, script: &str) -> Result<()> {
        self.inner
            .evaluate(script)
            .await
            .map_err(|e| ReadyError::ScriptExecutionFailed(e.to_string()))?;
        Ok(())
    }

    fn network_activity(&self) -> Vec<RequestDescriptor> {
        self.network.snapshot()
    }
}
