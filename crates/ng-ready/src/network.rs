//! In-flight network request capture.
//!
//! Timeout diagnostics need to answer "what was the page still waiting on?",
//! so the CDP adapter records every request it sees and marks completion as
//! loading-finished/failed events arrive. `NetworkCapture` accumulates these
//! descriptors during a test and answers pending/snapshot queries.
//!
//! # Design Rationale
//!
//! We use Arc<Mutex<Vec<RequestDescriptor>>> instead of channels because:
//! 1. The waiter queries the accumulated state, it doesn't consume events
//! 2. Arrival order must be preserved for readable diagnostics
//! 3. No backpressure concerns (test workloads are small)

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// One network request observed on the page.
///
/// `finished` flips once the browser reports the response fully loaded (or
/// the request failed); requests where it is still false at timeout are the
/// interesting ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Protocol-level request id (unique per page session).
    pub id: String,

    /// The request URL.
    pub url: String,

    /// HTTP method (GET, POST, ...).
    pub method: String,

    /// When the request was first observed (system time, not page time).
    pub started: SystemTime,

    /// Whether loading has completed, successfully or not.
    pub finished: bool,

    /// Failure reason if the request errored out.
    pub failed: Option<String>,
}

impl RequestDescriptor {
    /// Creates a descriptor for a request that was just sent.
    #[must_use]
    pub fn new(id: String, url: String, method: String) -> Self {
        Self {
            id,
            url,
            method,
            started: SystemTime::now(),
            finished: false,
            failed: None,
        }
    }
}

/// Thread-safe accumulator of observed network requests.
///
/// Cheaply cloneable (Arc); written by the CDP event-listener tasks and read
/// by the waiter when assembling timeout diagnostics.
#[derive(Debug, Clone, Default)]
pub struct NetworkCapture {
    requests: Arc<Mutex<Vec<RequestDescriptor>>>,
}

impl NetworkCapture {
    /// Creates a new, empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly sent request.
    ///
    /// Called when `Network.requestWillBeSent` fires. If the mutex is
    /// poisoned the event is silently dropped; a panic elsewhere in the test
    /// is the primary failure and missing diagnostics are acceptable.
    pub(crate) fn begin(&self, descriptor: RequestDescriptor) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(descriptor);
        }
    }

    /// Marks a request as completed.
    pub(crate) fn finish(&self, id: &str) {
        if let Ok(mut requests) = self.requests.lock() {
            if let Some(request) = requests.iter_mut().rev().find(|r| r.id == id) {
                request.finished = true;
            }
        }
    }

    /// Marks a request as failed, with the browser-reported reason.
    pub(crate) fn fail(&self, id: &str, reason: String) {
        if let Ok(mut requests) = self.requests.lock() {
            if let Some(request) = requests.iter_mut().rev().find(|r| r.id == id) {
                request.finished = true;
                request.failed = Some(reason);
            }
        }
    }

    /// Returns a snapshot of everything observed so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RequestDescriptor> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Returns the requests that have not completed yet.
    #[must_use]
    pub fn pending(&self) -> Vec<RequestDescriptor> {
        self.snapshot()
            .into_iter()
            .filter(|r| !r.finished)
            .collect()
    }

    /// Returns the count of requests still in flight.
    ///
    /// More efficient than `pending().len()` as it doesn't clone.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|r| !r.finished)
            .count()
    }

    /// Clears all recorded requests.
    ///
    /// Useful when reusing a page across multiple test cases.
    pub fn clear(&self) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }

    /// Returns the total number of requests observed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Returns true if no requests have been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, url: &str) -> RequestDescriptor {
        RequestDescriptor::new(id.into(), url.into(), "GET".into())
    }

    #[test]
    fn capture_tracks_pending_and_finished() {
        let capture = NetworkCapture::new();

        capture.begin(descriptor("1", "http://localhost/a"));
        capture.begin(descriptor("2", "http://localhost/b"));
        assert_eq!(capture.pending_count(), 2);

        capture.finish("1");
        assert_eq!(capture.pending_count(), 1);
        assert_eq!(capture.len(), 2);

        let pending = capture.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "2");
    }

    #[test]
    fn failed_requests_count_as_finished() {
        let capture = NetworkCapture::new();

        capture.begin(descriptor("1", "http://localhost/a"));
        capture.fail("1", "net::ERR_CONNECTION_REFUSED".into());

        assert_eq!(capture.pending_count(), 0);
        let all = capture.snapshot();
        assert_eq!(all[0].failed.as_deref(), Some("net::ERR_CONNECTION_REFUSED"));
    }

    #[test]
    fn finish_for_unknown_id_is_a_no_op() {
        let capture = NetworkCapture::new();
        capture.begin(descriptor("1", "http://localhost/a"));

        capture.finish("nope");
        assert_eq!(capture.pending_count(), 1);
    }

    #[test]
    fn capture_clear() {
        let capture = NetworkCapture::new();
        capture.begin(descriptor("1", "http://localhost/a"));
        assert_eq!(capture.len(), 1);

        capture.clear();
        assert_eq!(capture.len(), 0);
        assert!(capture.is_empty());
    }
}
