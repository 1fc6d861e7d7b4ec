//! The readiness probe protocol.
//!
//! All knowledge about AngularJS lives here, expressed as a small command set
//! sent through the driver's evaluate/execute primitives: detect the
//! framework, pick a readiness strategy, install the probe, poll the flag,
//! and read framework-internal diagnostics. The host never interprets raw JS
//! values outside this module; every script has a typed decoder next to it.
//!
//! The probe communicates back through a single page global,
//! `window.__ngReady`. Three states matter: `true` (idle), `false` (work
//! pending), and absent (the page navigated and wiped its script
//! environment, or probe setup itself threw). The flag is written by the
//! probe from inside the page's event loop and only read by the host while
//! polling, so there is no concurrent-writer hazard.

use serde_json::Value;

/// The page global the probe reports through.
pub const READY_FLAG: &str = "window.__ngReady";

/// Selector matching the AngularJS mount element.
pub const MOUNT_SELECTOR: &str = "[ng-app], [data-ng-app]";

/// Side-effect-free framework detection.
///
/// True only when the `angular` global exists and a mount element is present
/// in the DOM. Evaluates cleanly on non-Angular pages.
pub const DETECT_SCRIPT: &str = "(typeof angular !== 'undefined') && \
     angular.element(document.querySelector('[ng-app], [data-ng-app]')).length > 0";

/// Feature detection for the modern testability hook.
pub const STRATEGY_SCRIPT: &str =
    "(typeof angular !== 'undefined') && typeof angular.getTestability === 'function'";

/// Reads the readiness flag; decode with [`decode_poll`].
pub const POLL_SCRIPT: &str = "window.__ngReady";

/// Best-effort read of the legacy `$browser` outstanding-request report.
///
/// Returns null whenever the page cannot produce it (modern Angular builds,
/// mid-navigation, injector unavailable). Used only for timeout diagnostics.
pub const DIAGNOSTIC_SCRIPT: &str = r"(function () {
  try {
    var el = document.querySelector('[ng-app], [data-ng-app]');
    var browser = angular.element(el).injector().get('$browser');
    if (typeof browser.getOutstandingRequestCount !== 'function') { return null; }
    return browser.getOutstandingRequestCount() + ' outstanding: ' +
      browser.getOutstandingRequestInfo();
  } catch (e) {
    return null;
  }
})()";

const TESTABILITY_INSTALL: &str = r"(function () {
  window.__ngReady = false;
  function arm() {
    try {
      var el = document.querySelector('[ng-app], [data-ng-app]');
      angular.getTestability(el).whenStable(function () {
        window.__ngReady = true;
      });
    } catch (e) {
      delete window.__ngReady;
    }
  }
  if (document.readyState !== 'loading') {
    arm();
  } else {
    document.addEventListener('DOMContentLoaded', arm);
  }
})();";

const OUTSTANDING_REQUESTS_INSTALL: &str = r"(function () {
  window.__ngReady = false;
  function arm() {
    try {
      var el = document.querySelector('[ng-app], [data-ng-app]');
      var browser = angular.element(el).injector().get('$browser');
      browser.notifyWhenNoOutstandingRequests(function () {
        window.__ngReady = true;
      });
    } catch (e) {
      delete window.__ngReady;
    }
  }
  if (document.readyState !== 'loading') {
    arm();
  } else {
    document.addEventListener('DOMContentLoaded', arm);
  }
})();";

/// What a poll of the readiness flag revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// The framework reported itself idle.
    Ready,
    /// The probe is armed but the framework still has pending work.
    NotReady,
    /// The flag is gone: the page reloaded, or probe setup threw.
    /// The waiter must re-detect and re-install.
    Reset,
}

/// Which framework API the probe arms itself with.
///
/// Selected per install via [`STRATEGY_SCRIPT`], not cached: a mid-wait
/// navigation can land on a page with a different Angular build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessStrategy {
    /// `angular.getTestability(el).whenStable(...)` - covers digests, timers
    /// and HTTP. Preferred when available.
    Testability,
    /// Legacy `$browser.notifyWhenNoOutstandingRequests(...)`, which only
    /// tracks in-flight request counts.
    OutstandingRequests,
}

impl ReadinessStrategy {
    /// The install script for this strategy.
    ///
    /// Both scripts share a contract: reset the flag to false, defer until
    /// the document leaves `loading`, register the idle callback, and on any
    /// exception delete the flag so the host treats it as a context reset
    /// instead of waiting on "not ready" forever.
    #[must_use]
    pub fn install_script(self) -> &'static str {
        match self {
            ReadinessStrategy::Testability => TESTABILITY_INSTALL,
            ReadinessStrategy::OutstandingRequests => OUTSTANDING_REQUESTS_INSTALL,
        }
    }
}

/// Decodes the result of [`DETECT_SCRIPT`]. Anything but `true` is absent.
#[must_use]
pub fn decode_detect(value: &Value) -> bool {
    value.as_bool().unwrap_or(false)
}

/// Decodes the result of [`STRATEGY_SCRIPT`] into a strategy choice.
#[must_use]
pub fn decode_strategy(value: &Value) -> ReadinessStrategy {
    if value.as_bool().unwrap_or(false) {
        ReadinessStrategy::Testability
    } else {
        ReadinessStrategy::OutstandingRequests
    }
}

/// Decodes the result of [`POLL_SCRIPT`] into the tri-state [`ReadyState`].
///
/// `undefined` comes back from drivers as null; any non-boolean value also
/// means the probe's epoch ended (something else clobbered the flag), so it
/// maps to `Reset` as well.
#[must_use]
pub fn decode_poll(value: &Value) -> ReadyState {
    match value.as_bool() {
        Some(true) => ReadyState::Ready,
        Some(false) => ReadyState::NotReady,
        None => ReadyState::Reset,
    }
}

/// Decodes the result of [`DIAGNOSTIC_SCRIPT`], dropping empty reports.
#[must_use]
pub fn decode_diagnostic(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn poll_decoding_is_tri_state() {
        assert_eq!(decode_poll(&json!(true)), ReadyState::Ready);
        assert_eq!(decode_poll(&json!(false)), ReadyState::NotReady);
        assert_eq!(decode_poll(&Value::Null), ReadyState::Reset);
        // A clobbered flag is indistinguishable from a reset.
        assert_eq!(decode_poll(&json!("yes")), ReadyState::Reset);
        assert_eq!(decode_poll(&json!(1)), ReadyState::Reset);
    }

    #[test]
    fn detect_decoding_defaults_to_absent() {
        assert!(decode_detect(&json!(true)));
        assert!(!decode_detect(&json!(false)));
        assert!(!decode_detect(&Value::Null));
        assert!(!decode_detect(&json!("true")));
    }

    #[test]
    fn strategy_selection_prefers_testability() {
        assert_eq!(decode_strategy(&json!(true)), ReadinessStrategy::Testability);
        assert_eq!(
            decode_strategy(&json!(false)),
            ReadinessStrategy::OutstandingRequests
        );
        // Unsupported/undefined feature probes fall back to the legacy API.
        assert_eq!(
            decode_strategy(&Value::Null),
            ReadinessStrategy::OutstandingRequests
        );
    }

    #[test]
    fn install_scripts_match_their_api_variant() {
        let modern = ReadinessStrategy::Testability.install_script();
        assert!(modern.contains("getTestability"));
        assert!(modern.contains("whenStable"));
        assert!(!modern.contains("notifyWhenNoOutstandingRequests"));

        let legacy = ReadinessStrategy::OutstandingRequests.install_script();
        assert!(legacy.contains("notifyWhenNoOutstandingRequests"));
        assert!(!legacy.contains("getTestability"));
    }

    #[test]
    fn install_scripts_reset_then_arm() {
        for strategy in [
            ReadinessStrategy::Testability,
            ReadinessStrategy::OutstandingRequests,
        ] {
            let script = strategy.install_script();
            assert!(script.contains("window.__ngReady = false"));
            assert!(script.contains("delete window.__ngReady"));
            assert!(script.contains(MOUNT_SELECTOR));
        }
    }

    #[test]
    fn diagnostic_decoding_drops_empty_reports() {
        assert_eq!(decode_diagnostic(&Value::Null), None);
        assert_eq!(decode_diagnostic(&json!("")), None);
        assert_eq!(decode_diagnostic(&json!("  ")), None);
        assert_eq!(
            decode_diagnostic(&json!("2 outstanding: $http")),
            Some("2 outstanding: $http".to_owned())
        );
    }
}
