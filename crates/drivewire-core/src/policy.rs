//! Retry policy for "wait until" style commands.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time to keep polling.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default pause between two probes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// How long to poll, how often, and what to do when time runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub wait_timeout: Duration,
    pub interval: Duration,
    pub raise_on_timeout: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
            raise_on_timeout: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(wait_timeout: Duration, interval: Duration, raise_on_timeout: bool) -> Self {
        Self {
            wait_timeout,
            interval,
            raise_on_timeout,
        }
    }

    /// A single best-effort check used by compound operations.
    pub fn single_check() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, false)
    }

    /// Apply call-site overrides on top of this policy.
    pub fn with(self, overrides: RetryOverrides) -> Self {
        overrides.resolve(self)
    }
}

/// Per-call overrides. Unset fields fall back to the session's defaults
/// for that same field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryOverrides {
    pub wait_timeout: Option<Duration>,
    pub interval: Option<Duration>,
    pub raise_on_timeout: Option<bool>,
}

impl RetryOverrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn wait(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn raise(mut self, raise: bool) -> Self {
        self.raise_on_timeout = Some(raise);
        self
    }

    pub fn resolve(self, defaults: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            wait_timeout: self.wait_timeout.unwrap_or(defaults.wait_timeout),
            interval: self.interval.unwrap_or(defaults.interval),
            raise_on_timeout: self.raise_on_timeout.unwrap_or(defaults.raise_on_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_fields_fall_back_to_same_field() {
        let defaults = RetryPolicy::new(Duration::from_secs(5), Duration::from_millis(200), true);
        let resolved = RetryOverrides::none()
            .wait(Duration::from_secs(1))
            .resolve(defaults);

        assert_eq!(resolved.wait_timeout, Duration::from_secs(1));
        assert_eq!(resolved.interval, Duration::from_millis(200));
        assert!(resolved.raise_on_timeout);
    }

    #[test]
    fn test_raise_override_does_not_touch_interval() {
        let defaults = RetryPolicy::default();
        let resolved = defaults.with(RetryOverrides::none().raise(true));
        assert_eq!(resolved.interval, DEFAULT_INTERVAL);
        assert!(resolved.raise_on_timeout);
    }

    #[test]
    fn test_single_check_never_raises() {
        let policy = RetryPolicy::single_check();
        assert_eq!(policy.wait_timeout, Duration::ZERO);
        assert!(!policy.raise_on_timeout);
    }
}
