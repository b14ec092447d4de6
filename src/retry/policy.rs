use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::error::Error;

/// Upper bound on a single exponential backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retry, timeout and polling configuration owned by a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts allowed for a single HTTP call on transient failures.
    pub max_connection_retries: u32,
    /// Extra attempts allowed for a whole submit-and-wait task.
    pub max_retries: u32,
    /// Base interval for both retry layers.
    pub retry_interval: Duration,
    /// Deadline for one HTTP call.
    pub request_timeout: Duration,
    /// Overall budget for waiting on a prediction. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Pause between two status fetches of the same prediction.
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_connection_retries: 5,
            max_retries: 0,
            retry_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(120),
            timeout: Some(Duration::from_secs(36_000)),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before task-level retry number `attempt + 1` (`attempt` is 0-based).
    /// delay = retry_interval * (attempt + 1)
    pub fn task_delay(&self, attempt: u32) -> Duration {
        self.retry_interval.saturating_mul(attempt.saturating_add(1))
    }

    /// Start the overall wait budget now. `None` when waiting is unbounded.
    pub fn wait_deadline(&self) -> Option<Deadline> {
        self.timeout.and_then(Deadline::after)
    }

    /// Deadline for the submit call. A synchronous submit blocks until the
    /// prediction finishes, so it gets the overall wait budget instead.
    pub fn submit_deadline(&self, sync: bool) -> Duration {
        match (sync, self.timeout) {
            (true, Some(total)) => total,
            _ => self.request_timeout,
        }
    }
}

/// The overall wait budget of one run, shared by every HTTP call and sleep
/// made on its behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// A budget of `limit` starting now.
    pub fn after(limit: Duration) -> Option<Self> {
        Instant::now()
            .checked_add(limit)
            .map(|at| Self { at, limit })
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Clamp a per-call deadline so it never outlives the budget.
    pub fn clamp(&self, per_call: Duration) -> Duration {
        per_call.min(self.remaining())
    }

    /// The error reported once the budget is spent.
    pub fn timeout_error(&self) -> Error {
        Error::WaitTimeout {
            seconds: self.limit.as_secs_f64(),
        }
    }
}

/// Backoff schedule used between connection-level attempts.
///
/// Each call site picks one and sticks to it: status fetches use
/// [`Backoff::Linear`], submits and uploads use [`Backoff::Exponential`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `interval * retry`.
    Linear,
    /// `interval * 2^(retry - 1)` plus up to half of that again as jitter,
    /// capped at 30 seconds.
    Exponential,
}

impl Backoff {
    /// Delay before connection retry number `retry` (1-based).
    pub fn delay(self, interval: Duration, retry: u32) -> Duration {
        let retry = retry.max(1);
        match self {
            Backoff::Linear => interval.saturating_mul(retry),
            Backoff::Exponential => {
                let exp = 1u32 << (retry - 1).min(16);
                let base = interval.saturating_mul(exp).min(MAX_BACKOFF);
                let half_ms = (base.as_millis() / 2) as u64;
                let jitter = if half_ms > 0 {
                    Duration::from_millis(rand::rng().random_range(0..=half_ms))
                } else {
                    Duration::ZERO
                };
                (base + jitter).min(MAX_BACKOFF)
            }
        }
    }
}

/// Per-call overrides of the client's defaults.
///
/// Unset fields fall back to the client's [`RetryPolicy`] and sync-mode
/// setting; the client itself is never modified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    max_connection_retries: Option<u32>,
    max_retries: Option<u32>,
    retry_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    timeout: Option<Option<Duration>>,
    poll_interval: Option<Duration>,
    enable_sync_mode: Option<bool>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connection_retries(mut self, retries: u32) -> Self {
        self.max_connection_retries = Some(retries);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Overall wait budget for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(Some(timeout));
        self
    }

    /// Wait without an overall deadline.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = Some(None);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn enable_sync_mode(mut self, enabled: bool) -> Self {
        self.enable_sync_mode = Some(enabled);
        self
    }

    /// Merge these overrides over `base`, returning the effective policy.
    pub fn apply(&self, base: &RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_connection_retries: self
                .max_connection_retries
                .unwrap_or(base.max_connection_retries),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            retry_interval: self.retry_interval.unwrap_or(base.retry_interval),
            request_timeout: self.request_timeout.unwrap_or(base.request_timeout),
            timeout: self.timeout.unwrap_or(base.timeout),
            poll_interval: self.poll_interval.unwrap_or(base.poll_interval),
        }
    }

    /// Effective sync-mode flag given the client default.
    pub fn sync_mode(&self, default: bool) -> bool {
        self.enable_sync_mode.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_connection_retries, 5);
        assert_eq!(p.max_retries, 0);
        assert_eq!(p.retry_interval, Duration::from_secs(1));
        assert_eq!(p.timeout, Some(Duration::from_secs(36_000)));
        assert_eq!(p.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn linear_backoff() {
        let interval = Duration::from_secs(1);
        assert_eq!(Backoff::Linear.delay(interval, 1), Duration::from_secs(1));
        assert_eq!(Backoff::Linear.delay(interval, 2), Duration::from_secs(2));
        assert_eq!(Backoff::Linear.delay(interval, 3), Duration::from_secs(3));
    }

    #[test]
    fn exponential_backoff_stays_within_jitter_band() {
        let interval = Duration::from_millis(100);
        for retry in 1..=4u32 {
            let base = interval * (1 << (retry - 1));
            let d = Backoff::Exponential.delay(interval, retry);
            assert!(d >= base, "retry {retry}: {d:?} < {base:?}");
            assert!(d <= base + base / 2, "retry {retry}: {d:?} too large");
        }
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let d = Backoff::Exponential.delay(Duration::from_secs(1), 20);
        assert!(d <= MAX_BACKOFF);
    }

    #[test]
    fn task_delay_grows_linearly() {
        let p = RetryPolicy {
            retry_interval: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(p.task_delay(0), Duration::from_secs(2));
        assert_eq!(p.task_delay(1), Duration::from_secs(4));
    }

    #[test]
    fn submit_deadline_uses_wait_budget_only_in_sync_mode() {
        let p = RetryPolicy {
            request_timeout: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        assert_eq!(p.submit_deadline(false), Duration::from_secs(5));
        assert_eq!(p.submit_deadline(true), Duration::from_secs(60));

        let unbounded = RetryPolicy {
            timeout: None,
            ..p
        };
        assert_eq!(unbounded.submit_deadline(true), Duration::from_secs(5));
    }

    #[test]
    fn deadline_clamps_per_call_timeout() {
        let deadline = Deadline::after(Duration::from_millis(100)).unwrap();
        assert!(!deadline.is_expired());
        assert!(deadline.clamp(Duration::from_secs(120)) <= Duration::from_millis(100));
        assert_eq!(deadline.clamp(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn zero_deadline_is_expired_and_reports_wait_timeout() {
        let deadline = Deadline::after(Duration::ZERO).unwrap();
        assert!(deadline.is_expired());
        assert!(matches!(
            deadline.timeout_error(),
            Error::WaitTimeout { seconds } if seconds == 0.0
        ));
    }

    #[test]
    fn unbounded_policy_has_no_deadline() {
        let p = RetryPolicy {
            timeout: None,
            ..Default::default()
        };
        assert!(p.wait_deadline().is_none());
        assert!(RetryPolicy::default().wait_deadline().is_some());
    }

    #[test]
    fn run_options_override_without_touching_base() {
        let base = RetryPolicy::default();
        let opts = RunOptions::new()
            .max_retries(2)
            .timeout(Duration::from_millis(100))
            .poll_interval(Duration::from_millis(10));
        let effective = opts.apply(&base);

        assert_eq!(effective.max_retries, 2);
        assert_eq!(effective.timeout, Some(Duration::from_millis(100)));
        assert_eq!(effective.poll_interval, Duration::from_millis(10));
        assert_eq!(effective.max_connection_retries, base.max_connection_retries);
        assert_eq!(base, RetryPolicy::default());
    }

    #[test]
    fn run_options_can_remove_timeout() {
        let effective = RunOptions::new().no_timeout().apply(&RetryPolicy::default());
        assert_eq!(effective.timeout, None);
    }

    #[test]
    fn sync_mode_falls_back_to_default() {
        assert!(!RunOptions::new().sync_mode(false));
        assert!(RunOptions::new().sync_mode(true));
        assert!(RunOptions::new().enable_sync_mode(true).sync_mode(false));
    }
}
