use rand::Rng;

pub const BACKOFF_BASE_MS: i64 = 1_000;
pub const BACKOFF_MAX_MS: i64 = 30_000;
pub const BACKOFF_MAX_FAILURES: u32 = 6;

/// Spacing for automatic refills after consecutive gateway failures.
///
/// Delay doubles per failure from `base_ms` up to `max_ms`, plus up to 25%
/// jitter. Once `max_failures` is reached automatic refills stop until a
/// success or an explicit reset.
#[derive(Debug, Clone, PartialEq)]
pub struct RefillBackoff {
    base_ms: i64,
    max_ms: i64,
    max_failures: u32,
    failures: u32,
    retry_at_ms: Option<i64>,
}

impl Default for RefillBackoff {
    fn default() -> Self {
        Self::new(BACKOFF_BASE_MS, BACKOFF_MAX_MS, BACKOFF_MAX_FAILURES)
    }
}

impl RefillBackoff {
    pub fn new(base_ms: i64, max_ms: i64, max_failures: u32) -> Self {
        Self {
            base_ms: base_ms.max(0),
            max_ms: max_ms.max(base_ms.max(0)),
            max_failures: max_failures.max(1),
            failures: 0,
            retry_at_ms: None,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn retry_at_ms(&self) -> Option<i64> {
        self.retry_at_ms
    }

    pub fn is_exhausted(&self) -> bool {
        self.failures >= self.max_failures
    }

    /// Whether an automatic attempt may start at `now_ms`.
    pub fn allows(&self, now_ms: i64) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.retry_at_ms.map_or(true, |at| now_ms >= at)
    }

    /// Un-jittered delay that follows the current failure count.
    pub fn delay_ms(&self) -> i64 {
        if self.failures == 0 {
            return 0;
        }
        let exponent = (self.failures - 1).min(20);
        self.base_ms
            .saturating_mul(1_i64 << exponent)
            .min(self.max_ms)
    }

    pub fn record_failure(&mut self, now_ms: i64) {
        self.failures = self.failures.saturating_add(1);
        let delay = self.delay_ms();
        let jitter = if delay >= 4 {
            rand::thread_rng().gen_range(0..=delay / 4)
        } else {
            0
        };
        self.retry_at_ms = Some(now_ms.saturating_add(delay + jitter));
    }

    pub fn reset(&mut self) {
        self.failures = 0;
        self.retry_at_ms = None;
    }
}

/// The one wake-up timer armed for a backoff deadline.
///
/// A timer is started only when the deadline changes; a timer whose
/// deadline has since been replaced fires as a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryTimer {
    armed_for: Option<i64>,
}

impl RetryTimer {
    /// Returns `true` when a new timer must be started for `deadline_ms`.
    pub fn arm(&mut self, deadline_ms: i64) -> bool {
        if self.armed_for == Some(deadline_ms) {
            return false;
        }
        self.armed_for = Some(deadline_ms);
        true
    }

    /// Returns `true` when the timer for `deadline_ms` is still the current one.
    pub fn fire(&mut self, deadline_ms: i64) -> bool {
        if self.armed_for != Some(deadline_ms) {
            return false;
        }
        self.armed_for = None;
        true
    }

    pub fn armed_for(&self) -> Option<i64> {
        self.armed_for
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_backoff_never_delays() {
        let backoff = RefillBackoff::default();
        assert!(backoff.allows(0));
        assert_eq!(backoff.delay_ms(), 0);
    }

    #[test]
    fn delay_doubles_and_caps() {
        let mut backoff = RefillBackoff::new(1_000, 5_000, 10);
        let mut delays = Vec::new();
        for _ in 0..5 {
            backoff.record_failure(0);
            delays.push(backoff.delay_ms());
        }
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000]);
    }

    #[test]
    fn retry_deadline_includes_bounded_jitter() {
        let mut backoff = RefillBackoff::new(1_000, 30_000, 10);
        backoff.record_failure(10_000);
        let at = backoff.retry_at_ms().unwrap();
        assert!((11_000..=11_250).contains(&at), "deadline {at}");
        assert!(!backoff.allows(10_999));
        assert!(backoff.allows(11_250));
    }

    #[test]
    fn exhausts_after_max_failures_until_reset() {
        let mut backoff = RefillBackoff::new(10, 100, 2);
        backoff.record_failure(0);
        assert!(!backoff.is_exhausted());
        backoff.record_failure(0);
        assert!(backoff.is_exhausted());
        assert!(!backoff.allows(i64::MAX));
        backoff.reset();
        assert!(backoff.allows(0));
        assert_eq!(backoff.failures(), 0);
    }

    #[test]
    fn timer_is_armed_once_per_deadline() {
        let mut timer = RetryTimer::default();
        assert!(timer.arm(1_000));
        assert!(!timer.arm(1_000));
        assert!(!timer.arm(1_000));
        assert_eq!(timer.armed_for(), Some(1_000));

        assert!(timer.fire(1_000));
        assert_eq!(timer.armed_for(), None);
        // The same deadline can be armed again once its timer has fired
        assert!(timer.arm(1_000));
    }

    #[test]
    fn replaced_deadline_fires_as_noop() {
        let mut timer = RetryTimer::default();
        assert!(timer.arm(1_000));
        assert!(timer.arm(3_000));
        assert!(!timer.fire(1_000));
        assert_eq!(timer.armed_for(), Some(3_000));
        assert!(timer.fire(3_000));
        assert!(!timer.fire(3_000));
    }
}
