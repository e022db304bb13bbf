//! Bounded retry policy.
//!
//! The policy is pure data: [`RetryPolicy::attempts`] yields one
//! [`Attempt`] per allowed try, each carrying the delay to wait before
//! it is made. The transport loop in the runtime crate consumes the
//! iterator and stops at the first success, so the delay curve and the
//! attempt budget can be changed and tested without a network.

use std::time::Duration;

/// Default number of extra attempts after the first.
pub const DEFAULT_RETRIES: u32 = 2;
/// Default backoff step.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Backoff grows linearly by this step per failed attempt.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

/// One scheduled try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// How long to wait before making this attempt.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff_base: Duration) -> Self {
        Self {
            retries,
            backoff_base,
        }
    }

    /// Total attempts allowed: the first plus `retries`.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay after the `failed_attempt`-th attempt fails (1-based).
    ///
    /// Linear: `base × failed_attempt`. No jitter.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(failed_attempt)
    }

    /// Iterates the attempt schedule. Always finite.
    pub fn attempts(&self) -> Attempts {
        Attempts {
            policy: *self,
            next: 1,
        }
    }
}

/// Iterator returned by [`RetryPolicy::attempts`].
#[derive(Debug, Clone)]
pub struct Attempts {
    policy: RetryPolicy,
    next: u64,
}

impl Iterator for Attempts {
    type Item = Attempt;

    fn next(&mut self) -> Option<Attempt> {
        if self.next > u64::from(self.policy.max_attempts()) {
            return None;
        }
        let number = self.next as u32;
        self.next += 1;
        let delay = if number == 1 {
            Duration::ZERO
        } else {
            self.policy.backoff(number - 1)
        };
        Some(Attempt { number, delay })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining =
            (u64::from(self.policy.max_attempts()) + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Attempts {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_three_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.attempts().count(), 3);
    }

    #[test]
    fn test_backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
    }

    #[test]
    fn test_attempt_schedule() {
        let policy = RetryPolicy::new(2, Duration::from_millis(200));
        let schedule: Vec<Attempt> = policy.attempts().collect();
        assert_eq!(
            schedule,
            vec![
                Attempt { number: 1, delay: Duration::ZERO },
                Attempt { number: 2, delay: Duration::from_millis(200) },
                Attempt { number: 3, delay: Duration::from_millis(400) },
            ]
        );
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(200));
        let schedule: Vec<Attempt> = policy.attempts().collect();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].delay, Duration::ZERO);
    }

    #[test]
    fn test_size_hint_tracks_progress() {
        let mut it = RetryPolicy::new(3, Duration::from_millis(1)).attempts();
        assert_eq!(it.len(), 4);
        it.next();
        assert_eq!(it.len(), 3);
    }

    #[test]
    fn test_huge_retry_count_does_not_overflow() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), u32::MAX);
        assert!(policy.backoff(u32::MAX) >= Duration::from_secs(1));
    }
}
