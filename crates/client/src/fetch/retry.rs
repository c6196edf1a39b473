//! Bounded retry with an injectable sleeper.

use std::time::Duration;

use super::TransportError;

/// How many times to try a request and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never zero.
    pub max_attempts: u32,
    /// Wait before retry `n` is `backoff_schedule[n]`; the last entry repeats.
    pub backoff_schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)])
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_schedule: Vec<Duration>) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff_schedule }
    }

    /// Delay before the given retry (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let idx = usize::try_from(retry).unwrap_or(usize::MAX);
        self.backoff_schedule.get(idx).or(self.backoff_schedule.last()).copied().unwrap_or(Duration::ZERO)
    }
}

/// Blocks the current thread between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] that calls [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Result of a single attempt.
#[derive(Debug)]
pub enum Outcome<T> {
    /// Finished, successfully or not; do not retry.
    Done(T),
    /// Failed in a way worth retrying.
    Transient(TransportError),
}

/// The retry budget ran out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted {
    pub attempts: u32,
    pub last: TransportError,
}

/// Run `attempt` until it is [`Outcome::Done`] or the policy is exhausted.
///
/// After the `n`th transient failure (1-based) the sleeper is asked to wait
/// `policy.delay_for(n - 1)`. No wait follows the final attempt.
pub fn with_retry<T>(
    policy: &RetryPolicy, sleeper: &dyn Sleeper, target: &str, mut attempt: impl FnMut(u32) -> Outcome<T>,
) -> Result<T, Exhausted> {
    let mut n = 0;
    loop {
        n += 1;
        match attempt(n) {
            Outcome::Done(value) => return Ok(value),
            Outcome::Transient(err) if n >= policy.max_attempts => {
                tracing::warn!(target_url = target, attempts = n, error = %err, "giving up after retries");
                return Err(Exhausted { attempts: n, last: err });
            }
            Outcome::Transient(err) => {
                let delay = policy.delay_for(n - 1);
                tracing::debug!(
                    target_url = target,
                    attempt = n,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                sleeper.sleep(delay);
            }
        }
    }
}
