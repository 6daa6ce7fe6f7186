//! Bounded retries for malformed LM output.
//!
//! Planner, OODA orientation and Program Space matching all ask the LM for a
//! response of a particular shape and try again when the shape is wrong. A
//! [`RetryPolicy`] caps the number of attempts and sleeps with exponential
//! backoff (plus jitter) between them. Transport failures are not retried here:
//! the attempt closure returns them as `Err` and the loop stops immediately.

use std::time::Duration;

use rand::Rng;

/// Outcome of one attempt at obtaining a well-shaped value.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// The response had the expected shape.
    Valid(T),
    /// The response was malformed; `reason` is kept for diagnostics.
    Invalid { reason: String },
}

impl<T> Attempt<T> {
    /// Shorthand for [`Attempt::Invalid`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// Why a retry loop gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt produced malformed output.
    Exhausted { attempts: u32, last_reason: String },
    /// An attempt failed for a reason retrying cannot fix.
    Fatal(E),
}

/// Attempt cap and backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Sleep before the second attempt.
    pub initial_backoff: Duration,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
    /// Upper bound for any single sleep.
    pub max_backoff: Duration,
    /// Scale each sleep by a random factor in `[0.5, 1.0)`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries up to `max_attempts` times without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
            jitter: false,
        }
    }

    /// Backoff before attempt number `attempt + 1` (attempts are 1-based).
    ///
    /// Jitter is not applied here so the schedule stays inspectable.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Run `attempt_fn` until it yields [`Attempt::Valid`], fails fatally, or
    /// the attempt budget runs out.
    ///
    /// `what` names the operation in log output.
    pub fn run<T, E, F>(&self, what: &str, mut attempt_fn: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Result<Attempt<T>, E>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            match attempt_fn(attempt).map_err(RetryError::Fatal)? {
                Attempt::Valid(value) => return Ok(value),
                Attempt::Invalid { reason } => {
                    tracing::warn!(what, attempt, max_attempts, %reason, "malformed LM output");
                    last_reason = reason;
                }
            }

            if attempt < max_attempts {
                let pause = self.jittered(self.backoff_for(attempt));
                if !pause.is_zero() {
                    std::thread::sleep(pause);
                }
            }
        }

        Err(RetryError::Exhausted {
            attempts: max_attempts,
            last_reason,
        })
    }

    fn jittered(&self, pause: Duration) -> Duration {
        if !self.jitter || pause.is_zero() {
            return pause;
        }
        let factor: f64 = rand::thread_rng().gen_range(0.5..1.0);
        pause.mul_f64(factor)
    }
}
