use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the random component added to computed backoff waits.
pub trait JitterSource: Send + Sync + fmt::Debug {
    /// A uniformly distributed duration in `[0, bound)`. Must return zero
    /// when `bound` is zero.
    fn jitter(&self, bound: Duration) -> Duration;
}

/// Jitter drawn from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn jitter(&self, bound: Duration) -> Duration {
        sample(&mut rand::thread_rng(), bound)
    }
}

/// Deterministic jitter from a seeded [`StdRng`].
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn jitter(&self, bound: Duration) -> Duration {
        sample(&mut *self.rng.lock(), bound)
    }
}

/// No jitter at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn jitter(&self, _bound: Duration) -> Duration {
        Duration::ZERO
    }
}

fn sample(rng: &mut impl Rng, bound: Duration) -> Duration {
    let nanos = u64::try_from(bound.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rng.gen_range(0..nanos))
}

/// Wait before retry number `attempt`.
///
/// `attempt` is 1 for the first retry; attempt 0 never waits. A non-zero
/// `server_suggested` wait wins and is capped at `max_wait`. Otherwise the
/// wait is `min(min_wait * 2^(attempt - 1), max_wait)` plus jitter in
/// `[0, base / 4)`, so it never exceeds `max_wait * 1.25`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use paygate_executor::{NoJitter, next_wait};
///
/// let min = Duration::from_millis(500);
/// let max = Duration::from_secs(2);
/// assert_eq!(next_wait(0, min, max, None, &NoJitter), Duration::ZERO);
/// assert_eq!(next_wait(1, min, max, None, &NoJitter), min);
/// assert_eq!(next_wait(2, min, max, None, &NoJitter), Duration::from_secs(1));
/// assert_eq!(next_wait(9, min, max, None, &NoJitter), max);
/// assert_eq!(
///     next_wait(1, min, max, Some(Duration::from_secs(3600)), &NoJitter),
///     max
/// );
/// ```
pub fn next_wait(
    attempt: u32,
    min_wait: Duration,
    max_wait: Duration,
    server_suggested: Option<Duration>,
    jitter: &dyn JitterSource,
) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    if let Some(suggested) = server_suggested.filter(|wait| !wait.is_zero()) {
        return suggested.min(max_wait);
    }

    let base = 2_u32
        .checked_pow(attempt - 1)
        .and_then(|factor| min_wait.checked_mul(factor))
        .map_or(max_wait, |wait| wait.min(max_wait));

    base + jitter.jitter(base / 4)
}

/// Backoff bounds paired with a jitter source.
#[derive(Clone)]
pub struct Backoff {
    min_wait: Duration,
    max_wait: Duration,
    jitter: Arc<dyn JitterSource>,
}

impl Backoff {
    pub fn new(min_wait: Duration, max_wait: Duration) -> Self {
        Self {
            min_wait,
            max_wait,
            jitter: Arc::new(ThreadRngJitter),
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn min_wait(&self) -> Duration {
        self.min_wait
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// See [`next_wait`].
    pub fn next_wait(&self, attempt: u32, server_suggested: Option<Duration>) -> Duration {
        next_wait(
            attempt,
            self.min_wait,
            self.max_wait,
            server_suggested,
            self.jitter.as_ref(),
        )
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff")
            .field("min_wait", &self.min_wait)
            .field("max_wait", &self.max_wait)
            .field("jitter", &self.jitter)
            .finish()
    }
}

/// Parse a `Retry-After` header value relative to `now`.
///
/// Accepts delay-seconds or an RFC 1123 HTTP-date. Zero, negative and past
/// values yield `None`, meaning no server suggestion.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<i64>() {
        return u64::try_from(seconds)
            .ok()
            .filter(|&s| s > 0)
            .map(Duration::from_secs);
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&Utc) - now;
    wait.to_std().ok().filter(|wait| !wait.is_zero())
}
