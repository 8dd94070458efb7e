use std::fmt;
use std::time::Duration;

use paygate_core::{ErrorKind, RedactedEndpoint};
use tracing::{debug, warn};

/// Result of a single attempt, as reported to a [`RequestObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The attempt produced the final successful result.
    Success,
    /// The attempt failed and another attempt follows after `wait`.
    Retrying { kind: ErrorKind, wait: Duration },
    /// The attempt failed and the operation ends with an error.
    Failed { kind: ErrorKind },
}

/// One attempt boundary of a gateway operation.
#[derive(Debug, Clone)]
pub struct AttemptEvent<'a> {
    pub operation: &'a str,
    /// Zero-based attempt index.
    pub attempt: u32,
    pub endpoint: &'a RedactedEndpoint,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    pub elapsed: Duration,
    pub outcome: AttemptOutcome,
}

/// Hook notified at every attempt boundary.
///
/// Observers cannot influence the retry loop. A panicking observer is
/// caught and logged.
pub trait RequestObserver: Send + Sync {
    fn on_attempt(&self, event: &AttemptEvent<'_>);
}

impl fmt::Debug for dyn RequestObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestObserver")
    }
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RequestObserver for NoopObserver {
    fn on_attempt(&self, _event: &AttemptEvent<'_>) {}
}

/// Observer that forwards attempt events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RequestObserver for TracingObserver {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        let elapsed_ms = u64::try_from(event.elapsed.as_millis()).unwrap_or(u64::MAX);
        match event.outcome {
            AttemptOutcome::Success => debug!(
                operation = event.operation,
                attempt = event.attempt,
                endpoint = %event.endpoint,
                status = event.status,
                elapsed_ms,
                "attempt succeeded"
            ),
            AttemptOutcome::Retrying { kind, wait } => warn!(
                operation = event.operation,
                attempt = event.attempt,
                endpoint = %event.endpoint,
                status = event.status,
                elapsed_ms,
                error_kind = kind.as_str(),
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "attempt failed, retrying"
            ),
            AttemptOutcome::Failed { kind } => warn!(
                operation = event.operation,
                attempt = event.attempt,
                endpoint = %event.endpoint,
                status = event.status,
                elapsed_ms,
                error_kind = kind.as_str(),
                "attempt failed"
            ),
        }
    }
}
