use serde::{Deserialize, Serialize};

/// Which non-2xx statuses (other than 429) are treated as transient.
///
/// 5xx responses are always retried; 404 is retried unless
/// `retry_not_found` is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub retry_not_found: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_not_found: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that treats 404 as terminal.
    pub fn strict() -> Self {
        Self {
            retry_not_found: false,
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        match status {
            404 => self.retry_not_found,
            500..=599 => true,
            _ => false,
        }
    }
}
