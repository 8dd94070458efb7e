//! Request execution for the paygate client.
//!
//! [`RequestExecutor`] turns an [`Operation`] (name, verb, path) and an
//! optional JSON body into an HTTP exchange with the gateway:
//!
//! - the body is encoded once into a pooled buffer and shared by every attempt
//! - transport failures, 429, 404/5xx and empty bodies are retried up to
//!   `max_retries` times with jittered exponential backoff, honouring
//!   `Retry-After`
//! - the response envelope is decoded and its `data` field parsed into the
//!   caller's type
//! - every attempt is reported to the configured [`RequestObserver`]
//!
//! Configuration goes through the validating [`ClientConfigBuilder`] or
//! [`ClientSettings`] loaded from TOML.

mod backoff;
mod config;
mod executor;
mod observer;
mod policy;
mod pool;

pub use backoff::{
    Backoff, JitterSource, NoJitter, SeededJitter, ThreadRngJitter, next_wait, parse_retry_after,
};
pub use config::{
    ClientConfig, ClientConfigBuilder, ClientSettings, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_WAIT_MAX, DEFAULT_RETRY_WAIT_MIN, DEFAULT_TIMEOUT, MIN_TIMEOUT,
};
pub use executor::{Operation, RequestExecutor, USER_AGENT_VALUE};
pub use observer::{AttemptEvent, AttemptOutcome, NoopObserver, RequestObserver, TracingObserver};
pub use policy::RetryPolicy;
pub use pool::{BufferPool, PooledBuffer};

pub use tokio_util::sync::CancellationToken;
