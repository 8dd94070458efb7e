use std::fmt::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes};
use chrono::Utc;
use paygate_core::{Envelope, Error, RedactedEndpoint};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backoff::{Backoff, parse_retry_after};
use crate::config::ClientConfig;
use crate::observer::{AttemptEvent, AttemptOutcome};
use crate::pool::BufferPool;

/// `User-Agent` sent with every request.
pub const USER_AGENT_VALUE: &str = concat!(
    "paygate/",
    env!("CARGO_PKG_VERSION"),
    " (+",
    env!("CARGO_PKG_REPOSITORY"),
    ")"
);

/// Characters left unescaped in query values (RFC 3986 unreserved).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A logical gateway call: a name for logs, a verb and a path.
#[derive(Debug, Clone)]
pub struct Operation {
    name: &'static str,
    method: Method,
    path: String,
}

impl Operation {
    pub fn new(name: &'static str, method: Method, path: impl Into<String>) -> Self {
        Self {
            name,
            method,
            path: path.into(),
        }
    }

    pub fn get(name: &'static str, path: impl Into<String>) -> Self {
        Self::new(name, Method::GET, path)
    }

    pub fn post(name: &'static str, path: impl Into<String>) -> Self {
        Self::new(name, Method::POST, path)
    }

    /// Append a URL-encoded query parameter.
    #[must_use]
    pub fn query(mut self, key: &str, value: &str) -> Self {
        let separator = if self.path.contains('?') { '&' } else { '?' };
        let _ = write!(
            self.path,
            "{separator}{}={}",
            utf8_percent_encode(key, QUERY_VALUE),
            utf8_percent_encode(value, QUERY_VALUE)
        );
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path including any query string.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Sends gateway operations with bounded retries and decodes the envelope.
///
/// Each call runs its own attempt loop: total attempts are
/// `max_retries + 1`, transient failures wait according to the configured
/// backoff, and the caller's [`CancellationToken`] interrupts both network
/// I/O and backoff waits.
#[derive(Debug)]
pub struct RequestExecutor {
    config: Arc<ClientConfig>,
    http: Client,
    pool: Arc<BufferPool>,
    backoff: Backoff,
}

impl RequestExecutor {
    pub fn new(config: Arc<ClientConfig>) -> Result<Self, Error> {
        let http = Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(config, http))
    }

    /// Create an executor around an existing `reqwest::Client`.
    pub fn with_client(config: Arc<ClientConfig>, http: Client) -> Self {
        let backoff = Backoff::new(config.retry_wait_min(), config.retry_wait_max())
            .with_jitter(Arc::clone(config.jitter()));
        Self {
            config,
            http,
            pool: Arc::new(BufferPool::default()),
            backoff,
        }
    }

    /// Share a buffer pool with other executors.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Execute an operation without a request body.
    pub async fn execute<T>(
        &self,
        operation: &Operation,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        self.run(operation, None, cancel).await
    }

    /// Execute an operation with a JSON body. The body is encoded once and
    /// reused by every attempt.
    pub async fn execute_with_body<B, T>(
        &self,
        operation: &Operation,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut buf = self.pool.acquire();
        serde_json::to_writer((&mut *buf).writer(), body)
            .map_err(|e| Error::validation("body", format!("failed to encode request: {e}")))?;
        let body = buf.split().freeze();
        self.run(operation, Some(body), cancel).await
    }

    /// Endpoint as it should appear in logs.
    fn log_endpoint(&self, path: &str) -> String {
        if self.config.debug() {
            path.to_owned()
        } else {
            RedactedEndpoint::new(path).to_string()
        }
    }

    #[instrument(
        skip(self, operation, body, cancel),
        fields(operation = operation.name(), attempt)
    )]
    async fn run<T>(
        &self,
        operation: &Operation,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        let endpoint = RedactedEndpoint::new(operation.path());
        let log_endpoint = self.log_endpoint(operation.path());
        let url = format!("{}{}", self.config.base_url(), operation.path());
        let max_retries = self.config.max_retries();
        let started = Instant::now();

        let mut last_error = None;

        for attempt in 0..=max_retries {
            tracing::Span::current().record("attempt", attempt);
            let attempt_started = Instant::now();

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err((Error::Cancelled, None)),
                result = self.attempt::<T>(operation, &url, &endpoint, &log_endpoint, body.clone()) => result,
            };

            let (err, status) = match result {
                Ok((data, status)) => {
                    self.observe(AttemptEvent {
                        operation: operation.name(),
                        attempt,
                        endpoint: &endpoint,
                        status: Some(status),
                        elapsed: attempt_started.elapsed(),
                        outcome: AttemptOutcome::Success,
                    });
                    info!(
                        operation = operation.name(),
                        endpoint = %log_endpoint,
                        attempts = attempt + 1,
                        elapsed_ms = as_millis_u64(started.elapsed()),
                        "request completed"
                    );
                    return Ok(data);
                }
                Err(failure) => failure,
            };

            if !err.is_retryable() || attempt == max_retries {
                self.observe(AttemptEvent {
                    operation: operation.name(),
                    attempt,
                    endpoint: &endpoint,
                    status,
                    elapsed: attempt_started.elapsed(),
                    outcome: AttemptOutcome::Failed { kind: err.kind() },
                });
                if !err.is_retryable() {
                    warn!(
                        operation = operation.name(),
                        endpoint = %log_endpoint,
                        attempt,
                        error = %err,
                        "request failed"
                    );
                    return Err(err);
                }
                last_error = Some(err);
                break;
            }

            let wait = self.backoff.next_wait(attempt + 1, err.retry_after());
            self.observe(AttemptEvent {
                operation: operation.name(),
                attempt,
                endpoint: &endpoint,
                status,
                elapsed: attempt_started.elapsed(),
                outcome: AttemptOutcome::Retrying {
                    kind: err.kind(),
                    wait,
                },
            });
            warn!(
                operation = operation.name(),
                endpoint = %log_endpoint,
                attempt,
                error = %err,
                delay_ms = as_millis_u64(wait),
                "retryable error, will retry"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(operation = operation.name(), "cancelled during backoff");
                    return Err(Error::Cancelled);
                }
                () = tokio::time::sleep(wait) => {}
            }
        }

        let attempts = max_retries + 1;
        match last_error {
            Some(err) => {
                warn!(
                    operation = operation.name(),
                    endpoint = %log_endpoint,
                    attempts,
                    error = %err,
                    "request failed, no retries left"
                );
                Err(Error::RetriesExhausted {
                    attempts,
                    source: Box::new(err),
                })
            }
            None => Err(Error::Configuration(
                "retry loop finished without an outcome".into(),
            )),
        }
    }

    /// One request/response exchange. Errors carry the HTTP status when a
    /// response was received.
    async fn attempt<T>(
        &self,
        operation: &Operation,
        url: &str,
        endpoint: &RedactedEndpoint,
        log_endpoint: &str,
        body: Option<Bytes>,
    ) -> Result<(Option<T>, u16), (Error, Option<u16>)>
    where
        T: DeserializeOwned,
    {
        let mut request = self
            .http
            .request(operation.method().clone(), url)
            .timeout(self.config.timeout())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        debug!(
            method = %operation.method(),
            endpoint = %log_endpoint,
            "sending request"
        );

        let response = request
            .send()
            .await
            .map_err(|e| (transport_error(endpoint, e), None))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_retry_after(value, Utc::now()));

        let mut buf = self.pool.acquire();
        drain(response, &mut buf)
            .await
            .map_err(|e| (transport_error(endpoint, e), Some(status)))?;

        debug!(
            status,
            bytes = buf.len(),
            endpoint = %log_endpoint,
            "received response"
        );

        self.classify(status, retry_after, &buf, endpoint)
            .map(|data| (data, status))
            .map_err(|e| (e, Some(status)))
    }

    fn classify<T>(
        &self,
        status: u16,
        retry_after: Option<Duration>,
        body: &[u8],
        endpoint: &RedactedEndpoint,
    ) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        if status == 429 {
            return Err(Error::RateLimited {
                endpoint: endpoint.clone(),
                retry_after,
            });
        }
        if !(200..300).contains(&status) {
            return Err(Error::HttpStatus {
                status,
                endpoint: endpoint.clone(),
                retryable: self.config.retry_policy().is_retryable_status(status),
            });
        }
        if body.trim_ascii().is_empty() {
            return Err(Error::EmptyBody {
                endpoint: endpoint.clone(),
            });
        }

        let envelope = Envelope::from_slice(body)?;
        if !envelope.is_success() {
            return Err(Error::Api {
                code: envelope.code,
                message: envelope.message,
                endpoint: endpoint.clone(),
            });
        }
        envelope.parse_data()
    }

    fn observe(&self, event: AttemptEvent<'_>) {
        let observer = self.config.observer();
        if catch_unwind(AssertUnwindSafe(|| observer.on_attempt(&event))).is_err() {
            warn!(
                operation = event.operation,
                attempt = event.attempt,
                "request observer panicked"
            );
        }
    }
}

async fn drain(mut response: Response, buf: &mut bytes::BytesMut) -> Result<(), reqwest::Error> {
    while let Some(chunk) = response.chunk().await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(())
}

/// The URL is stripped from the message, since it embeds the operator key.
fn transport_error(endpoint: &RedactedEndpoint, err: reqwest::Error) -> Error {
    let message = if err.is_timeout() {
        "request timed out".to_owned()
    } else {
        err.without_url().to_string()
    };
    Error::Transport {
        endpoint: endpoint.clone(),
        message,
    }
}

fn as_millis_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
