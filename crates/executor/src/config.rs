use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use paygate_core::{Error, IpAllowlist, REDACTED};
use paygate_crypto::DigestAlgorithm;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::backoff::{JitterSource, ThreadRngJitter};
use crate::observer::{NoopObserver, RequestObserver};
use crate::policy::RetryPolicy;

/// Production gateway endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.thegspay.com";
/// Per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Shortest accepted per-attempt timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_WAIT_MIN: Duration = Duration::from_millis(500);
pub const DEFAULT_RETRY_WAIT_MAX: Duration = Duration::from_secs(2);

/// Immutable client configuration shared by every operation.
///
/// Built through [`ClientConfig::builder`], which validates every field.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use paygate_executor::ClientConfig;
///
/// let config = ClientConfig::builder("operator-key", "secret-key")
///     .timeout(Duration::from_secs(10))
///     .max_retries(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url(), "https://api.thegspay.com");
/// assert_eq!(config.max_retries(), 5);
/// ```
pub struct ClientConfig {
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_wait_min: Duration,
    retry_wait_max: Duration,
    auth_key: String,
    secret_key: SecretString,
    ip_allowlist: IpAllowlist,
    observer: Arc<dyn RequestObserver>,
    jitter: Arc<dyn JitterSource>,
    debug: bool,
    digest: DigestAlgorithm,
    retry_policy: RetryPolicy,
}

impl ClientConfig {
    pub fn builder(
        auth_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> ClientConfigBuilder {
        ClientConfigBuilder::new(auth_key, secret_key)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_wait_min(&self) -> Duration {
        self.retry_wait_min
    }

    pub fn retry_wait_max(&self) -> Duration {
        self.retry_wait_max
    }

    /// Public operator identifier embedded in endpoint paths.
    pub fn auth_key(&self) -> &str {
        &self.auth_key
    }

    pub fn secret_key(&self) -> &SecretString {
        &self.secret_key
    }

    pub fn ip_allowlist(&self) -> &IpAllowlist {
        &self.ip_allowlist
    }

    pub fn observer(&self) -> &Arc<dyn RequestObserver> {
        &self.observer
    }

    pub fn jitter(&self) -> &Arc<dyn JitterSource> {
        &self.jitter
    }

    /// When set, logs show raw endpoints and account details.
    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn digest(&self) -> DigestAlgorithm {
        self.digest
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_wait_min", &self.retry_wait_min)
            .field("retry_wait_max", &self.retry_wait_max)
            .field("auth_key", &REDACTED)
            .field("secret_key", &REDACTED)
            .field("ip_allowlist", &self.ip_allowlist)
            .field("jitter", &self.jitter)
            .field("debug", &self.debug)
            .field("digest", &self.digest)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_wait_min: Duration,
    retry_wait_max: Duration,
    auth_key: String,
    secret_key: SecretString,
    ip_allowlist: Vec<String>,
    observer: Arc<dyn RequestObserver>,
    jitter: Arc<dyn JitterSource>,
    debug: bool,
    digest: DigestAlgorithm,
    retry_policy: RetryPolicy,
}

impl ClientConfigBuilder {
    pub fn new(auth_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_wait_min: DEFAULT_RETRY_WAIT_MIN,
            retry_wait_max: DEFAULT_RETRY_WAIT_MAX,
            auth_key: auth_key.into(),
            secret_key: SecretString::new(secret_key.into()),
            ip_allowlist: Vec::new(),
            observer: Arc::new(NoopObserver),
            jitter: Arc::new(ThreadRngJitter),
            debug: false,
            digest: DigestAlgorithm::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Set the gateway base URL. A trailing slash is dropped.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-attempt timeout. Must be at least five seconds.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many retries follow the first attempt.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff bounds.
    #[must_use]
    pub fn retry_wait(mut self, min: Duration, max: Duration) -> Self {
        self.retry_wait_min = min;
        self.retry_wait_max = max;
        self
    }

    /// Restrict callback sources to these addresses and CIDR ranges.
    #[must_use]
    pub fn ip_allowlist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ip_allowlist = entries.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the backoff jitter source, e.g. with a seeded one in tests.
    #[must_use]
    pub fn jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<ClientConfig, Error> {
        if self.auth_key.trim().is_empty() {
            return Err(Error::Configuration("auth key must not be empty".into()));
        }
        if !is_path_segment(&self.auth_key) {
            return Err(Error::Configuration(
                "auth key may only contain ASCII letters, digits, '-', '.', '_' and '~'".into(),
            ));
        }
        if self.secret_key.expose_secret().trim().is_empty() {
            return Err(Error::Configuration("secret key must not be empty".into()));
        }

        let base_url = self.base_url.trim().trim_end_matches('/').to_owned();
        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|e| Error::Configuration(format!("invalid base URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "base URL must use http or https, got {}",
                parsed.scheme()
            )));
        }

        if self.timeout < MIN_TIMEOUT {
            return Err(Error::Configuration(format!(
                "timeout must be at least {}s, got {:?}",
                MIN_TIMEOUT.as_secs(),
                self.timeout
            )));
        }
        if self.retry_wait_min > self.retry_wait_max {
            return Err(Error::Configuration(format!(
                "minimum retry wait {:?} exceeds maximum {:?}",
                self.retry_wait_min, self.retry_wait_max
            )));
        }

        let ip_allowlist = IpAllowlist::parse(&self.ip_allowlist)?;

        Ok(ClientConfig {
            base_url,
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_wait_min: self.retry_wait_min,
            retry_wait_max: self.retry_wait_max,
            auth_key: self.auth_key,
            secret_key: self.secret_key,
            ip_allowlist,
            observer: self.observer,
            jitter: self.jitter,
            debug: self.debug,
            digest: self.digest,
            retry_policy: self.retry_policy,
        })
    }
}

/// Unreserved characters only, and not a dot segment.
fn is_path_segment(key: &str) -> bool {
    key.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
        && key.bytes().any(|b| b != b'.')
}

impl fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfigBuilder")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("auth_key", &REDACTED)
            .field("secret_key", &REDACTED)
            .field("ip_allowlist", &self.ip_allowlist)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

/// File-based client settings, typically loaded from TOML.
///
/// ```toml
/// auth_key = "operator-key"
/// secret_key = "secret-key"
/// timeout_secs = 15
/// ip_whitelist = ["203.0.113.0/24"]
/// ```
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: String,
    pub auth_key: String,
    /// Wrapped in [`SecretString`] so it is redacted in logs.
    pub secret_key: SecretString,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_wait_min_ms: u64,
    pub retry_wait_max_ms: u64,
    pub ip_whitelist: Vec<String>,
    pub debug: bool,
    pub digest: DigestAlgorithm,
    pub retry_not_found: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            auth_key: String::new(),
            secret_key: SecretString::new(String::new()),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_wait_min_ms: duration_ms(DEFAULT_RETRY_WAIT_MIN),
            retry_wait_max_ms: duration_ms(DEFAULT_RETRY_WAIT_MAX),
            ip_whitelist: Vec::new(),
            debug: false,
            digest: DigestAlgorithm::default(),
            retry_not_found: true,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl ClientSettings {
    /// Parse settings from a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        toml::from_str(raw).map_err(|e| Error::Configuration(format!("invalid settings: {e}")))
    }

    /// Turn the settings into a builder, for further programmatic overrides.
    pub fn into_builder(self) -> ClientConfigBuilder {
        ClientConfigBuilder::new(self.auth_key, self.secret_key.expose_secret().clone())
            .base_url(self.base_url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries)
            .retry_wait(
                Duration::from_millis(self.retry_wait_min_ms),
                Duration::from_millis(self.retry_wait_max_ms),
            )
            .ip_allowlist(self.ip_whitelist)
            .debug(self.debug)
            .digest(self.digest)
            .retry_policy(RetryPolicy {
                retry_not_found: self.retry_not_found,
            })
    }
}

#[cfg(test)]
mod tests {
    use paygate_core::ErrorKind;

    use super::*;

    fn builder() -> ClientConfigBuilder {
        ClientConfig::builder("operator-key", "secret-key")
    }

    #[test]
    fn defaults() {
        let config = builder().build().unwrap();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries(), 3);
        assert_eq!(config.retry_wait_min(), Duration::from_millis(500));
        assert_eq!(config.retry_wait_max(), Duration::from_secs(2));
        assert_eq!(config.digest(), DigestAlgorithm::Md5);
        assert!(config.retry_policy().retry_not_found);
        assert!(config.ip_allowlist().is_empty());
        assert!(!config.debug());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = builder()
            .base_url("https://sandbox.example.com/")
            .build()
            .unwrap();
        assert_eq!(config.base_url(), "https://sandbox.example.com");
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            ClientConfig::builder("", "secret"),
            ClientConfig::builder("key", "  "),
            builder().base_url("not a url"),
            builder().base_url("ftp://example.com"),
            builder().timeout(Duration::from_secs(4)),
            builder().retry_wait(Duration::from_secs(3), Duration::from_secs(1)),
            builder().ip_allowlist(["10.0.0.0/40"]),
        ];
        for case in cases {
            let err = case.build().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{err}");
        }
    }

    #[test]
    fn auth_key_must_be_a_single_path_segment() {
        for key in ["abc/def", "abc?xyz", "abc#frag", "abc%2Fdef", "a b", "..", "."] {
            let err = ClientConfig::builder(key, "secret").build().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{key}");
        }
        let err = ClientConfig::builder("abc?xyz", "secret").build().unwrap_err();
        assert!(!err.to_string().contains("xyz"), "{err}");

        let config = ClientConfig::builder("Op-Key_1.v2~x", "secret")
            .build()
            .unwrap();
        assert_eq!(config.auth_key(), "Op-Key_1.v2~x");
    }

    #[test]
    fn accepts_minimum_timeout_and_equal_waits() {
        let config = builder()
            .timeout(MIN_TIMEOUT)
            .retry_wait(Duration::from_secs(1), Duration::from_secs(1))
            .ip_allowlist(["203.0.113.7", "10.0.0.0/8"])
            .build()
            .unwrap();
        assert_eq!(config.ip_allowlist().len(), 2);
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = builder().build().unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("operator-key"));
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));

        let debug = format!("{:?}", builder());
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn settings_from_toml() {
        let settings = ClientSettings::from_toml(
            r#"
            base_url = "https://sandbox.example.com/"
            auth_key = "operator-key"
            secret_key = "secret-key"
            timeout_secs = 15
            max_retries = 1
            retry_wait_min_ms = 100
            retry_wait_max_ms = 400
            ip_whitelist = ["203.0.113.0/24"]
            digest = "sha256"
            retry_not_found = false
            "#,
        )
        .unwrap();
        assert!(!format!("{settings:?}").contains("secret-key"));

        let config = settings.into_builder().build().unwrap();
        assert_eq!(config.base_url(), "https://sandbox.example.com");
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert_eq!(config.max_retries(), 1);
        assert_eq!(config.retry_wait_max(), Duration::from_millis(400));
        assert_eq!(config.digest(), DigestAlgorithm::Sha256);
        assert!(!config.retry_policy().retry_not_found);
        assert_eq!(config.secret_key().expose_secret(), "secret-key");
    }

    #[test]
    fn settings_defaults_fill_missing_fields() {
        let settings =
            ClientSettings::from_toml("auth_key = \"k\"\nsecret_key = \"s\"\n").unwrap();
        let config = settings.into_builder().build().unwrap();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.max_retries(), DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn settings_without_keys_fail_validation() {
        let settings = ClientSettings::from_toml("").unwrap();
        let err = settings.into_builder().build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn malformed_toml_is_configuration_error() {
        let err = ClientSettings::from_toml("max_retries = \"three\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
