use std::time::Duration;

use thiserror::Error;

use crate::redact::RedactedEndpoint;

/// Coarse classification of an [`Error`], used for matching without caring
/// about the carried context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    RateLimited,
    HttpStatus,
    EmptyBody,
    MalformedBody,
    Api,
    SignatureMismatch,
    Validation,
    MissingField,
    InvalidIpAddress,
    IpNotWhitelisted,
    Cancelled,
    Configuration,
}

impl ErrorKind {
    /// Returns the kind as a short uppercase code, suitable for log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "TRANSPORT",
            Self::RateLimited => "RATE_LIMITED",
            Self::HttpStatus => "HTTP_STATUS",
            Self::EmptyBody => "EMPTY_BODY",
            Self::MalformedBody => "MALFORMED_BODY",
            Self::Api => "API",
            Self::SignatureMismatch => "SIGNATURE_MISMATCH",
            Self::Validation => "VALIDATION",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidIpAddress => "INVALID_IP_ADDRESS",
            Self::IpNotWhitelisted => "IP_NOT_WHITELISTED",
            Self::Cancelled => "CANCELLED",
            Self::Configuration => "CONFIGURATION",
        }
    }
}

/// Classified error returned by every gateway operation.
///
/// Endpoints are stored as [`RedactedEndpoint`] values, so the `Display`
/// output of any variant never contains the operator identifier or the
/// secret key.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection, DNS, timeout or body-read failure.
    #[error("transport error on {endpoint}: {message}")]
    Transport {
        endpoint: RedactedEndpoint,
        message: String,
    },

    /// The gateway answered HTTP 429.
    #[error("rate limited on {endpoint}")]
    RateLimited {
        endpoint: RedactedEndpoint,
        /// Wait requested through `Retry-After`, if any.
        retry_after: Option<Duration>,
    },

    /// Non-2xx status other than 429.
    #[error("HTTP {status} on {endpoint}")]
    HttpStatus {
        status: u16,
        endpoint: RedactedEndpoint,
        /// Whether the retry policy classified this status as transient.
        retryable: bool,
    },

    /// A 2xx response with a zero-length body.
    #[error("empty response body from {endpoint}")]
    EmptyBody { endpoint: RedactedEndpoint },

    /// The body or its `data` field could not be decoded.
    #[error("malformed response body: {message}")]
    MalformedBody { message: String },

    /// The envelope decoded but carried a non-success inner code.
    #[error("API error {code} on {endpoint}: {message}")]
    Api {
        code: i64,
        message: String,
        endpoint: RedactedEndpoint,
    },

    /// A computed digest disagrees with the supplied one.
    #[error("invalid signature")]
    SignatureMismatch,

    /// Caller input failed a precondition; raised before any network call.
    #[error("validation error for {field}: {message}")]
    Validation { field: String, message: String },

    /// A field required for signature verification is absent.
    #[error("missing required callback field: {field}")]
    MissingField { field: String },

    /// The candidate source address is not a valid IP address.
    #[error("invalid IP address format: {address}")]
    InvalidIpAddress { address: String },

    /// The candidate source address is valid but not in the allow-list.
    #[error("IP address not whitelisted: {address}")]
    IpNotWhitelisted { address: String },

    /// The caller's cancellation token fired.
    #[error("request cancelled")]
    Cancelled,

    /// The client was given invalid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Every allowed attempt failed; wraps the last classified error.
    #[error("request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Build a validation error for the named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build a missing-field error for the named field.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Build a malformed-body error from a decode failure.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedBody {
            message: message.into(),
        }
    }

    /// Returns the classification of this error. A [`Error::RetriesExhausted`]
    /// reports the kind of the error it wraps.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::EmptyBody { .. } => ErrorKind::EmptyBody,
            Self::MalformedBody { .. } => ErrorKind::MalformedBody,
            Self::Api { .. } => ErrorKind::Api,
            Self::SignatureMismatch => ErrorKind::SignatureMismatch,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::InvalidIpAddress { .. } => ErrorKind::InvalidIpAddress,
            Self::IpNotWhitelisted { .. } => ErrorKind::IpNotWhitelisted,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::RetriesExhausted { source, .. } => source.kind(),
        }
    }

    /// Returns `true` if another attempt within the retry budget may
    /// succeed.
    ///
    /// An exhausted error is never retryable: its budget is spent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::RateLimited { .. } | Self::EmptyBody { .. } => true,
            Self::HttpStatus { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Total attempts made, when the error ended a retry loop.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Server-suggested wait carried by a rate-limited error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            Self::RetriesExhausted { source, .. } => source.retry_after(),
            _ => None,
        }
    }

    /// HTTP status or inner API code carried by this error.
    pub fn status_code(&self) -> Option<i64> {
        match self {
            Self::HttpStatus { status, .. } => Some(i64::from(*status)),
            Self::RateLimited { .. } => Some(429),
            Self::Api { code, .. } => Some(*code),
            Self::RetriesExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// Redacted endpoint the error was raised for, if any.
    pub fn endpoint(&self) -> Option<&RedactedEndpoint> {
        match self {
            Self::Transport { endpoint, .. }
            | Self::RateLimited { endpoint, .. }
            | Self::HttpStatus { endpoint, .. }
            | Self::EmptyBody { endpoint }
            | Self::Api { endpoint, .. } => Some(endpoint),
            Self::RetriesExhausted { source, .. } => source.endpoint(),
            _ => None,
        }
    }

    /// The innermost classified error, unwrapping [`Error::RetriesExhausted`].
    pub fn last_error(&self) -> &Error {
        match self {
            Self::RetriesExhausted { source, .. } => source.last_error(),
            other => other,
        }
    }
}
