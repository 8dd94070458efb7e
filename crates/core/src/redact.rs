//! Redaction of operator identifiers and account details for logs and errors.
//!
//! Gateway endpoints embed the operator's public identifier as the fifth
//! path segment:
//!
//! ```text
//! /v2/integrations/operators/{id}/idr/payment
//! /v2/integrations/operator/{id}/get/balance
//! ```
//!
//! [`redact_endpoint`] replaces that segment with [`REDACTED`]. Errors hold
//! endpoints as [`RedactedEndpoint`], which can only be built through the
//! redacting constructor.

use std::fmt;

/// Placeholder substituted for redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Replace the operator identifier segment of a gateway endpoint.
///
/// Paths that do not follow the `/v2/integrations/operator[s]/{id}` layout
/// are returned unchanged. A query string is preserved as-is.
///
/// ```
/// use paygate_core::redact_endpoint;
///
/// assert_eq!(
///     redact_endpoint("/v2/integrations/operators/key-1/idr/payment"),
///     "/v2/integrations/operators/[REDACTED]/idr/payment"
/// );
/// assert_eq!(redact_endpoint("/health"), "/health");
/// ```
pub fn redact_endpoint(endpoint: &str) -> String {
    let (path, query) = match endpoint.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (endpoint, None),
    };

    let mut parts: Vec<&str> = path.split('/').collect();
    let is_operator_path = parts.len() >= 5
        && parts[1] == "v2"
        && parts[2] == "integrations"
        && matches!(parts[3], "operator" | "operators")
        && !parts[4].is_empty();

    if !is_operator_path {
        return endpoint.to_owned();
    }

    parts[4] = REDACTED;
    let mut redacted = parts.join("/");
    if let Some(query) = query {
        redacted.push('?');
        redacted.push_str(query);
    }
    redacted
}

/// An endpoint path whose operator identifier has been redacted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RedactedEndpoint(String);

impl RedactedEndpoint {
    /// Redact `endpoint` and wrap the result.
    pub fn new(endpoint: &str) -> Self {
        Self(redact_endpoint(endpoint))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RedactedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mask all but the last four characters of an account number.
///
/// Numbers of four characters or fewer are masked entirely.
pub fn mask_account_number(account_number: &str) -> String {
    let chars: Vec<char> = account_number.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible = chars.len() - 4;
    let mut masked = "*".repeat(visible);
    masked.extend(&chars[visible..]);
    masked
}

/// Keep the first letter of each word of an account holder's name.
pub fn mask_account_name(account_name: &str) -> String {
    account_name
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => format!("{first}***"),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
