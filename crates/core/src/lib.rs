//! Shared types for the paygate client.
//!
//! Holds the classified [`Error`], the response [`Envelope`] and its tolerant
//! `data` decoder, amount normalization for signatures, endpoint redaction,
//! the callback source-IP allow-list, and [`PaymentStatus`].

pub mod allowlist;
pub mod amount;
pub mod envelope;
pub mod error;
pub mod redact;
pub mod status;

pub use allowlist::{IpAllowlist, IpNetwork};
pub use amount::{SignatureAmount, WireString, normalize_amount};
pub use envelope::{Envelope, SUCCESS_CODE, null_as_default, parse_data};
pub use error::{Error, ErrorKind};
pub use redact::{
    REDACTED, RedactedEndpoint, mask_account_name, mask_account_number, redact_endpoint,
};
pub use status::PaymentStatus;
