//! Request signing for the paygate client.
//!
//! Every gateway request and callback carries a signature computed as
//! `hex(digest(field_1 ‖ field_2 ‖ … ‖ secret))`. The field order depends on
//! the operation; [`SignaturePayload`] has a constructor for each one, and
//! [`SignatureEngine`] digests and verifies them.
//!
//! The secret key is held as a [`SecretString`] and never appears in `Debug`
//! output.

mod payload;
mod signature;

pub use payload::SignaturePayload;
pub use signature::{DigestAlgorithm, SignatureEngine};

// Re-export for consumers so they don't need a direct `secrecy` dependency.
pub use secrecy::{ExposeSecret, SecretString};
