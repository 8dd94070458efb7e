//! Amount normalization for signature payloads.
//!
//! The gateway sends amounts as integers, decimal strings or floats depending
//! on the endpoint, but signs them as decimals with exactly two fractional
//! digits. Anything that enters a signature goes through
//! [`SignatureAmount::signature_amount`].

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;

/// Format a decimal amount string to two fractional digits.
///
/// ```
/// use paygate_core::normalize_amount;
///
/// assert_eq!(normalize_amount("10000").unwrap(), "10000.00");
/// assert_eq!(normalize_amount("10000.0").unwrap(), "10000.00");
/// assert_eq!(normalize_amount(" 10.5 ").unwrap(), "10.50");
/// assert!(normalize_amount("ten").is_err());
/// ```
pub fn normalize_amount(raw: &str) -> Result<String, Error> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::validation("amount", "invalid amount format"))?;
    format_two_decimals(value)
}

fn format_two_decimals(value: f64) -> Result<String, Error> {
    if !value.is_finite() {
        return Err(Error::validation("amount", "invalid amount format"));
    }
    Ok(format!("{value:.2}"))
}

/// A value that can be rendered as a two-decimal signature amount.
pub trait SignatureAmount {
    fn signature_amount(&self) -> Result<String, Error>;
}

impl SignatureAmount for str {
    fn signature_amount(&self) -> Result<String, Error> {
        normalize_amount(self)
    }
}

impl SignatureAmount for String {
    fn signature_amount(&self) -> Result<String, Error> {
        normalize_amount(self)
    }
}

impl SignatureAmount for f64 {
    fn signature_amount(&self) -> Result<String, Error> {
        format_two_decimals(*self)
    }
}

macro_rules! integer_amount {
    ($($ty:ty),*) => {
        $(
            impl SignatureAmount for $ty {
                fn signature_amount(&self) -> Result<String, Error> {
                    Ok(format!("{self}.00"))
                }
            }
        )*
    };
}

integer_amount!(i32, i64, u32, u64);

impl SignatureAmount for serde_json::Number {
    fn signature_amount(&self) -> Result<String, Error> {
        if let Some(v) = self.as_i64() {
            v.signature_amount()
        } else if let Some(v) = self.as_u64() {
            v.signature_amount()
        } else {
            normalize_amount(&self.to_string())
        }
    }
}

impl SignatureAmount for WireString {
    fn signature_amount(&self) -> Result<String, Error> {
        normalize_amount(&self.0)
    }
}

impl<T: SignatureAmount + ?Sized> SignatureAmount for &T {
    fn signature_amount(&self) -> Result<String, Error> {
        (**self).signature_amount()
    }
}

/// A scalar the gateway may send either as a JSON string or a JSON number.
///
/// Identifiers and amounts arrive in both forms depending on the endpoint.
/// The textual form is kept as received; `null` becomes an empty string.
/// Serializes back as a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WireString(String);

impl WireString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for WireString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WireString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for WireString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for WireString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WireString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WireStringVisitor;

        impl Visitor<'_> for WireStringVisitor {
            type Value = WireString;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or a number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(WireString(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(WireString(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(WireString(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(WireString(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(WireString(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(WireString::default())
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(WireString::default())
            }
        }

        deserializer.deserialize_any(WireStringVisitor)
    }
}
