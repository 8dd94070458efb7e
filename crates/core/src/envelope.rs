//! The gateway's response envelope and the tolerant `data` decoder.
//!
//! Every gateway response body has the shape
//! `{ "code": <int>, "message": <string>, "data": ... }`, where `data` may be
//! absent, a JSON-encoded string, a single object, a one-element array of
//! objects, or a one-element array of JSON-encoded strings depending on the
//! endpoint. [`parse_data`] accepts all of these shapes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::error::Error;

/// Inner code that marks a successful envelope.
pub const SUCCESS_CODE: i64 = 200;

/// Wire-level response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    /// Raw `data` payload; `None` when omitted or `null`.
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

/// Deserialize `null` as `T::default()`.
///
/// Pair with `#[serde(default)]` so a missing key and an explicit `null`
/// decode the same way.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Envelope {
    /// Decode an envelope from a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(body)
            .map_err(|e| Error::malformed(format!("failed to decode response envelope: {e}")))
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Raw bytes of the `data` field, empty when absent.
    pub fn data_bytes(&self) -> &[u8] {
        match self.data.as_deref() {
            Some(raw) => raw.get().as_bytes(),
            None => &[],
        }
    }

    /// Decode the `data` field into `T`. See [`parse_data`].
    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<Option<T>, Error> {
        parse_data(self.data_bytes())
    }
}

/// Decode a raw `data` payload into `T`, trying each known shape in order.
///
/// 1. Empty input or `null` yields `Ok(None)`.
/// 2. A JSON string is unwrapped and its contents parsed instead.
/// 3. A non-empty array of `T` yields its first element.
/// 4. A non-empty array of strings yields its first string parsed as `T`.
/// 5. Otherwise the payload is decoded as a single `T`.
///
/// If every shape fails, the error from step 5 is returned as
/// [`Error::MalformedBody`].
pub fn parse_data<T: DeserializeOwned>(raw: &[u8]) -> Result<Option<T>, Error> {
    let raw = raw.trim_ascii();
    if raw.is_empty() || raw == b"null" {
        return Ok(None);
    }

    let unwrapped: String;
    let data = match serde_json::from_slice::<String>(raw) {
        Ok(inner) => {
            unwrapped = inner;
            unwrapped.as_bytes()
        }
        Err(_) => raw,
    };

    if let Ok(items) = serde_json::from_slice::<Vec<T>>(data)
        && let Some(first) = items.into_iter().next()
    {
        return Ok(Some(first));
    }

    if let Ok(strings) = serde_json::from_slice::<Vec<String>>(data)
        && let Some(first) = strings.first()
        && let Ok(value) = serde_json::from_str::<T>(first)
    {
        return Ok(Some(value));
    }

    serde_json::from_slice::<T>(data)
        .map(Some)
        .map_err(|e| Error::malformed(format!("failed to decode response data: {e}")))
}
