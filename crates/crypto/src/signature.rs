use std::fmt;

use md5::Md5;
use paygate_core::Error;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::payload::SignaturePayload;

/// Digest used to sign payloads.
///
/// The gateway mandates MD5; the others exist for deployments that
/// negotiate a stronger digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    fn digest_hex(self, message: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(message)),
            Self::Sha1 => hex::encode(Sha1::digest(message)),
            Self::Sha256 => hex::encode(Sha256::digest(message)),
            Self::Sha512 => hex::encode(Sha512::digest(message)),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes and verifies payload signatures.
///
/// # Examples
///
/// ```
/// use paygate_crypto::{SecretString, SignatureEngine, SignaturePayload};
///
/// let engine = SignatureEngine::default();
/// let secret = SecretString::new("secret-key".to_owned());
/// let payload = SignaturePayload::idr_payment_create("TXN123456", "player1", 10000, &secret);
///
/// let signature = engine.sign(&payload);
/// assert_eq!(signature.len(), 32);
/// assert!(engine.verify(&signature, &signature));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignatureEngine {
    algorithm: DigestAlgorithm,
}

impl SignatureEngine {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Lowercase hex digest of an already-concatenated message.
    pub fn sign_str(&self, message: &str) -> String {
        self.algorithm.digest_hex(message.as_bytes())
    }

    /// Lowercase hex digest of the payload's fields followed by its secret.
    pub fn sign(&self, payload: &SignaturePayload<'_>) -> String {
        payload.with_message(|message| self.algorithm.digest_hex(message))
    }

    /// Constant-time comparison of two signatures.
    ///
    /// Returns `true` only when both are byte-identical; case differences
    /// count as a mismatch.
    pub fn verify(&self, expected: &str, candidate: &str) -> bool {
        expected.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// Sign `payload` and compare against `candidate`.
    pub fn verify_payload(
        &self,
        payload: &SignaturePayload<'_>,
        candidate: &str,
    ) -> Result<(), Error> {
        let expected = self.sign(payload);
        if self.verify(&expected, candidate) {
            Ok(())
        } else {
            Err(Error::SignatureMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use paygate_core::ErrorKind;
    use secrecy::SecretString;

    use super::*;

    static SECRET: LazyLock<SecretString> =
        LazyLock::new(|| SecretString::new("secret-key".to_owned()));

    fn secret() -> &'static SecretString {
        &SECRET
    }

    #[test]
    fn known_digests() {
        assert_eq!(
            SignatureEngine::new(DigestAlgorithm::Md5).sign_str("abc"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            SignatureEngine::new(DigestAlgorithm::Sha1).sign_str("abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            SignatureEngine::new(DigestAlgorithm::Sha256).sign_str("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            SignatureEngine::new(DigestAlgorithm::Sha512).sign_str("abc"),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn digest_lengths_match_algorithm() {
        for algorithm in [
            DigestAlgorithm::Md5,
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha512,
        ] {
            let signature = SignatureEngine::new(algorithm).sign_str("payload");
            assert_eq!(signature.len(), algorithm.hex_len(), "{algorithm}");
            assert!(
                signature
                    .chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
            );
        }
    }

    #[test]
    fn sign_is_deterministic() {
        let engine = SignatureEngine::default();
        let payload = SignaturePayload::idr_payment_create("TXN123456", "player1", 10000, secret());
        assert_eq!(engine.sign(&payload), engine.sign(&payload));
        assert_eq!(engine.sign(&payload), "116a2eec34770df3837b15f35bf611c5");
    }

    #[test]
    fn verify_requires_exact_match() {
        let engine = SignatureEngine::default();
        let sig = "116a2eec34770df3837b15f35bf611c5";
        assert!(engine.verify(sig, sig));
        assert!(!engine.verify(sig, &sig.to_uppercase()));
        assert!(!engine.verify(sig, &sig[..31]));
        assert!(!engine.verify(sig, ""));
    }

    #[test]
    fn verify_payload_reports_mismatch() {
        let engine = SignatureEngine::default();
        let payload = SignaturePayload::idr_payment_create("TXN123456", "player1", 10000, secret());
        assert!(
            engine
                .verify_payload(&payload, "116a2eec34770df3837b15f35bf611c5")
                .is_ok()
        );
        let err = engine.verify_payload(&payload, "deadbeef").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    }

    #[test]
    fn algorithm_serde_names() {
        let algorithm: DigestAlgorithm = serde_json::from_str(r#""sha256""#).unwrap();
        assert_eq!(algorithm, DigestAlgorithm::Sha256);
        assert_eq!(DigestAlgorithm::default(), DigestAlgorithm::Md5);
    }
}
