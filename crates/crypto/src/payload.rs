use std::fmt;

use paygate_core::{Error, PaymentStatus, SignatureAmount};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// Ordered fields of a signature, terminated by the secret key.
///
/// Fields are concatenated without separators in insertion order, then the
/// secret is appended. Use the per-operation constructors to get the
/// gateway's exact ordering.
#[derive(Clone)]
pub struct SignaturePayload<'a> {
    fields: Vec<String>,
    secret: &'a SecretString,
}

impl<'a> SignaturePayload<'a> {
    pub fn new(secret: &'a SecretString) -> Self {
        Self {
            fields: Vec::new(),
            secret,
        }
    }

    /// Append a field verbatim.
    #[must_use]
    pub fn field(mut self, value: impl Into<String>) -> Self {
        self.fields.push(value.into());
        self
    }

    /// Append an amount normalized to two decimals.
    pub fn amount(self, amount: &(impl SignatureAmount + ?Sized)) -> Result<Self, Error> {
        Ok(self.field(amount.signature_amount()?))
    }

    /// Append a status as its integer code.
    #[must_use]
    pub fn status(self, status: PaymentStatus) -> Self {
        self.field(status.code().to_string())
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// `transaction_id ‖ player_username ‖ amount ‖ secret`, amount as an integer.
    pub fn idr_payment_create(
        transaction_id: &str,
        player_username: &str,
        amount: i64,
        secret: &'a SecretString,
    ) -> Self {
        Self::new(secret)
            .field(transaction_id)
            .field(player_username)
            .field(amount.to_string())
    }

    /// `idrpayment_id ‖ amount ‖ transaction_id ‖ status ‖ secret`.
    ///
    /// Also used to verify status query responses.
    pub fn idr_payment_callback(
        idrpayment_id: &str,
        amount: &(impl SignatureAmount + ?Sized),
        transaction_id: &str,
        status: PaymentStatus,
        secret: &'a SecretString,
    ) -> Result<Self, Error> {
        Ok(Self::new(secret)
            .field(idrpayment_id)
            .amount(amount)?
            .field(transaction_id)
            .status(status))
    }

    /// `transaction_id ‖ player_username ‖ amount ‖ account_number ‖ secret`,
    /// amount as an integer.
    pub fn idr_payout_create(
        transaction_id: &str,
        player_username: &str,
        amount: i64,
        account_number: &str,
        secret: &'a SecretString,
    ) -> Self {
        Self::new(secret)
            .field(transaction_id)
            .field(player_username)
            .field(amount.to_string())
            .field(account_number)
    }

    /// `idrpayout_id ‖ account_number ‖ amount ‖ transaction_id ‖ secret`.
    pub fn idr_payout_callback(
        idrpayout_id: &str,
        account_number: &str,
        amount: &(impl SignatureAmount + ?Sized),
        transaction_id: &str,
        secret: &'a SecretString,
    ) -> Result<Self, Error> {
        Ok(Self::new(secret)
            .field(idrpayout_id)
            .field(account_number)
            .amount(amount)?
            .field(transaction_id))
    }

    /// `transaction_id ‖ player_username ‖ amount ‖ secret`, amount to two decimals.
    pub fn usdt_payment_create(
        transaction_id: &str,
        player_username: &str,
        amount: &(impl SignatureAmount + ?Sized),
        secret: &'a SecretString,
    ) -> Result<Self, Error> {
        Ok(Self::new(secret)
            .field(transaction_id)
            .field(player_username)
            .amount(amount)?)
    }

    /// `cryptopayment_id ‖ amount ‖ transaction_id ‖ status ‖ secret`.
    pub fn usdt_payment_callback(
        cryptopayment_id: &str,
        amount: &(impl SignatureAmount + ?Sized),
        transaction_id: &str,
        status: PaymentStatus,
        secret: &'a SecretString,
    ) -> Result<Self, Error> {
        Ok(Self::new(secret)
            .field(cryptopayment_id)
            .amount(amount)?
            .field(transaction_id)
            .status(status))
    }

    /// The concatenated fields and secret in a buffer sized up front and
    /// wiped on drop.
    pub(crate) fn message(&self) -> Zeroizing<String> {
        let secret = self.secret.expose_secret();
        let len = self.fields.iter().map(String::len).sum::<usize>() + secret.len();
        let mut message = Zeroizing::new(String::with_capacity(len));
        for field in &self.fields {
            message.push_str(field);
        }
        message.push_str(secret);
        message
    }

    /// Run `f` over [`Self::message`], wiping it once `f` returns.
    pub(crate) fn with_message<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let message = self.message();
        f(message.as_bytes())
    }
}

impl fmt::Debug for SignaturePayload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignaturePayload")
            .field("fields", &self.fields)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
