//! Paygate HTTP Client
//!
//! A Rust client for the GSPay payment gateway. Every call goes through the
//! retrying [`RequestExecutor`], is signed with the configured
//! [`SignatureEngine`] and returns a classified [`Error`] on failure.
//!
//! # Quick Start
//!
//! ```no_run
//! use paygate_client::{CancellationToken, GatewayClient, IdrPaymentRequest};
//!
//! # async fn example() -> Result<(), paygate_client::Error> {
//! let config = GatewayClient::builder("auth-key", "secret-key").build()?;
//! let client = GatewayClient::new(config)?;
//!
//! let request = IdrPaymentRequest::new("TXN123456789", "player1", 50_000);
//! let payment = client
//!     .idr_payments()
//!     .create(&request, &CancellationToken::new())
//!     .await?;
//! println!("pay at {}", payment.payment_url);
//! # Ok(())
//! # }
//! ```
//!
//! # Callbacks
//!
//! Gateway callbacks are verified by recomputing their signature. Use the
//! `verify_callback_from` variants to also check the sender against the
//! configured IP allow-list:
//!
//! ```no_run
//! # fn example(client: &paygate_client::GatewayClient, body: &str) -> Result<(), paygate_client::Error> {
//! use paygate_client::IdrCallback;
//!
//! let callback: IdrCallback = serde_json::from_str(body).expect("callback json");
//! client.idr_payments().verify_callback_from(&callback, "203.0.113.7:443")?;
//! # Ok(())
//! # }
//! ```

mod balance;
mod helpers;
mod payment;
mod payout;

pub use balance::{Balance, BalanceResponse};
pub use helpers::{build_return_url, format_amount_idr, format_amount_usdt, generate_transaction_id};
pub use payment::{
    IdrCallback, IdrChannel, IdrPaymentRequest, IdrPaymentResponse, IdrPaymentStatus, IdrPayments,
    UsdtCallback, UsdtPaymentRequest, UsdtPaymentResponse, UsdtPayments,
};
pub use payout::{
    IdrPayoutCallback, IdrPayoutRequest, IdrPayoutResponse, IdrPayoutStatus, IdrPayouts,
};

pub use paygate_core::{Error, ErrorKind, PaymentStatus, WireString};
pub use paygate_crypto::{DigestAlgorithm, SignatureEngine};
pub use paygate_executor::{
    CancellationToken, ClientConfig, ClientConfigBuilder, ClientSettings, RequestExecutor,
};

use std::sync::Arc;

use paygate_core::{mask_account_name, mask_account_number, redact_endpoint};
use tracing::{debug, warn};

/// Shortest accepted merchant transaction id.
pub const MIN_TRANSACTION_ID_LEN: usize = 5;
/// Longest accepted merchant transaction id.
pub const MAX_TRANSACTION_ID_LEN: usize = 20;
/// Minimum IDR amount for payments and payouts.
pub const MIN_AMOUNT_IDR: i64 = 10_000;
/// Minimum USDT payment amount.
pub const MIN_AMOUNT_USDT: f64 = 1.0;

/// Entry point to the gateway.
///
/// Owns the request executor and the signature engine; the per-product
/// services it hands out borrow both.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    executor: Arc<RequestExecutor>,
    signer: SignatureEngine,
}

impl GatewayClient {
    /// Create a client from a validated configuration.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let executor = RequestExecutor::new(Arc::new(config))?;
        Ok(Self::with_executor(executor))
    }

    /// Start building a configuration.
    pub fn builder(
        auth_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> ClientConfigBuilder {
        ClientConfig::builder(auth_key, secret_key)
    }

    /// Create a client from deserialized settings.
    pub fn from_settings(settings: ClientSettings) -> Result<Self, Error> {
        Self::new(settings.into_builder().build()?)
    }

    /// Wrap an existing executor, e.g. one sharing a buffer pool.
    pub fn with_executor(executor: RequestExecutor) -> Self {
        let signer = SignatureEngine::new(executor.config().digest());
        Self {
            executor: Arc::new(executor),
            signer,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.executor.config()
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn signer(&self) -> &SignatureEngine {
        &self.signer
    }

    pub fn idr_payments(&self) -> IdrPayments<'_> {
        IdrPayments::new(self)
    }

    pub fn usdt_payments(&self) -> UsdtPayments<'_> {
        UsdtPayments::new(self)
    }

    pub fn idr_payouts(&self) -> IdrPayouts<'_> {
        IdrPayouts::new(self)
    }

    pub fn balance(&self) -> Balance<'_> {
        Balance::new(self)
    }

    /// Check a callback's source address against the configured allow-list.
    ///
    /// Accepts a bare IP or `ip:port`. With no allow-list configured every
    /// source is accepted.
    pub fn verify_callback_ip(&self, source: &str) -> Result<(), Error> {
        let result = self.config().ip_allowlist().check(source);
        match &result {
            Ok(()) => debug!(source, "callback source accepted"),
            Err(err) => warn!(source, error = %err, "callback source rejected"),
        }
        result
    }

    /// `/v2/integrations/operators/{auth_key}/{suffix}`
    pub(crate) fn operators_path(&self, suffix: &str) -> String {
        format!(
            "/v2/integrations/operators/{}/{suffix}",
            self.config().auth_key()
        )
    }

    /// `/v2/integrations/operator/{auth_key}/{suffix}`
    pub(crate) fn operator_path(&self, suffix: &str) -> String {
        format!(
            "/v2/integrations/operator/{}/{suffix}",
            self.config().auth_key()
        )
    }

    pub(crate) fn log_endpoint(&self, path: &str) -> String {
        if self.config().debug() {
            path.to_owned()
        } else {
            redact_endpoint(path)
        }
    }

    pub(crate) fn log_account_number(&self, account_number: &str) -> String {
        if self.config().debug() {
            account_number.to_owned()
        } else {
            mask_account_number(account_number)
        }
    }

    pub(crate) fn log_account_name(&self, account_name: &str) -> String {
        if self.config().debug() {
            account_name.to_owned()
        } else {
            mask_account_name(account_name)
        }
    }
}

/// Reject a successful response that carried no `data`.
pub(crate) fn require_data<T>(data: Option<T>) -> Result<T, Error> {
    data.ok_or_else(|| Error::malformed("response data is empty"))
}

pub(crate) fn validate_transaction_id(transaction_id: &str) -> Result<(), Error> {
    let len = transaction_id.len();
    if (MIN_TRANSACTION_ID_LEN..=MAX_TRANSACTION_ID_LEN).contains(&len) {
        Ok(())
    } else {
        Err(Error::validation(
            "transaction_id",
            format!(
                "transaction id must be {MIN_TRANSACTION_ID_LEN}-{MAX_TRANSACTION_ID_LEN} characters"
            ),
        ))
    }
}

/// Reject empty callback fields before any signature work.
pub(crate) fn require_fields(fields: &[(&str, &str)]) -> Result<(), Error> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(Error::missing_field(*name)),
        None => Ok(()),
    }
}
