use paygate_core::{Error, PaymentStatus, SignatureAmount, WireString, null_as_default};
use paygate_crypto::SignaturePayload;
use paygate_executor::{CancellationToken, Operation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    GatewayClient, MIN_AMOUNT_IDR, MIN_AMOUNT_USDT, require_data, require_fields,
    validate_transaction_id,
};

/// IDR payment channels the gateway can preselect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdrChannel {
    Qris,
    Dana,
    Bni,
}

impl IdrChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Qris => "QRIS",
            Self::Dana => "DANA",
            Self::Bni => "BNI",
        }
    }

    /// Case-insensitive lookup; unknown channels yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "QRIS" => Some(Self::Qris),
            "DANA" => Some(Self::Dana),
            "BNI" => Some(Self::Bni),
            _ => None,
        }
    }
}

/// A new IDR payment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdrPaymentRequest {
    /// Merchant transaction id, 5 to 20 characters.
    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub player_username: String,
    /// Whole rupiah, at least 10 000.
    pub amount: i64,
    pub channel: Option<IdrChannel>,
}

impl IdrPaymentRequest {
    pub fn new(
        transaction_id: impl Into<String>,
        player_username: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            player_username: player_username.into(),
            amount,
            channel: None,
        }
    }

    #[must_use]
    pub fn channel(mut self, channel: IdrChannel) -> Self {
        self.channel = Some(channel);
        self
    }
}

#[derive(Serialize)]
struct IdrPaymentBody<'a> {
    transaction_id: &'a str,
    player_username: &'a str,
    amount: i64,
    signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<IdrChannel>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct IdrPaymentResponse {
    pub idrpayment_id: WireString,
    #[serde(deserialize_with = "null_as_default")]
    pub transaction_id: String,
    pub amount: WireString,
    #[serde(deserialize_with = "null_as_default")]
    pub expire_date: String,
    pub status: WireString,
    #[serde(deserialize_with = "null_as_default")]
    pub payment_url: String,
    pub qr: Option<String>,
}

/// Result of an IDR payment status query. Carries a signature that
/// [`IdrPayments::verify_status`] checks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdrPaymentStatus {
    #[serde(default)]
    pub idrpayment_id: WireString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub player_username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PaymentStatus,
    #[serde(default)]
    pub amount: WireString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remark: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub signature: String,
}

/// Body of an IDR payment callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdrCallback {
    #[serde(default)]
    pub idrpayment_id: WireString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction_id: String,
    #[serde(default)]
    pub amount: WireString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PaymentStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remark: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub signature: String,
}

/// IDR payment operations.
#[derive(Debug, Clone, Copy)]
pub struct IdrPayments<'a> {
    client: &'a GatewayClient,
}

impl<'a> IdrPayments<'a> {
    pub(crate) fn new(client: &'a GatewayClient) -> Self {
        Self { client }
    }

    /// Create a payment and return its payment URL.
    pub async fn create(
        &self,
        request: &IdrPaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<IdrPaymentResponse, Error> {
        validate_transaction_id(&request.transaction_id)?;
        if request.amount < MIN_AMOUNT_IDR {
            return Err(Error::validation(
                "amount",
                format!("minimum amount is {MIN_AMOUNT_IDR} IDR"),
            ));
        }

        let config = self.client.config();
        let signature = self.client.signer().sign(&SignaturePayload::idr_payment_create(
            &request.transaction_id,
            &request.player_username,
            request.amount,
            config.secret_key(),
        ));
        let body = IdrPaymentBody {
            transaction_id: &request.transaction_id,
            player_username: &request.player_username,
            amount: request.amount,
            signature,
            channel: request.channel,
        };

        let path = self.client.operators_path("idr/payment");
        info!(
            transaction_id = %request.transaction_id,
            amount = request.amount,
            channel = request.channel.map(IdrChannel::as_str),
            endpoint = %self.client.log_endpoint(&path),
            "creating IDR payment"
        );
        let op = Operation::post("idr_payment_create", path);
        let response: IdrPaymentResponse =
            require_data(self.client.executor().execute_with_body(&op, &body, cancel).await?)?;

        info!(
            transaction_id = %response.transaction_id,
            idrpayment_id = %response.idrpayment_id,
            "IDR payment created"
        );
        Ok(response)
    }

    /// Query a payment by merchant transaction id.
    pub async fn status(
        &self,
        transaction_id: &str,
        cancel: &CancellationToken,
    ) -> Result<IdrPaymentStatus, Error> {
        let path = self.client.operators_path("idr/getpayment");
        debug!(
            transaction_id,
            endpoint = %self.client.log_endpoint(&path),
            "querying IDR payment status"
        );
        let op = Operation::get("idr_payment_status", path).query("transaction_id", transaction_id);
        let status: IdrPaymentStatus =
            require_data(self.client.executor().execute(&op, cancel).await?)?;

        debug!(transaction_id, status = %status.status, "IDR payment status retrieved");
        Ok(status)
    }

    /// Verify an `idrpayment_id ‖ amount ‖ transaction_id ‖ status` signature.
    ///
    /// Empty fields are reported as [`Error::MissingField`] before any
    /// digest is computed. `amount` may be any decimal rendering; it is
    /// normalized to two decimals.
    pub fn verify_signature(
        &self,
        idrpayment_id: &str,
        amount: &str,
        transaction_id: &str,
        status: PaymentStatus,
        signature: &str,
    ) -> Result<(), Error> {
        require_fields(&[
            ("idrpayment_id", idrpayment_id),
            ("amount", amount),
            ("transaction_id", transaction_id),
            ("signature", signature),
        ])?;

        let payload = SignaturePayload::idr_payment_callback(
            idrpayment_id,
            amount,
            transaction_id,
            status,
            self.client.config().secret_key(),
        )?;
        let result = self.client.signer().verify_payload(&payload, signature);
        if result.is_err() {
            warn!(transaction_id, "IDR payment signature mismatch");
        }
        result
    }

    pub fn verify_callback(&self, callback: &IdrCallback) -> Result<(), Error> {
        debug!(transaction_id = %callback.transaction_id, "verifying IDR payment callback");
        self.verify_signature(
            callback.idrpayment_id.as_str(),
            callback.amount.as_str(),
            &callback.transaction_id,
            callback.status,
            &callback.signature,
        )
    }

    /// Check the sender against the IP allow-list, then the signature.
    pub fn verify_callback_from(&self, callback: &IdrCallback, source: &str) -> Result<(), Error> {
        self.client.verify_callback_ip(source)?;
        self.verify_callback(callback)
    }

    /// Verify the signature carried by a status query response.
    pub fn verify_status(&self, status: &IdrPaymentStatus) -> Result<(), Error> {
        self.verify_signature(
            status.idrpayment_id.as_str(),
            status.amount.as_str(),
            &status.transaction_id,
            status.status,
            &status.signature,
        )
    }
}

/// A new USDT (TRC-20) payment.
#[derive(Debug, Clone, PartialEq)]
pub struct UsdtPaymentRequest {
    pub transaction_id: String,
    pub player_username: String,
    /// USDT, at least 1.00. Sent with two decimals.
    pub amount: f64,
}

impl UsdtPaymentRequest {
    pub fn new(
        transaction_id: impl Into<String>,
        player_username: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            player_username: player_username.into(),
            amount,
        }
    }
}

#[derive(Serialize)]
struct UsdtPaymentBody<'a> {
    transaction_id: &'a str,
    player_username: &'a str,
    amount: String,
    signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UsdtPaymentResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub payment_url: String,
    pub cryptopayment_id: WireString,
    #[serde(deserialize_with = "null_as_default")]
    pub expire_date: String,
}

/// Body of a USDT payment callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsdtCallback {
    #[serde(default)]
    pub cryptopayment_id: WireString,
    #[serde(default)]
    pub amount: WireString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PaymentStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub signature: String,
}

/// USDT payment operations.
#[derive(Debug, Clone, Copy)]
pub struct UsdtPayments<'a> {
    client: &'a GatewayClient,
}

impl<'a> UsdtPayments<'a> {
    pub(crate) fn new(client: &'a GatewayClient) -> Self {
        Self { client }
    }

    pub async fn create(
        &self,
        request: &UsdtPaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<UsdtPaymentResponse, Error> {
        if request.amount.is_nan() || request.amount < MIN_AMOUNT_USDT {
            return Err(Error::validation(
                "amount",
                format!("minimum amount is {MIN_AMOUNT_USDT:.2} USDT"),
            ));
        }
        let amount = request.amount.signature_amount()?;

        let config = self.client.config();
        let signature = self.client.signer().sign(&SignaturePayload::usdt_payment_create(
            &request.transaction_id,
            &request.player_username,
            amount.as_str(),
            config.secret_key(),
        )?);
        let body = UsdtPaymentBody {
            transaction_id: &request.transaction_id,
            player_username: &request.player_username,
            amount,
            signature,
        };

        let path = self.client.operators_path("cryptocurrency/trc20/usdt");
        info!(
            transaction_id = %request.transaction_id,
            amount = %body.amount,
            endpoint = %self.client.log_endpoint(&path),
            "creating USDT payment"
        );
        let op = Operation::post("usdt_payment_create", path);
        let response: UsdtPaymentResponse =
            require_data(self.client.executor().execute_with_body(&op, &body, cancel).await?)?;

        info!(
            transaction_id = %request.transaction_id,
            cryptopayment_id = %response.cryptopayment_id,
            "USDT payment created"
        );
        Ok(response)
    }

    pub fn verify_callback(&self, callback: &UsdtCallback) -> Result<(), Error> {
        debug!(transaction_id = %callback.transaction_id, "verifying USDT payment callback");
        require_fields(&[
            ("cryptopayment_id", callback.cryptopayment_id.as_str()),
            ("amount", callback.amount.as_str()),
            ("transaction_id", callback.transaction_id.as_str()),
            ("signature", callback.signature.as_str()),
        ])?;

        let payload = SignaturePayload::usdt_payment_callback(
            callback.cryptopayment_id.as_str(),
            &callback.amount,
            &callback.transaction_id,
            callback.status,
            self.client.config().secret_key(),
        )?;
        let result = self
            .client
            .signer()
            .verify_payload(&payload, &callback.signature);
        if result.is_err() {
            warn!(transaction_id = %callback.transaction_id, "USDT callback signature mismatch");
        }
        result
    }

    /// Check the sender against the IP allow-list, then the signature.
    pub fn verify_callback_from(&self, callback: &UsdtCallback, source: &str) -> Result<(), Error> {
        self.client.verify_callback_ip(source)?;
        self.verify_callback(callback)
    }
}
