use std::fmt;

use paygate_core::{
    Error, PaymentStatus, WireString, mask_account_name, mask_account_number, null_as_default,
};
use paygate_crypto::SignaturePayload;
use paygate_executor::{CancellationToken, Operation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{GatewayClient, MIN_AMOUNT_IDR, require_data, require_fields};

/// A new IDR payout to a bank account or e-wallet.
#[derive(Clone, PartialEq, Eq)]
pub struct IdrPayoutRequest {
    pub transaction_id: String,
    pub player_username: String,
    pub account_name: String,
    pub account_number: String,
    /// Whole rupiah, at least 10 000.
    pub amount: i64,
    /// Bank code such as `BCA`; normalized to upper case.
    pub bank_code: String,
    pub description: Option<String>,
}

impl fmt::Debug for IdrPayoutRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdrPayoutRequest")
            .field("transaction_id", &self.transaction_id)
            .field("player_username", &self.player_username)
            .field("account_name", &mask_account_name(&self.account_name))
            .field("account_number", &mask_account_number(&self.account_number))
            .field("amount", &self.amount)
            .field("bank_code", &self.bank_code)
            .field("description", &self.description)
            .finish()
    }
}

#[derive(Serialize)]
struct IdrPayoutBody<'a> {
    transaction_id: &'a str,
    player_username: &'a str,
    account_name: &'a str,
    account_number: &'a str,
    amount: i64,
    bank_target: &'a str,
    signature: String,
    #[serde(rename = "trx_description", skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdrPayoutResponse {
    #[serde(default)]
    pub idrpayout_id: WireString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdrPayoutStatus {
    #[serde(default)]
    pub idrpayout_id: WireString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub account_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub account_number: String,
    #[serde(default)]
    pub amount: WireString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PaymentStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payout_success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remark: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub signature: String,
}

/// Body of an IDR payout callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdrPayoutCallback {
    pub idrpayout_id: WireString,
    #[serde(deserialize_with = "null_as_default")]
    pub transaction_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub account_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub account_number: String,
    pub amount: WireString,
    #[serde(deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub payout_success: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub remark: String,
    #[serde(deserialize_with = "null_as_default")]
    pub signature: String,
}

/// Upper-case `code` and check it looks like a bank code: 2 to 10 ASCII
/// letters or digits.
fn normalize_bank_code(code: &str) -> Result<String, Error> {
    let code = code.trim().to_ascii_uppercase();
    let valid = (2..=10).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_alphanumeric());
    if valid {
        Ok(code)
    } else {
        Err(Error::validation(
            "bank_code",
            format!("invalid bank code: {code}"),
        ))
    }
}

/// IDR payout operations.
#[derive(Debug, Clone, Copy)]
pub struct IdrPayouts<'a> {
    client: &'a GatewayClient,
}

impl<'a> IdrPayouts<'a> {
    pub(crate) fn new(client: &'a GatewayClient) -> Self {
        Self { client }
    }

    pub async fn create(
        &self,
        request: &IdrPayoutRequest,
        cancel: &CancellationToken,
    ) -> Result<IdrPayoutResponse, Error> {
        let bank_code = normalize_bank_code(&request.bank_code)?;
        if request.amount < MIN_AMOUNT_IDR {
            return Err(Error::validation(
                "amount",
                format!("minimum payout amount is {MIN_AMOUNT_IDR} IDR"),
            ));
        }

        let signature = self.client.signer().sign(&SignaturePayload::idr_payout_create(
            &request.transaction_id,
            &request.player_username,
            request.amount,
            &request.account_number,
            self.client.config().secret_key(),
        ));
        let body = IdrPayoutBody {
            transaction_id: &request.transaction_id,
            player_username: &request.player_username,
            account_name: &request.account_name,
            account_number: &request.account_number,
            amount: request.amount,
            bank_target: &bank_code,
            signature,
            description: request
                .description
                .as_deref()
                .filter(|description| !description.is_empty()),
        };

        let path = self.client.operators_path("idr/payout");
        info!(
            transaction_id = %request.transaction_id,
            account_name = %self.client.log_account_name(&request.account_name),
            account_number = %self.client.log_account_number(&request.account_number),
            bank = %bank_code,
            amount = request.amount,
            endpoint = %self.client.log_endpoint(&path),
            "creating IDR payout"
        );
        let op = Operation::post("idr_payout_create", path);
        let response: IdrPayoutResponse =
            require_data(self.client.executor().execute_with_body(&op, &body, cancel).await?)?;

        info!(
            transaction_id = %request.transaction_id,
            idrpayout_id = %response.idrpayout_id,
            status = %response.status,
            "IDR payout created"
        );
        Ok(response)
    }

    pub async fn status(
        &self,
        transaction_id: &str,
        cancel: &CancellationToken,
    ) -> Result<IdrPayoutStatus, Error> {
        let path = self.client.operators_path("idr/getpayout");
        debug!(
            transaction_id,
            endpoint = %self.client.log_endpoint(&path),
            "querying IDR payout status"
        );
        let op = Operation::get("idr_payout_status", path).query("transaction_id", transaction_id);
        let status: IdrPayoutStatus =
            require_data(self.client.executor().execute(&op, cancel).await?)?;

        debug!(transaction_id, status = %status.status, "IDR payout status retrieved");
        Ok(status)
    }

    /// Verify an `idrpayout_id ‖ account_number ‖ amount ‖ transaction_id`
    /// signature.
    pub fn verify_signature(
        &self,
        idrpayout_id: &str,
        account_number: &str,
        amount: &str,
        transaction_id: &str,
        signature: &str,
    ) -> Result<(), Error> {
        require_fields(&[
            ("idrpayout_id", idrpayout_id),
            ("account_number", account_number),
            ("amount", amount),
            ("transaction_id", transaction_id),
            ("signature", signature),
        ])?;

        let payload = SignaturePayload::idr_payout_callback(
            idrpayout_id,
            account_number,
            amount,
            transaction_id,
            self.client.config().secret_key(),
        )?;
        let result = self.client.signer().verify_payload(&payload, signature);
        if result.is_err() {
            warn!(
                transaction_id,
                account_number = %self.client.log_account_number(account_number),
                "IDR payout signature mismatch"
            );
        }
        result
    }

    pub fn verify_callback(&self, callback: &IdrPayoutCallback) -> Result<(), Error> {
        debug!(transaction_id = %callback.transaction_id, "verifying IDR payout callback");
        self.verify_signature(
            callback.idrpayout_id.as_str(),
            &callback.account_number,
            callback.amount.as_str(),
            &callback.transaction_id,
            &callback.signature,
        )
    }

    /// Check the sender against the IP allow-list, then the signature.
    pub fn verify_callback_from(
        &self,
        callback: &IdrPayoutCallback,
        source: &str,
    ) -> Result<(), Error> {
        self.client.verify_callback_ip(source)?;
        self.verify_callback(callback)
    }

    pub fn verify_status(&self, status: &IdrPayoutStatus) -> Result<(), Error> {
        self.verify_signature(
            status.idrpayout_id.as_str(),
            &status.account_number,
            status.amount.as_str(),
            &status.transaction_id,
            &status.signature,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GatewayClient {
        let config = GatewayClient::builder("operator-key", "secret-key")
            .build()
            .unwrap();
        GatewayClient::new(config).unwrap()
    }

    fn callback() -> IdrPayoutCallback {
        IdrPayoutCallback {
            idrpayout_id: "55501".into(),
            transaction_id: "PO12345".into(),
            account_name: "John Doe".into(),
            account_number: "1234567890".into(),
            amount: "50000".into(),
            completed: true,
            payout_success: true,
            remark: String::new(),
            signature: "0a53f26b772a754059b4b422b94bf135".into(),
        }
    }

    #[test]
    fn bank_codes_are_normalized() {
        assert_eq!(normalize_bank_code(" bca ").unwrap(), "BCA");
        assert_eq!(normalize_bank_code("Mandiri").unwrap(), "MANDIRI");
        for bad in ["", "B", "BANK-BCA", "VERYLONGBANKCODE"] {
            let err = normalize_bank_code(bad).unwrap_err();
            assert!(
                matches!(err, Error::Validation { ref field, .. } if field == "bank_code"),
                "{bad}"
            );
        }
    }

    #[test]
    fn verifies_payout_callback() {
        let client = client();
        assert!(client.idr_payouts().verify_callback(&callback()).is_ok());

        let mut tampered = callback();
        tampered.account_number = "1234567891".into();
        assert!(matches!(
            client.idr_payouts().verify_callback(&tampered),
            Err(Error::SignatureMismatch)
        ));
    }

    #[test]
    fn payout_callback_requires_account_number() {
        let client = client();
        let mut incomplete = callback();
        incomplete.account_number.clear();
        let err = client.idr_payouts().verify_callback(&incomplete).unwrap_err();
        assert!(matches!(err, Error::MissingField { ref field } if field == "account_number"));
    }

    #[test]
    fn callback_decodes_numeric_ids() {
        let callback: IdrPayoutCallback = serde_json::from_value(serde_json::json!({
            "idrpayout_id": 55501,
            "transaction_id": "PO12345",
            "account_number": "1234567890",
            "amount": 50000.0,
            "signature": "0a53f26b772a754059b4b422b94bf135",
        }))
        .unwrap();
        assert_eq!(callback.idrpayout_id.as_str(), "55501");
        assert!(client().idr_payouts().verify_callback(&callback).is_ok());
    }

    #[test]
    fn debug_masks_account_details() {
        let request = IdrPayoutRequest {
            transaction_id: "PO12345".into(),
            player_username: "player1".into(),
            account_name: "John Doe".into(),
            account_number: "1234567890".into(),
            amount: 50_000,
            bank_code: "bca".into(),
            description: None,
        };
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("1234567890"));
        assert!(rendered.contains("******7890"));
        assert!(!rendered.contains("John Doe"));
    }
}
