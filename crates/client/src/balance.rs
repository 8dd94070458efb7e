use paygate_core::{Error, null_as_default};
use paygate_executor::{CancellationToken, Operation};
use serde::Deserialize;
use tracing::debug;

use crate::{GatewayClient, require_data};

/// Operator balances as reported by the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BalanceResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub balance: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub usdt_balance: f64,
}

/// Balance queries.
#[derive(Debug, Clone, Copy)]
pub struct Balance<'a> {
    client: &'a GatewayClient,
}

impl<'a> Balance<'a> {
    pub(crate) fn new(client: &'a GatewayClient) -> Self {
        Self { client }
    }

    /// The IDR balance formatted with two decimals, e.g. `"1500000.00"`.
    pub async fn get(&self, cancel: &CancellationToken) -> Result<String, Error> {
        let balances = self.details(cancel).await?;
        Ok(format!("{:.2}", balances.balance))
    }

    /// Both IDR and USDT balances.
    pub async fn details(&self, cancel: &CancellationToken) -> Result<BalanceResponse, Error> {
        let path = self.client.operator_path("get/balance");
        debug!(endpoint = %self.client.log_endpoint(&path), "querying balance");
        let op = Operation::get("balance", path);
        require_data(self.client.executor().execute(&op, cancel).await?)
    }
}
