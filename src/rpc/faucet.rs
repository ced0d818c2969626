//! Test-network faucet

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::json_rpc::{decode, http_error, JsonRpcClient};
use crate::types::*;

#[derive(Debug, Deserialize)]
struct FaucetResponse {
    account: FaucetAccount,
    /// Newer faucets report the seed at the top level
    seed: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaucetAccount {
    classic_address: Option<String>,
    address: Option<String>,
    secret: Option<String>,
    public_key: Option<String>,
}

impl FaucetResponse {
    fn into_wallet(self) -> LedgerResult<Wallet> {
        let address = self
            .account
            .classic_address
            .or(self.account.address)
            .ok_or_else(|| LedgerError::Network("faucet returned no address".to_string()))?;
        let seed = self
            .seed
            .or(self.account.secret)
            .ok_or_else(|| LedgerError::Network("faucet returned no seed".to_string()))?;

        Ok(Wallet::new(
            Address::parse(&address)?,
            seed,
            self.account.public_key,
        ))
    }
}

impl FaucetResponse {
    fn funded_address(&self) -> Option<&str> {
        self.account
            .classic_address
            .as_deref()
            .or(self.account.address.as_deref())
    }
}

async fn call_faucet(client: &JsonRpcClient, body: Value) -> LedgerResult<FaucetResponse> {
    let url = &client.config().faucet_url;
    debug!("Requesting funds from {}", url);

    let response = client
        .http()
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(http_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(LedgerError::Network(format!("faucet returned HTTP {}", status)));
    }

    let body: Value = response.json().await.map_err(http_error)?;
    decode(body)
}

/// Ask the faucet for a new funded account and its seed; funding lands a
/// ledger or two later
pub(crate) async fn request_wallet(client: &JsonRpcClient) -> LedgerResult<Wallet> {
    call_faucet(client, json!({})).await?.into_wallet()
}

/// Ask the faucet to fund an address whose seed never leaves this process
pub(crate) async fn fund_address(client: &JsonRpcClient, address: &Address) -> LedgerResult<()> {
    let response = call_faucet(client, json!({ "destination": address.as_str() })).await?;
    match response.funded_address() {
        Some(funded) if funded == address.as_str() => Ok(()),
        other => Err(LedgerError::Network(format!(
            "faucet funded {} instead of {}",
            other.unwrap_or("nothing"),
            address
        ))),
    }
}
