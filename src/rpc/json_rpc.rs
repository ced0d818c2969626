//! JSON-RPC client for a public ledger node

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::amount::{parse_value, CurrencyCode, Drops};
use crate::config::{ClientConfig, SigningMode};
use crate::ledger::transaction::Transaction;
use crate::signing::{self, Keypair};
use crate::traits::*;
use crate::types::*;

/// Result codes that mean the transaction was not applied and never will be
const FINAL_REJECTION_PREFIXES: [&str; 3] = ["tem", "tef", "tel"];

/// RPC errors a public node returns for sign-and-submit requests
const SIGNING_REFUSED: [&str; 2] = ["noPermission", "forbidden"];

/// Talks to a node over HTTP. Transactions are signed in process unless the
/// config asks the node to sign.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl JsonRpcClient {
    pub fn new(config: ClientConfig) -> LedgerResult<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(http_error)?;
        Ok(Self { http, config })
    }

    /// Client for the public test network
    pub fn testnet() -> LedgerResult<Self> {
        Self::new(ClientConfig::testnet())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Call one method and return its `result` object
    pub async fn request(&self, method: &str, params: Value) -> LedgerResult<Value> {
        debug!("RPC {} {}", method, params);
        let body = json!({ "method": method, "params": [params] });

        let response = self
            .http
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Network(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let payload: Value = response.json().await.map_err(http_error)?;
        check_result(payload)
    }

    /// Index of the open ledger
    pub async fn current_ledger_index(&self) -> LedgerResult<u32> {
        let result = self.request("ledger_current", json!({})).await?;
        ledger_index_field(&result, "ledger_current_index")
    }

    /// Index of the latest validated ledger
    pub async fn validated_ledger_index(&self) -> LedgerResult<u32> {
        let result = self
            .request("ledger", json!({ "ledger_index": "validated" }))
            .await?;
        ledger_index_field(&result, "ledger_index")
    }

    /// Open-ledger transaction cost
    pub async fn open_ledger_fee(&self) -> LedgerResult<Drops> {
        let result = self.request("fee", json!({})).await?;
        let drops = &result["drops"];
        drops["open_ledger_fee"]
            .as_str()
            .or_else(|| drops["base_fee"].as_str())
            .ok_or_else(|| LedgerError::Network("fee response has no drops".to_string()))?
            .parse::<Drops>()
            .map_err(LedgerError::from)
    }

    /// Submit without waiting
    pub async fn submit(
        &self,
        transaction: &Transaction,
        wallet: &Wallet,
    ) -> LedgerResult<SubmitResult> {
        match self.config.signing {
            SigningMode::Local => self.submit_signed(transaction, wallet).await,
            SigningMode::Server => self.submit_with_secret(transaction, wallet).await,
        }
    }

    /// Fill in Sequence and Fee, then submit the blob signed in process
    async fn submit_signed(
        &self,
        transaction: &Transaction,
        wallet: &Wallet,
    ) -> LedgerResult<SubmitResult> {
        let keypair = Keypair::from_seed(wallet.seed())?;
        let info = self.account_info(&wallet.address).await?;
        let fee = self.open_ledger_fee().await?;

        let mut tx_json = transaction.to_json();
        tx_json["Sequence"] = json!(info.sequence);
        tx_json["Fee"] = json!(fee.to_string());
        let signed = signing::sign(&mut tx_json, &keypair)?;
        debug!("Signed {} as {}", transaction.transaction_type(), signed.hash);

        let result = self
            .request("submit", json!({ "tx_blob": signed.tx_blob }))
            .await?;
        decode(result)
    }

    async fn submit_with_secret(
        &self,
        transaction: &Transaction,
        wallet: &Wallet,
    ) -> LedgerResult<SubmitResult> {
        let result = self
            .request(
                "submit",
                json!({
                    "tx_json": transaction.to_json(),
                    "secret": wallet.seed(),
                }),
            )
            .await
            .map_err(|e| match e {
                LedgerError::Rpc { code, message } if SIGNING_REFUSED.contains(&code.as_str()) => {
                    LedgerError::Rpc {
                        message: format!(
                            "{} refuses sign-and-submit ({}); use local signing or a node with signing enabled",
                            self.config.rpc_url, message
                        ),
                        code,
                    }
                }
                other => other,
            })?;
        decode(result)
    }

    /// Look a transaction up; `None` while the node has not seen it
    async fn lookup(&self, hash: &str) -> LedgerResult<Option<TxResult>> {
        match self.request("tx", json!({ "transaction": hash })).await {
            Ok(result) => decode(result).map(Some),
            Err(LedgerError::Rpc { code, .. }) if code == "txnNotFound" => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub(crate) async fn wait_for_account(&self, address: &Address) -> LedgerResult<AccountInfo> {
        let started = Instant::now();
        loop {
            match self.account_info(address).await {
                Ok(info) => return Ok(info),
                Err(LedgerError::AccountNotFound(_)) => {
                    if started.elapsed() > self.config.submit_timeout() {
                        return Err(LedgerError::Timeout(format!(
                            "account {} was not funded in time",
                            address
                        )));
                    }
                    tokio::time::sleep(self.config.poll_interval()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

#[async_trait]
impl LedgerClient for JsonRpcClient {
    async fn generate_funded_wallet(&self) -> LedgerResult<Wallet> {
        let wallet = match self.config.signing {
            SigningMode::Local => {
                let wallet = signing::generate_wallet()?;
                super::faucet::fund_address(self, &wallet.address).await?;
                wallet
            }
            SigningMode::Server => super::faucet::request_wallet(self).await?,
        };
        let info = self.wait_for_account(&wallet.address).await?;
        info!(
            "Funded {} with {} XRP",
            wallet.address,
            info.xrp_balance()
        );
        Ok(wallet)
    }

    async fn account_info(&self, address: &Address) -> LedgerResult<AccountInfo> {
        let result = self
            .request(
                "account_info",
                json!({ "account": address.as_str(), "ledger_index": "validated" }),
            )
            .await
            .map_err(|e| match e {
                LedgerError::Rpc { code, .. } if code == "actNotFound" => {
                    LedgerError::AccountNotFound(address.to_string())
                }
                other => other,
            })?;
        parse_account_info(address, &result)
    }

    async fn account_lines(&self, address: &Address) -> LedgerResult<Vec<TrustLine>> {
        let mut lines = Vec::new();
        let mut marker: Option<Value> = None;

        loop {
            let mut params = json!({ "account": address.as_str(), "ledger_index": "validated" });
            if let Some(marker) = marker.take() {
                params["marker"] = marker;
            }

            let result = self.request("account_lines", params).await?;
            let page: LinesPage = decode(result)?;
            for line in page.lines {
                lines.push(line.into_trust_line()?);
            }

            match page.marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(lines)
    }

    async fn submit_and_wait(
        &self,
        transaction: &Transaction,
        wallet: &Wallet,
    ) -> LedgerResult<SubmitResponse> {
        let started = Instant::now();
        let last_ledger = self.current_ledger_index().await? + self.config.ledger_offset;
        let transaction = transaction.clone().with_last_ledger_sequence(last_ledger);

        let submitted = self.submit(&transaction, wallet).await?;
        let hash = submitted.tx_json.hash.clone();
        debug!(
            "Submitted {} {}: {}",
            transaction.transaction_type(),
            hash,
            submitted.engine_result
        );

        if submitted.is_final_rejection() {
            warn!(
                "{} rejected: {}",
                hash,
                submitted.engine_result_message.as_deref().unwrap_or("")
            );
            return Ok(SubmitResponse {
                hash,
                result_code: submitted.engine_result,
                validated: false,
                ledger_index: None,
                nftoken_id: None,
                offer_id: None,
            });
        }

        loop {
            tokio::time::sleep(self.config.poll_interval()).await;

            if let Some(tx) = self.lookup(&hash).await? {
                if tx.validated {
                    return Ok(tx.into_response(hash));
                }
            }

            let validated = self.validated_ledger_index().await?;
            if validated > last_ledger {
                return Err(LedgerError::Timeout(format!(
                    "{} not validated by ledger {}",
                    hash, last_ledger
                )));
            }
            if started.elapsed() > self.config.submit_timeout() {
                return Err(LedgerError::Timeout(format!(
                    "{} not validated within {:?}",
                    hash,
                    self.config.submit_timeout()
                )));
            }
        }
    }

    async fn transaction_status(&self, hash: &str) -> LedgerResult<TransactionStatus> {
        let tx = self
            .lookup(hash)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {}", hash)))?;
        Ok(TransactionStatus {
            hash: hash.to_string(),
            validated: tx.validated,
            result_code: tx.meta.as_ref().map(|m| m.transaction_result.clone()),
            ledger_index: tx.ledger_index,
        })
    }
}

/// Answer to a `submit` call
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResult {
    pub engine_result: String,
    pub engine_result_message: Option<String>,
    pub tx_json: SubmittedTx,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedTx {
    pub hash: String,
}

impl SubmitResult {
    /// The transaction was not applied and will not be
    pub fn is_final_rejection(&self) -> bool {
        FINAL_REJECTION_PREFIXES
            .iter()
            .any(|prefix| self.engine_result.starts_with(prefix))
    }
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    validated: bool,
    ledger_index: Option<u32>,
    meta: Option<TxMeta>,
}

#[derive(Debug, Deserialize)]
struct TxMeta {
    #[serde(rename = "TransactionResult")]
    transaction_result: String,
    nftoken_id: Option<String>,
    offer_id: Option<String>,
}

impl TxResult {
    fn into_response(self, hash: String) -> SubmitResponse {
        let (result_code, nftoken_id, offer_id) = match self.meta {
            Some(meta) => (meta.transaction_result, meta.nftoken_id, meta.offer_id),
            None => (String::new(), None, None),
        };
        SubmitResponse {
            hash,
            result_code,
            validated: self.validated,
            ledger_index: self.ledger_index,
            nftoken_id,
            offer_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LinesPage {
    #[serde(default)]
    lines: Vec<RawLine>,
    marker: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    account: String,
    balance: String,
    currency: String,
    limit: String,
    limit_peer: String,
    #[serde(default)]
    authorized: bool,
    #[serde(default)]
    peer_authorized: bool,
}

impl RawLine {
    fn into_trust_line(self) -> LedgerResult<TrustLine> {
        Ok(TrustLine {
            peer: Address::parse(&self.account)?,
            currency: CurrencyCode::new(&self.currency)?,
            balance: parse_value(&self.balance)?,
            limit: parse_value(&self.limit)?,
            limit_peer: parse_value(&self.limit_peer)?,
            authorized: self.authorized,
            peer_authorized: self.peer_authorized,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AccountData {
    #[serde(rename = "Balance")]
    balance: String,
    #[serde(rename = "Sequence")]
    sequence: u32,
    #[serde(rename = "Flags", default)]
    flags: u32,
}

/// Unwrap `result`, turning an error status into [`LedgerError::Rpc`]
fn check_result(payload: Value) -> LedgerResult<Value> {
    let result = match payload {
        Value::Object(mut map) => map.remove("result").unwrap_or(Value::Null),
        _ => Value::Null,
    };

    if !result.is_object() {
        return Err(LedgerError::Network("response has no result".to_string()));
    }

    if result["status"] == "error" || result.get("error").is_some() {
        let code = result["error"].as_str().unwrap_or("unknown").to_string();
        let message = result["error_message"]
            .as_str()
            .or_else(|| result["error_exception"].as_str())
            .unwrap_or(code.as_str())
            .to_string();
        return Err(LedgerError::Rpc { code, message });
    }

    Ok(result)
}

fn parse_account_info(address: &Address, result: &Value) -> LedgerResult<AccountInfo> {
    let data: AccountData = decode(result["account_data"].clone())?;
    Ok(AccountInfo {
        address: address.clone(),
        balance: data.balance.parse::<Drops>()?,
        sequence: data.sequence,
        flags: data.flags,
    })
}

/// Deserialize part of a response
pub(crate) fn decode<T: serde::de::DeserializeOwned>(value: Value) -> LedgerResult<T> {
    serde_json::from_value(value)
        .map_err(|e| LedgerError::Network(format!("Malformed response: {}", e)))
}

fn ledger_index_field(result: &Value, field: &str) -> LedgerResult<u32> {
    result[field]
        .as_u64()
        .and_then(|index| u32::try_from(index).ok())
        .ok_or_else(|| LedgerError::Network(format!("response has no {}", field)))
}

pub(crate) fn http_error(error: reqwest::Error) -> LedgerError {
    if error.is_timeout() {
        LedgerError::Timeout(error.to_string())
    } else {
        LedgerError::Network(error.to_string())
    }
}
