//! JSON-RPC client tests against a mock node

use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, Respond, ResponseTemplate};
use xrpl_actions::rpc::JsonRpcClient;
use xrpl_actions::signing::generate_wallet;
use xrpl_actions::{
    patterns, ActionOutcome, ClientConfig, LedgerActions, LedgerClient, LedgerError,
    PreflightPolicy, SigningMode, Transaction, Wallet,
};

const TX_HASH: &str = "C53ECF838647FA5A4C780377025FEC7999AB4182590510CA461444B207AB28A1";

/// Matches a JSON-RPC call by method name
struct RpcMethod(&'static str);

impl Match for RpcMethod {
    fn matches(&self, request: &Request) -> bool {
        request
            .body_json::<Value>()
            .map(|body| body["method"] == self.0)
            .unwrap_or(false)
    }
}

/// Matches an `account_lines` call resuming from `marker`
struct LinesAfter(&'static str);

impl Match for LinesAfter {
    fn matches(&self, request: &Request) -> bool {
        request
            .body_json::<Value>()
            .map(|body| body["method"] == "account_lines" && body["params"][0]["marker"] == self.0)
            .unwrap_or(false)
    }
}

/// Faucet that funds whatever destination it is sent
struct EchoFaucet;

impl Respond for EchoFaucet {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let destination = request
            .body_json::<Value>()
            .map(|body| body["destination"].clone())
            .unwrap_or(Value::Null);
        ResponseTemplate::new(200).set_body_json(json!({
            "account": { "classicAddress": destination, "address": destination },
            "amount": 100,
        }))
    }
}

fn rpc(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "result": result }))
}

fn rpc_error(code: &str, message: &str) -> ResponseTemplate {
    rpc(json!({ "status": "error", "error": code, "error_message": message }))
}

async fn answer(server: &MockServer, rpc_method: &'static str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(RpcMethod(rpc_method))
        .respond_with(response)
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        rpc_url: server.uri(),
        faucet_url: format!("{}/accounts", server.uri()),
        poll_interval_ms: 5,
        submit_timeout_ms: 2_000,
        ..ClientConfig::testnet()
    }
}

fn account_data(wallet: &Wallet) -> Value {
    json!({
        "account_data": {
            "Account": wallet.address.as_str(),
            "Balance": "100000000",
            "Sequence": 5,
            "Flags": 0,
        },
        "validated": true,
        "status": "success",
    })
}

/// Node that accepts `account_info`, `fee` and `ledger_current` for `wallet`
async fn node_for(wallet: &Wallet) -> MockServer {
    let server = MockServer::start().await;
    answer(&server, "account_info", rpc(account_data(wallet))).await;
    answer(
        &server,
        "fee",
        rpc(json!({ "drops": { "base_fee": "10", "open_ledger_fee": "12" }, "status": "success" })),
    )
    .await;
    answer(
        &server,
        "ledger_current",
        rpc(json!({ "ledger_current_index": 100, "status": "success" })),
    )
    .await;
    server
}

fn accepted(engine_result: &str) -> ResponseTemplate {
    rpc(json!({
        "engine_result": engine_result,
        "engine_result_message": "",
        "tx_json": { "hash": TX_HASH },
        "status": "success",
    }))
}

fn payment(wallet: &Wallet) -> Transaction {
    let destination = generate_wallet().unwrap().address;
    Transaction::new(
        wallet.address.clone(),
        patterns::xrp_payment(destination, &BigDecimal::from(1)).unwrap(),
    )
}

async fn calls_to(server: &MockServer, rpc_method: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request| request.body_json::<Value>().ok())
        .filter(|body| body["method"] == rpc_method)
        .collect()
}

#[tokio::test]
async fn test_final_rejection_is_not_polled() {
    let wallet = generate_wallet().unwrap();
    let server = node_for(&wallet).await;
    answer(&server, "submit", accepted("temBAD_FEE")).await;

    let client = JsonRpcClient::new(config(&server)).unwrap();
    let response = client.submit_and_wait(&payment(&wallet), &wallet).await.unwrap();

    assert!(!response.validated);
    assert_eq!(response.result_code, "temBAD_FEE");
    assert_eq!(response.hash, TX_HASH);
    assert!(calls_to(&server, "tx").await.is_empty());

    // The wrapper reports it as a ledger failure
    let mut skip = config(&server);
    skip.preflight = PreflightPolicy::Skip;
    let actions = LedgerActions::from_config(Arc::new(JsonRpcClient::new(skip.clone()).unwrap()), &skip);
    let intent = patterns::xrp_payment(generate_wallet().unwrap().address, &BigDecimal::from(1)).unwrap();
    let outcome = actions.execute(&wallet, intent).await;
    assert!(matches!(outcome, ActionOutcome::FailedByLedger { ref code, .. } if code == "temBAD_FEE"));
}

#[tokio::test]
async fn test_unknown_transaction_is_polled_until_validated() {
    let wallet = generate_wallet().unwrap();
    let server = node_for(&wallet).await;
    answer(&server, "submit", accepted("tesSUCCESS")).await;
    answer(
        &server,
        "ledger",
        rpc(json!({ "ledger_index": 101, "status": "success" })),
    )
    .await;
    Mock::given(method("POST"))
        .and(RpcMethod("tx"))
        .respond_with(rpc_error("txnNotFound", "Transaction not found."))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    answer(
        &server,
        "tx",
        rpc(json!({
            "validated": true,
            "ledger_index": 102,
            "meta": { "TransactionResult": "tesSUCCESS" },
            "status": "success",
        })),
    )
    .await;

    let client = JsonRpcClient::new(config(&server)).unwrap();
    let response = client.submit_and_wait(&payment(&wallet), &wallet).await.unwrap();

    assert!(response.is_successful());
    assert_eq!(response.ledger_index, Some(102));
    assert_eq!(calls_to(&server, "tx").await.len(), 3);

    // Signed in process: a blob goes out, the seed does not
    let submits = calls_to(&server, "submit").await;
    assert_eq!(submits.len(), 1);
    let params = &submits[0]["params"][0];
    let blob = params["tx_blob"].as_str().unwrap();
    assert!(hex::decode(blob).is_ok());
    assert!(params.get("secret").is_none());
    assert!(!submits[0].to_string().contains(wallet.seed()));
}

#[tokio::test]
async fn test_wait_ends_once_last_ledger_is_validated() {
    let wallet = generate_wallet().unwrap();
    let server = node_for(&wallet).await;
    answer(&server, "submit", accepted("tesSUCCESS")).await;
    answer(&server, "tx", rpc_error("txnNotFound", "Transaction not found.")).await;
    answer(
        &server,
        "ledger",
        rpc(json!({ "ledger_index": 121, "status": "success" })),
    )
    .await;

    let client = JsonRpcClient::new(config(&server)).unwrap();
    let result = client.submit_and_wait(&payment(&wallet), &wallet).await;

    match result {
        Err(LedgerError::Timeout(message)) => assert!(message.contains("120"), "{}", message),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn test_trust_lines_follow_marker() {
    let holder = generate_wallet().unwrap();
    let usd_issuer = generate_wallet().unwrap();
    let eur_issuer = generate_wallet().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(LinesAfter("PAGE2"))
        .respond_with(rpc(json!({
            "account": holder.address.as_str(),
            "lines": [{
                "account": eur_issuer.address.as_str(),
                "balance": "7.5",
                "currency": "EUR",
                "limit": "50",
                "limit_peer": "0",
            }],
            "status": "success",
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    answer(
        &server,
        "account_lines",
        rpc(json!({
            "account": holder.address.as_str(),
            "lines": [{
                "account": usd_issuer.address.as_str(),
                "balance": "10",
                "currency": "USD",
                "limit": "100",
                "limit_peer": "0",
            }],
            "marker": "PAGE2",
            "status": "success",
        })),
    )
    .await;

    let client = JsonRpcClient::new(config(&server)).unwrap();
    let lines = client.account_lines(&holder.address).await.unwrap();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].peer, usd_issuer.address);
    assert_eq!(lines[1].peer, eur_issuer.address);
    assert_eq!(lines[1].currency.as_str(), "EUR");
    assert_eq!(lines[1].balance, "7.5".parse::<BigDecimal>().unwrap());
    assert_eq!(calls_to(&server, "account_lines").await.len(), 2);
}

#[tokio::test]
async fn test_faucet_funds_locally_generated_wallet() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts"))
        .respond_with(EchoFaucet)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(RpcMethod("account_info"))
        .respond_with(rpc(json!({
            "account_data": { "Balance": "100000000", "Sequence": 1, "Flags": 0 },
            "status": "success",
        })))
        .mount(&server)
        .await;

    let client = JsonRpcClient::new(config(&server)).unwrap();
    let wallet = client.generate_funded_wallet().await.unwrap();

    assert!(wallet.seed().starts_with("sEd"));
    let requests = server.received_requests().await.unwrap();
    let faucet_body: Value = requests
        .iter()
        .find(|r| r.url.path() == "/accounts")
        .unwrap()
        .body_json()
        .unwrap();
    assert_eq!(faucet_body, json!({ "destination": wallet.address.as_str() }));
}

#[tokio::test]
async fn test_node_refusing_server_signing_is_explained() {
    let wallet = generate_wallet().unwrap();
    let server = node_for(&wallet).await;
    answer(
        &server,
        "submit",
        rpc_error("noPermission", "You don't have permission for this command."),
    )
    .await;

    let mut server_signing = config(&server);
    server_signing.signing = SigningMode::Server;
    let client = JsonRpcClient::new(server_signing).unwrap();
    let result = client.submit_and_wait(&payment(&wallet), &wallet).await;

    match result {
        Err(LedgerError::Rpc { code, message }) => {
            assert_eq!(code, "noPermission");
            assert!(message.contains("local signing"), "{}", message);
        }
        other => panic!("unexpected result {:?}", other),
    }
}
