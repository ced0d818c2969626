//! Test-network walkthrough: fund accounts, trust an issuer, issue a
//! currency, pay in XRP and post an exchange offer.
//!
//! Run with `RUST_LOG=xrpl_actions=debug cargo run --example tutorial`.
//! `XRPL_RPC_URL` and friends override the test network defaults.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use xrpl_actions::rpc::JsonRpcClient;
use xrpl_actions::{AccountRegistry, Amount, ClientConfig, CurrencyCode, LedgerActions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("🌐 XRPL Actions - Test Network Tutorial\n");

    let config = ClientConfig::from_env()?;
    println!("Connecting to {}", config.rpc_url);
    let client = Arc::new(JsonRpcClient::new(config.clone())?);
    let actions = Arc::new(LedgerActions::from_config(client, &config));
    let registry = AccountRegistry::new(actions);

    // 1. Fund three accounts from the faucet
    println!("💧 Funding accounts (this takes a few ledgers)...");
    let issuer = registry.register("issuer", "Issuer").await?;
    let alice = registry.register("alice", "Alice").await?;
    let bob = registry.register("bob", "Bob").await?;
    for account in [&issuer, &alice, &bob] {
        println!(
            "  ✓ {} {} holds {} XRP",
            account.username(),
            account.address(),
            account.xrp_balance().await?
        );
    }
    println!();

    // 2. Trust lines and issuance
    let aud = CurrencyCode::new("AUD")?;
    println!("🤝 Opening trust lines for {}...", aud);
    for holder in [&alice, &bob] {
        let outcome = holder
            .create_trustline(&aud, issuer.address(), BigDecimal::from(10_000))
            .await?;
        println!("  {}: {}", holder.username(), outcome);
    }

    println!("🏦 Issuing {}...", aud);
    println!(
        "  {}",
        issuer
            .send_token(&aud, BigDecimal::from(5_000), alice.address())
            .await?
    );
    println!(
        "  {}",
        issuer
            .send_token(&aud, BigDecimal::from(2_000), bob.address())
            .await?
    );
    println!();

    // 3. XRP payment, verified by hash
    println!("💸 Alice sends Bob 10 XRP...");
    let payment = alice.send_xrp(&BigDecimal::from(10), bob.address()).await?;
    println!("  {}", payment);
    if let Some(hash) = payment.hash() {
        println!("  Validated: {}", alice.verify(hash).await?);
    }

    // An overspend is refused locally
    let refused = alice.send_xrp(&BigDecimal::from(1_000_000), bob.address()).await?;
    println!("  {}", refused);
    println!();

    // 4. Exchange offer
    println!("📈 Alice offers 100 AUD for 50 XRP...");
    let offer = alice
        .create_offer(
            Amount::issued(aud.clone(), issuer.address().clone(), BigDecimal::from(100)),
            Amount::xrp(&BigDecimal::from(50))?,
        )
        .await?;
    println!("  {}\n", offer);

    // 5. Holdings with issuer names resolved
    for account in [&alice, &bob] {
        print!("{}", registry.describe_holdings(account).await?);
    }

    registry.clear()?;
    Ok(())
}
