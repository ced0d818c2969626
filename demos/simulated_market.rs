//! Offline run of the portal against the in-process ledger simulator:
//! register artists, mint NFTs for uploaded images, list them for sale and
//! show each dashboard.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use xrpl_actions::utils::{MemoryDirectory, MemoryLedger};
use xrpl_actions::{AccountRegistry, LedgerActions, Portal, PortalConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("🖼️  XRPL Actions - Simulated NFT Market\n");

    let ledger = Arc::new(MemoryLedger::new());
    let registry = AccountRegistry::new(Arc::new(LedgerActions::new(ledger.clone())));
    let upload_dir = std::env::temp_dir().join("xrpl-actions-demo");
    let portal = Portal::new(
        registry,
        Arc::new(MemoryDirectory::new()),
        PortalConfig::with_upload_dir(&upload_dir),
    );

    let artists = [
        ("0825550101", "Thandi", "sunset.png"),
        ("0825550102", "Pieter", "harbour at night.jpg"),
    ];

    println!("👤 Registering artists...");
    for (phone, name, _) in &artists {
        let user = portal.register(phone, name).await?;
        println!("  ✓ {} (user {}) -> {}", name, user.id, user.wallet_address);
    }
    println!();

    println!("🪙 Minting uploads...");
    let mut minted = Vec::new();
    for (phone, name, file) in &artists {
        let nft = portal.upload_and_mint(phone, file, b"demo image").await?;
        println!("  ✓ {} minted {} from {}", name, nft.public_id(), nft.image_path);
        minted.push(nft);
    }
    println!();

    println!("🏷️  Listing NFTs for sale...");
    for (nft, price) in minted.iter().zip([25, 40]) {
        let outcome = portal
            .create_nft_offer(nft.public_id(), &BigDecimal::from(price))
            .await?;
        println!("  {} XRP: {}", price, outcome);
    }
    println!();

    println!("📋 Dashboards");
    for (phone, _, _) in &artists {
        let dashboard = portal.dashboard(phone).await?;
        println!("  {} owns {} NFT(s)", dashboard.user.phone, dashboard.nfts.len());
        if let Some(holdings) = dashboard.holdings {
            print!("{}", holdings);
        }
    }

    println!("\n{} submissions simulated", ledger.submission_count());
    portal.registry().clear()?;
    Ok(())
}
