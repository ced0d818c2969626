//! Integration tests for xrpl-actions

use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::Arc;
use xrpl_actions::{
    patterns,
    utils::{MemoryDirectory, MemoryLedger},
    AccountFlag, AccountRegistry, ActionOutcome, Amount, CurrencyCode, Drops, IssuedAmount,
    LedgerActions, LedgerClient, Portal, PortalConfig, Precondition, XrpAccount,
};

fn setup() -> (Arc<MemoryLedger>, AccountRegistry<MemoryLedger>) {
    let ledger = Arc::new(MemoryLedger::new());
    let actions = Arc::new(LedgerActions::new(ledger.clone()));
    (ledger, AccountRegistry::new(actions))
}

#[tokio::test]
async fn test_complete_token_workflow() {
    let (ledger, registry) = setup();
    let aud = CurrencyCode::new("AUD").unwrap();

    let issuer = registry.register("issuer", "Issuer").await.unwrap();
    let alice = registry.register("alice", "Alice").await.unwrap();
    let bob = registry.register("bob", "Bob").await.unwrap();

    // Holders trust the issuer
    for holder in [&alice, &bob] {
        let outcome = holder
            .create_trustline(&aud, issuer.address(), BigDecimal::from(10_000))
            .await
            .unwrap();
        assert!(outcome.is_success(), "{}", outcome);
    }

    // Issue currency
    assert!(issuer
        .send_token(&aud, BigDecimal::from(5_000), alice.address())
        .await
        .unwrap()
        .is_success());
    assert!(issuer
        .send_token(&aud, BigDecimal::from(2_000), bob.address())
        .await
        .unwrap()
        .is_success());

    // Holder to holder
    let tip = IssuedAmount::new(aud.clone(), issuer.address().clone(), BigDecimal::from(250));
    assert!(alice.send_issued(tip, bob.address()).await.unwrap().is_success());

    // XRP payment
    let outcome = alice
        .send_xrp(&BigDecimal::from(10), bob.address())
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert!(alice.verify(outcome.hash().unwrap()).await.unwrap());

    assert_eq!(
        alice.token_balance(&aud, issuer.address()).await.unwrap(),
        BigDecimal::from(4_750)
    );
    assert_eq!(
        bob.token_balance(&aud, issuer.address()).await.unwrap(),
        BigDecimal::from(2_250)
    );

    // Alice offers AUD for XRP on the exchange
    let offer = alice
        .create_offer(
            Amount::issued(aud.clone(), issuer.address().clone(), BigDecimal::from(100)),
            Amount::xrp(&BigDecimal::from(50)).unwrap(),
        )
        .await
        .unwrap();
    assert!(offer.is_success(), "{}", offer);
    assert_eq!(ledger.offers_of(alice.address()).unwrap().len(), 1);

    let holdings = registry.describe_holdings(&bob).await.unwrap();
    assert_eq!(
        holdings.balances_by_currency(),
        vec![("AUD".to_string(), "2250".to_string())]
    );
    assert!(holdings.to_string().contains("AUD issued by Issuer: 2250"));
    assert_eq!(holdings.xrp, BigDecimal::from_str("109.999988").unwrap());
}

#[tokio::test]
async fn test_overspend_is_refused_before_submission() {
    let (ledger, registry) = setup();
    let alice = registry.register("alice", "Alice").await.unwrap();
    let bob = registry.register("bob", "Bob").await.unwrap();

    let outcome = alice
        .send_xrp(&BigDecimal::from(500), bob.address())
        .await
        .unwrap();

    assert!(!outcome.was_submitted());
    assert!(matches!(
        outcome,
        ActionOutcome::Rejected(Precondition::InsufficientBalance { .. })
    ));
    assert_eq!(ledger.submission_count(), 0);
    assert_eq!(alice.xrp_balance().await.unwrap(), BigDecimal::from(100));
}

#[tokio::test]
async fn test_authorized_trust_lines() {
    let (ledger, registry) = setup();
    let usd = CurrencyCode::new("USD").unwrap();

    let bank = registry.register("bank", "Bank").await.unwrap();
    let carol = registry.register("carol", "Carol").await.unwrap();

    assert!(bank
        .set_account_flag(AccountFlag::RequireAuth)
        .await
        .unwrap()
        .is_success());
    assert!(carol
        .create_trustline(&usd, bank.address(), BigDecimal::from(1_000))
        .await
        .unwrap()
        .is_success());

    // Unauthorized line: both the payment and an offer to buy USD are refused
    let payment = bank
        .send_token(&usd, BigDecimal::from(10), carol.address())
        .await
        .unwrap();
    assert!(matches!(
        payment,
        ActionOutcome::Rejected(Precondition::Unauthorized { .. })
    ));

    let before = ledger.submission_count();
    let offer = carol
        .create_offer(
            Amount::xrp(&BigDecimal::from(5)).unwrap(),
            Amount::issued(usd.clone(), bank.address().clone(), BigDecimal::from(5)),
        )
        .await
        .unwrap();
    assert!(matches!(
        offer,
        ActionOutcome::Rejected(Precondition::Unauthorized { .. })
    ));
    assert_eq!(ledger.submission_count(), before);

    // After authorization the payment goes through
    assert!(bank
        .authorize_trustline(carol.address(), &usd)
        .await
        .unwrap()
        .is_success());
    assert!(bank
        .send_token(&usd, BigDecimal::from(10), carol.address())
        .await
        .unwrap()
        .is_success());
}

#[tokio::test]
async fn test_nft_mint_and_sell_offer() {
    let (ledger, registry) = setup();
    let artist = registry.register("artist", "Artist").await.unwrap();
    let collector = registry.register("collector", "Collector").await.unwrap();

    // Royalty above the maximum is capped
    let minted = artist.mint_nft(80_000).await.unwrap();
    let nftoken_id = minted.response().unwrap().nftoken_id.clone().unwrap();
    let nfts = ledger.nfts_of(artist.address()).unwrap();
    assert_eq!(nfts[0].transfer_fee, 50_000);

    let offer = artist
        .create_nft_sell_offer(&nftoken_id, &BigDecimal::from(25), Some(collector.address()))
        .await
        .unwrap();
    assert!(offer.is_success(), "{}", offer);
    assert!(offer.response().unwrap().offer_id.is_some());

    // Someone else's token cannot be offered
    let stolen = collector
        .create_nft_sell_offer(&nftoken_id, &BigDecimal::from(1), None)
        .await
        .unwrap();
    assert!(matches!(stolen, ActionOutcome::FailedByLedger { .. }));
}

#[tokio::test]
async fn test_ledger_failure_and_network_failure_are_distinct() {
    let (ledger, registry) = setup();
    let alice = registry.register("alice", "Alice").await.unwrap();
    let bob = registry.register("bob", "Bob").await.unwrap();

    ledger.force_next_result("tecPATH_DRY");
    let failed = alice.send_xrp(&BigDecimal::from(1), bob.address()).await.unwrap();
    assert!(matches!(failed, ActionOutcome::FailedByLedger { ref code, .. } if code == "tecPATH_DRY"));

    ledger.fail_next_submission("connection refused");
    let errored = alice.send_xrp(&BigDecimal::from(1), bob.address()).await.unwrap();
    assert!(matches!(errored, ActionOutcome::SubmissionError { .. }));
    assert!(errored.message().contains("connection refused"));
}

#[tokio::test]
async fn test_registry_reuses_accounts() {
    let (ledger, registry) = setup();

    let first = registry.get_or_create("0825550101").await.unwrap();
    let second = registry.get_or_create("0825550101").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
    assert_eq!(ledger.submission_count(), 0);
}

#[tokio::test]
async fn test_accounts_from_existing_wallets() {
    let ledger = Arc::new(MemoryLedger::new());
    let actions = Arc::new(LedgerActions::new(ledger.clone()));

    let wallet = ledger.generate_funded_wallet().await.unwrap();
    let account = XrpAccount::from_wallet("Imported", wallet, actions);

    let info = ledger.account_info(account.address()).await.unwrap();
    assert_eq!(info.balance, Drops(100_000_000));
    assert_eq!(account.xrp_balance().await.unwrap(), BigDecimal::from(100));
}

#[tokio::test]
async fn test_transaction_patterns_validate_amounts() {
    let (_, registry) = setup();
    let alice = registry.register("alice", "Alice").await.unwrap();

    assert!(patterns::xrp_payment(alice.address().clone(), &BigDecimal::from_str("0.0000001").unwrap()).is_err());
    assert!(patterns::xrp_payment(alice.address().clone(), &BigDecimal::from(-1)).is_err());
}

#[tokio::test]
async fn test_portal_flow() {
    let dir = tempfile::tempdir().unwrap();
    let (_, registry) = setup();
    let portal = Portal::new(
        registry,
        Arc::new(MemoryDirectory::new()),
        PortalConfig::with_upload_dir(dir.path()),
    );

    let user = portal.register("0825550101", "Thandi").await.unwrap();
    let nft = portal
        .upload_and_mint("0825550101", "/etc/sunset photo.jpg", b"jpeg")
        .await
        .unwrap();
    assert!(nft.image_path.ends_with("-sunset_photo.jpg"));
    let stored = std::path::Path::new(&nft.image_path);
    assert_eq!(stored.parent(), Some(dir.path()));
    assert!(stored.exists());

    let offer = portal
        .create_nft_offer(nft.public_id(), &BigDecimal::from(10))
        .await
        .unwrap();
    assert!(offer.is_success(), "{}", offer);

    let dashboard = portal.dashboard("0825550101").await.unwrap();
    assert_eq!(dashboard.user, user);
    assert_eq!(dashboard.nfts, vec![nft]);
    assert!(dashboard.holdings.is_some());
}
