//! Funded account bound to the action wrapper

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::amount::{format_decimal, str_to_hex, Amount, CurrencyCode, IssuedAmount};
use crate::ledger::transaction::{patterns, AccountFlag};
use crate::ledger::LedgerActions;
use crate::traits::*;
use crate::types::*;

/// One funded wallet plus the everyday actions performed with it
pub struct XrpAccount<C: LedgerClient> {
    username: String,
    wallet: Wallet,
    nft_uri: String,
    actions: Arc<LedgerActions<C>>,
}

impl<C: LedgerClient> XrpAccount<C> {
    /// Generate a wallet and fund it from the faucet
    pub async fn create(username: &str, actions: Arc<LedgerActions<C>>) -> LedgerResult<Self> {
        crate::utils::validation::validate_username(username)?;
        let wallet = actions.client().generate_funded_wallet().await?;
        info!("Created account {} for {}", wallet.address, username);
        Ok(Self::from_wallet(username, wallet, actions))
    }

    /// Wrap an existing wallet
    pub fn from_wallet(username: &str, wallet: Wallet, actions: Arc<LedgerActions<C>>) -> Self {
        Self {
            username: username.to_string(),
            wallet,
            nft_uri: str_to_hex(&format!("urn:uuid:{}", Uuid::new_v4())),
            actions,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn address(&self) -> &Address {
        &self.wallet.address
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Hex-encoded `urn:uuid:` URI used for this account's NFTs
    pub fn nft_uri(&self) -> &str {
        &self.nft_uri
    }

    /// XRP balance on the validated ledger; never cached
    pub async fn xrp_balance(&self) -> LedgerResult<BigDecimal> {
        let info = self.actions.client().account_info(self.address()).await?;
        Ok(info.xrp_balance())
    }

    pub async fn trust_lines(&self) -> LedgerResult<Vec<TrustLine>> {
        self.actions.client().account_lines(self.address()).await
    }

    /// Balance of one issued currency; zero when no line exists
    pub async fn token_balance(
        &self,
        currency: &CurrencyCode,
        issuer: &Address,
    ) -> LedgerResult<BigDecimal> {
        let lines = self.trust_lines().await?;
        Ok(lines
            .into_iter()
            .find(|l| &l.currency == currency && &l.peer == issuer)
            .map(|l| l.balance)
            .unwrap_or_else(|| BigDecimal::from(0)))
    }

    /// Send XRP to another account
    pub async fn send_xrp(
        &self,
        xrp: &BigDecimal,
        destination: &Address,
    ) -> LedgerResult<ActionOutcome> {
        let intent = patterns::xrp_payment(destination.clone(), xrp)?;
        let outcome = self.actions.execute(&self.wallet, intent).await;
        self.report(&outcome, &format!("sent {} XRP to {}", format_decimal(xrp), destination));
        Ok(outcome)
    }

    /// Trust `issuer` for up to `limit` of `currency`
    pub async fn create_trustline(
        &self,
        currency: &CurrencyCode,
        issuer: &Address,
        limit: BigDecimal,
    ) -> LedgerResult<ActionOutcome> {
        let intent = patterns::trust_line(currency.clone(), issuer.clone(), limit);
        let outcome = self.actions.execute(&self.wallet, intent).await;
        self.report(&outcome, &format!("trust line created for {}", currency));
        Ok(outcome)
    }

    /// Issue this account's own currency to a holder
    pub async fn send_token(
        &self,
        currency: &CurrencyCode,
        value: BigDecimal,
        destination: &Address,
    ) -> LedgerResult<ActionOutcome> {
        let amount = IssuedAmount::new(currency.clone(), self.address().clone(), value);
        self.send_issued(amount, destination).await
    }

    /// Send any issued currency this account holds (or issues)
    pub async fn send_issued(
        &self,
        amount: IssuedAmount,
        destination: &Address,
    ) -> LedgerResult<ActionOutcome> {
        let description = format!(
            "sent {} {} to {}",
            amount.value_string(),
            amount.currency,
            destination
        );
        let intent = patterns::token_payment(
            destination.clone(),
            amount.currency,
            amount.issuer,
            amount.value,
        );
        let outcome = self.actions.execute(&self.wallet, intent).await;
        self.report(&outcome, &description);
        Ok(outcome)
    }

    /// Mint a transferable NFT carrying this account's URI; royalty is capped at 50%
    pub async fn mint_nft(&self, royalty: u32) -> LedgerResult<ActionOutcome> {
        let intent = patterns::transferable_nft(self.nft_uri.clone(), royalty);
        let outcome = self.actions.execute(&self.wallet, intent).await;
        self.report(&outcome, "created an NFT");
        Ok(outcome)
    }

    /// List an owned NFT for sale, optionally to one buyer only
    pub async fn create_nft_sell_offer(
        &self,
        nftoken_id: &str,
        xrp: &BigDecimal,
        destination: Option<&Address>,
    ) -> LedgerResult<ActionOutcome> {
        let intent =
            patterns::nft_sell_offer(nftoken_id.to_string(), xrp, destination.cloned())?;
        let outcome = self.actions.execute(&self.wallet, intent).await;
        self.report(
            &outcome,
            &format!("offered NFT {} for {} XRP", nftoken_id, format_decimal(xrp)),
        );
        Ok(outcome)
    }

    /// Place an exchange offer giving `pay` in return for `get`
    pub async fn create_offer(&self, pay: Amount, get: Amount) -> LedgerResult<ActionOutcome> {
        let description = format!("created offer: pay {} for {}", pay, get);
        let outcome = self.actions.execute(&self.wallet, patterns::offer(pay, get)).await;
        self.report(&outcome, &description);
        Ok(outcome)
    }

    pub async fn set_account_flag(&self, flag: AccountFlag) -> LedgerResult<ActionOutcome> {
        let outcome = self.actions.execute(&self.wallet, patterns::set_flag(flag)).await;
        self.report(&outcome, &format!("set {:?}", flag));
        Ok(outcome)
    }

    pub async fn clear_account_flag(&self, flag: AccountFlag) -> LedgerResult<ActionOutcome> {
        let outcome = self.actions.execute(&self.wallet, patterns::clear_flag(flag)).await;
        self.report(&outcome, &format!("cleared {:?}", flag));
        Ok(outcome)
    }

    /// As an issuer that requires authorization, approve a holder's line
    pub async fn authorize_trustline(
        &self,
        holder: &Address,
        currency: &CurrencyCode,
    ) -> LedgerResult<ActionOutcome> {
        let intent = patterns::authorize_holder(currency.clone(), holder.clone());
        let outcome = self.actions.execute(&self.wallet, intent).await;
        self.report(&outcome, &format!("authorized {} for {}", holder, currency));
        Ok(outcome)
    }

    /// Look a submitted transaction up and report whether it is validated
    pub async fn verify(&self, hash: &str) -> LedgerResult<bool> {
        let status = self.actions.client().transaction_status(hash).await?;
        info!("Validated: {}", status.validated);
        Ok(status.validated)
    }

    /// XRP balance plus every trust-line balance
    pub async fn holdings(&self) -> LedgerResult<Holdings> {
        let xrp = self.xrp_balance().await?;
        let tokens = self
            .trust_lines()
            .await?
            .into_iter()
            .map(|line| TokenHolding {
                currency: line.currency,
                issuer: line.peer,
                issuer_name: None,
                balance: line.balance,
            })
            .collect();

        Ok(Holdings {
            owner: self.username.clone(),
            address: self.address().clone(),
            xrp,
            tokens,
        })
    }

    fn report(&self, outcome: &ActionOutcome, success: &str) {
        if outcome.is_success() {
            info!("{} {}", self.username, success);
        } else {
            info!("{}: {}", self.username, outcome.message());
        }
    }
}

impl<C: LedgerClient> fmt::Debug for XrpAccount<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XrpAccount")
            .field("username", &self.username)
            .field("wallet", &self.wallet)
            .field("nft_uri", &self.nft_uri)
            .finish()
    }
}

/// Balance of one issued currency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenHolding {
    pub currency: CurrencyCode,
    pub issuer: Address,
    /// Username of the issuer when it is a known account
    pub issuer_name: Option<String>,
    pub balance: BigDecimal,
}

/// Snapshot of what an account holds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holdings {
    pub owner: String,
    pub address: Address,
    pub xrp: BigDecimal,
    pub tokens: Vec<TokenHolding>,
}

impl Holdings {
    /// Token balances keyed by currency, as the dashboard shows them
    pub fn balances_by_currency(&self) -> Vec<(String, String)> {
        self.tokens
            .iter()
            .map(|t| (t.currency.to_string(), t.balance.to_string()))
            .collect()
    }
}

impl fmt::Display for Holdings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} holdings:", self.owner)?;
        writeln!(f, "XRP: {}", format_decimal(&self.xrp))?;
        for token in &self.tokens {
            let issuer = token
                .issuer_name
                .clone()
                .unwrap_or_else(|| token.issuer.to_string());
            writeln!(
                f,
                "{} issued by {}: {}",
                token.currency, issuer, token.balance
            )?;
        }
        Ok(())
    }
}
