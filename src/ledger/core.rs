//! Ledger action wrapper: build, pre-check, submit, interpret

use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::amount::{format_decimal, Amount, IssuedAmount};
use crate::config::{ClientConfig, PreflightPolicy};
use crate::ledger::transaction::{Intent, Transaction};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::DefaultIntentValidator;

/// Turns typed intents into submitted transactions and reports the outcome
pub struct LedgerActions<C: LedgerClient> {
    client: Arc<C>,
    validator: Box<dyn IntentValidator>,
    preflight: PreflightPolicy,
}

impl<C: LedgerClient> LedgerActions<C> {
    /// Create a wrapper with the default validator and pre-checks enabled
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            validator: Box::new(DefaultIntentValidator),
            preflight: PreflightPolicy::Enforce,
        }
    }

    /// Default validator, pre-check policy taken from the client settings
    pub fn from_config(client: Arc<C>, config: &ClientConfig) -> Self {
        Self::with_policy(client, Box::new(DefaultIntentValidator), config.preflight)
    }

    /// Create a wrapper with a custom validator and pre-check policy
    pub fn with_policy(
        client: Arc<C>,
        validator: Box<dyn IntentValidator>,
        preflight: PreflightPolicy,
    ) -> Self {
        Self {
            client,
            validator,
            preflight,
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn preflight(&self) -> PreflightPolicy {
        self.preflight
    }

    /// Validate, pre-check, submit and wait for a final outcome.
    ///
    /// Never retries. A submission error leaves the transaction's fate
    /// unknown and is returned to the caller as is.
    pub async fn execute(&self, wallet: &Wallet, intent: Intent) -> ActionOutcome {
        let account = &wallet.address;

        if let Err(reason) = self.validator.validate_intent(account, &intent) {
            debug!("{} rejected by validator: {}", intent.transaction_type(), reason);
            return ActionOutcome::Rejected(reason);
        }

        if self.preflight == PreflightPolicy::Enforce {
            match self.check_preconditions(account, &intent).await {
                Ok(None) => {}
                Ok(Some(reason)) => {
                    info!(
                        "{} for {} stopped before submission: {}",
                        intent.transaction_type(),
                        account,
                        reason
                    );
                    return ActionOutcome::Rejected(reason);
                }
                Err(LedgerError::AccountNotFound(address)) => {
                    return ActionOutcome::Rejected(Precondition::Invalid(format!(
                        "Account {} does not exist on the ledger",
                        address
                    )));
                }
                Err(e) => {
                    warn!("Pre-check query for {} failed: {}", account, e);
                    return ActionOutcome::SubmissionError {
                        message: format!("pre-check query failed: {}", e),
                    };
                }
            }
        }

        let transaction = Transaction::new(account.clone(), intent);
        let kind = transaction.transaction_type();

        match self.client.submit_and_wait(&transaction, wallet).await {
            Ok(response) if response.is_successful() => {
                info!("{} {} validated in ledger {:?}", kind, response.hash, response.ledger_index);
                ActionOutcome::Succeeded(response)
            }
            Ok(response) => {
                warn!("{} {} failed on ledger: {}", kind, response.hash, response.result_code);
                ActionOutcome::FailedByLedger {
                    hash: Some(response.hash),
                    code: response.result_code,
                }
            }
            Err(e) => {
                warn!("{} from {} could not be submitted: {}", kind, account, e);
                ActionOutcome::SubmissionError {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Ledger-state checks that predict a certain rejection.
    ///
    /// Returns `Ok(Some(reason))` when the action should not be submitted.
    pub async fn check_preconditions(
        &self,
        account: &Address,
        intent: &Intent,
    ) -> LedgerResult<Option<Precondition>> {
        match intent {
            Intent::Payment {
                destination,
                amount,
            } => {
                if let Some(reason) = self.check_funds(account, amount).await? {
                    return Ok(Some(reason));
                }
                match amount {
                    Amount::Xrp(_) => Ok(None),
                    Amount::Issued(issued) => self.check_can_receive(destination, issued).await,
                }
            }
            Intent::OfferCreate { pay, get } => {
                if let Amount::Issued(target) = get {
                    if let Some(reason) = self.check_line_authorized(account, target).await? {
                        return Ok(Some(reason));
                    }
                }
                self.check_offer_funded(account, pay).await
            }
            Intent::TrustSet { limit, authorize } => {
                // The issuer must exist; for an authorization the "issuer" field names the holder
                self.client.account_info(&limit.issuer).await?;
                if *authorize {
                    let lines = self.client.account_lines(account).await?;
                    let exists = lines
                        .iter()
                        .any(|l| l.peer == limit.issuer && l.currency == limit.currency);
                    if !exists {
                        return Ok(Some(Precondition::MissingTrustLine {
                            holder: limit.issuer.clone(),
                            currency: limit.currency.clone(),
                            issuer: account.clone(),
                        }));
                    }
                }
                Ok(None)
            }
            Intent::NftSellOffer {
                destination: Some(destination),
                ..
            } => {
                self.client.account_info(destination).await?;
                Ok(None)
            }
            Intent::NftMint { .. } | Intent::NftSellOffer { .. } | Intent::AccountSet { .. } => {
                Ok(None)
            }
        }
    }

    /// The account can deliver `amount` from its own holdings
    async fn check_funds(
        &self,
        account: &Address,
        amount: &Amount,
    ) -> LedgerResult<Option<Precondition>> {
        match amount {
            Amount::Xrp(drops) => {
                let info = self.client.account_info(account).await?;
                if *drops > info.balance {
                    return Ok(Some(Precondition::InsufficientBalance {
                        available: format!("{} XRP", format_decimal(&info.xrp_balance())),
                        requested: format!("{} XRP", format_decimal(&drops.to_xrp())),
                    }));
                }
                Ok(None)
            }
            Amount::Issued(issued) => {
                // Issuers create their currency on demand
                if &issued.issuer == account {
                    return Ok(None);
                }
                let lines = self.client.account_lines(account).await?;
                let held = lines
                    .iter()
                    .find(|l| l.peer == issued.issuer && l.currency == issued.currency)
                    .map(|l| l.balance.clone())
                    .unwrap_or_else(|| BigDecimal::from(0));
                if issued.value > held {
                    return Ok(Some(Precondition::InsufficientBalance {
                        available: format!("{} {}", held, issued.currency),
                        requested: format!("{} {}", issued.value_string(), issued.currency),
                    }));
                }
                Ok(None)
            }
        }
    }

    /// The owner holds some of what the offer gives away.
    ///
    /// Offers may be partially funded: the ledger only refuses one whose owner
    /// holds none of `pay`, and the offer then trades up to the funded part.
    async fn check_offer_funded(
        &self,
        account: &Address,
        pay: &Amount,
    ) -> LedgerResult<Option<Precondition>> {
        let zero = BigDecimal::from(0);
        match pay {
            Amount::Xrp(drops) => {
                let info = self.client.account_info(account).await?;
                if info.balance.0 == 0 {
                    return Ok(Some(Precondition::InsufficientBalance {
                        available: "0 XRP".to_string(),
                        requested: format!("{} XRP", format_decimal(&drops.to_xrp())),
                    }));
                }
                Ok(None)
            }
            Amount::Issued(issued) if &issued.issuer == account => Ok(None),
            Amount::Issued(issued) => {
                let held = self
                    .find_line(account, issued)
                    .await?
                    .map(|line| line.balance)
                    .unwrap_or_else(|| zero.clone());
                if held <= zero {
                    return Ok(Some(Precondition::InsufficientBalance {
                        available: format!("{} {}", held, issued.currency),
                        requested: format!("{} {}", issued.value_string(), issued.currency),
                    }));
                }
                Ok(None)
            }
        }
    }

    /// The recipient holds an authorized line with enough headroom
    async fn check_can_receive(
        &self,
        holder: &Address,
        issued: &IssuedAmount,
    ) -> LedgerResult<Option<Precondition>> {
        if holder == &issued.issuer {
            return Ok(None);
        }

        let line = match self.find_line(holder, issued).await? {
            Some(line) => line,
            None => return Ok(Some(self.missing_line(holder, issued))),
        };

        if !self.is_authorized(&line, &issued.issuer).await? {
            return Ok(Some(self.unauthorized(holder, issued)));
        }

        let remaining = line.remaining_limit();
        if issued.value > remaining {
            return Ok(Some(Precondition::TrustLimitExceeded {
                remaining: remaining.to_string(),
                requested: issued.value_string(),
            }));
        }

        Ok(None)
    }

    /// The holder may hold the issuer's currency at all
    async fn check_line_authorized(
        &self,
        holder: &Address,
        issued: &IssuedAmount,
    ) -> LedgerResult<Option<Precondition>> {
        if holder == &issued.issuer {
            return Ok(None);
        }

        match self.find_line(holder, issued).await? {
            None => Ok(Some(self.missing_line(holder, issued))),
            Some(line) if !self.is_authorized(&line, &issued.issuer).await? => {
                Ok(Some(self.unauthorized(holder, issued)))
            }
            Some(_) => Ok(None),
        }
    }

    async fn find_line(
        &self,
        holder: &Address,
        issued: &IssuedAmount,
    ) -> LedgerResult<Option<TrustLine>> {
        let lines = self.client.account_lines(holder).await?;
        Ok(lines
            .into_iter()
            .find(|l| l.peer == issued.issuer && l.currency == issued.currency))
    }

    async fn is_authorized(&self, line: &TrustLine, issuer: &Address) -> LedgerResult<bool> {
        if line.peer_authorized {
            return Ok(true);
        }
        let issuer_info = self.client.account_info(issuer).await?;
        Ok(!issuer_info.requires_auth())
    }

    fn missing_line(&self, holder: &Address, issued: &IssuedAmount) -> Precondition {
        Precondition::MissingTrustLine {
            holder: holder.clone(),
            currency: issued.currency.clone(),
            issuer: issued.issuer.clone(),
        }
    }

    fn unauthorized(&self, holder: &Address, issued: &IssuedAmount) -> Precondition {
        Precondition::Unauthorized {
            holder: holder.clone(),
            currency: issued.currency.clone(),
            issuer: issued.issuer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{CurrencyCode, Drops};
    use crate::ledger::transaction::{patterns, AccountFlag};
    use crate::traits::PermissiveValidator;
    use crate::utils::memory_ledger::MemoryLedger;

    fn aud() -> CurrencyCode {
        CurrencyCode::new("AUD").unwrap()
    }

    async fn setup() -> (Arc<MemoryLedger>, LedgerActions<MemoryLedger>, Wallet, Wallet) {
        let ledger = Arc::new(MemoryLedger::new());
        let actions = LedgerActions::new(ledger.clone());
        let issuer = ledger.generate_funded_wallet().await.unwrap();
        let holder = ledger.generate_funded_wallet().await.unwrap();
        (ledger, actions, issuer, holder)
    }

    #[tokio::test]
    async fn test_overspend_rejected_without_submission() {
        let (ledger, actions, sender, receiver) = setup().await;

        let intent =
            patterns::xrp_payment(receiver.address.clone(), &BigDecimal::from(1_000)).unwrap();
        let outcome = actions.execute(&sender, intent).await;

        assert!(matches!(
            outcome,
            ActionOutcome::Rejected(Precondition::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_overspend_reaches_ledger_when_preflight_skipped() {
        let (ledger, _, sender, receiver) = setup().await;
        let actions = LedgerActions::with_policy(
            ledger.clone(),
            Box::new(PermissiveValidator),
            PreflightPolicy::Skip,
        );

        let intent =
            patterns::xrp_payment(receiver.address.clone(), &BigDecimal::from(1_000)).unwrap();
        let outcome = actions.execute(&sender, intent).await;

        assert_eq!(
            outcome,
            ActionOutcome::FailedByLedger {
                hash: outcome.hash().map(str::to_string),
                code: "tecUNFUNDED_PAYMENT".to_string(),
            }
        );
        assert_eq!(ledger.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_xrp_payment_succeeds() {
        let (ledger, actions, sender, receiver) = setup().await;

        let intent = patterns::xrp_payment(receiver.address.clone(), &BigDecimal::from(5)).unwrap();
        let outcome = actions.execute(&sender, intent).await;

        assert!(outcome.is_success(), "{}", outcome);
        let received = ledger.account_info(&receiver.address).await.unwrap();
        assert_eq!(received.balance, Drops(105_000_000));
    }

    #[tokio::test]
    async fn test_token_payment_needs_trust_line() {
        let (ledger, actions, issuer, holder) = setup().await;

        let intent = patterns::token_payment(
            holder.address.clone(),
            aud(),
            issuer.address.clone(),
            BigDecimal::from(100),
        );
        let outcome = actions.execute(&issuer, intent.clone()).await;
        assert!(matches!(
            outcome,
            ActionOutcome::Rejected(Precondition::MissingTrustLine { .. })
        ));
        assert_eq!(ledger.submission_count(), 0);

        let trust = patterns::trust_line(aud(), issuer.address.clone(), BigDecimal::from(50));
        assert!(actions.execute(&holder, trust).await.is_success());

        let outcome = actions.execute(&issuer, intent).await;
        assert!(matches!(
            outcome,
            ActionOutcome::Rejected(Precondition::TrustLimitExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_offer_for_unauthorized_currency_never_submits() {
        let (ledger, actions, issuer, holder) = setup().await;

        assert!(actions
            .execute(&issuer, patterns::set_flag(AccountFlag::RequireAuth))
            .await
            .is_success());
        let trust = patterns::trust_line(aud(), issuer.address.clone(), BigDecimal::from(1000));
        assert!(actions.execute(&holder, trust).await.is_success());
        let submitted = ledger.submission_count();

        let offer = patterns::offer(
            Amount::xrp(&BigDecimal::from(10)).unwrap(),
            Amount::issued(aud(), issuer.address.clone(), BigDecimal::from(20)),
        );
        let outcome = actions.execute(&holder, offer.clone()).await;

        assert!(matches!(
            outcome,
            ActionOutcome::Rejected(Precondition::Unauthorized { .. })
        ));
        assert_eq!(ledger.submission_count(), submitted);

        let approve = patterns::authorize_holder(aud(), holder.address.clone());
        assert!(actions.execute(&issuer, approve).await.is_success());
        assert!(actions.execute(&holder, offer).await.is_success());
    }

    #[tokio::test]
    async fn test_network_failure_is_submission_error() {
        let (ledger, actions, sender, receiver) = setup().await;
        ledger.fail_next_submission("connection reset");

        let intent = patterns::xrp_payment(receiver.address.clone(), &BigDecimal::from(1)).unwrap();
        let outcome = actions.execute(&sender, intent).await;

        match outcome {
            ActionOutcome::SubmissionError { message } => {
                assert!(message.contains("connection reset"))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_partially_funded_offer_is_submitted() {
        let (ledger, actions, issuer, holder) = setup().await;
        let trust = patterns::trust_line(aud(), issuer.address.clone(), BigDecimal::from(1000));
        assert!(actions.execute(&holder, trust).await.is_success());

        // Nothing held yet: the ledger would answer tecUNFUNDED_OFFER
        let offer = patterns::offer(
            Amount::issued(aud(), issuer.address.clone(), BigDecimal::from(100)),
            Amount::xrp(&BigDecimal::from(10)).unwrap(),
        );
        let submitted = ledger.submission_count();
        assert!(matches!(
            actions.execute(&holder, offer.clone()).await,
            ActionOutcome::Rejected(Precondition::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.submission_count(), submitted);

        let issue = patterns::token_payment(
            holder.address.clone(),
            aud(),
            issuer.address.clone(),
            BigDecimal::from(40),
        );
        assert!(actions.execute(&issuer, issue).await.is_success());

        // 40 held against 100 offered
        let outcome = actions.execute(&holder, offer).await;
        assert!(outcome.is_success(), "{}", outcome);
        assert_eq!(ledger.offers_of(&holder.address).unwrap().len(), 1);

        // Offering more XRP than the balance is also partially funded
        let big = patterns::offer(
            Amount::xrp(&BigDecimal::from(1_000)).unwrap(),
            Amount::issued(aud(), issuer.address.clone(), BigDecimal::from(5)),
        );
        let outcome = actions.execute(&holder, big).await;
        assert!(outcome.is_success(), "{}", outcome);
    }
}
