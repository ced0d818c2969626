//! In-memory ledger simulator for testing and development

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

use crate::amount::{Amount, CurrencyCode, Drops, IssuedAmount, DROPS_PER_XRP};
use crate::ledger::transaction::{Intent, Transaction, MAX_TRANSFER_FEE, TF_TRANSFERABLE};
use crate::signing::generate_wallet;
use crate::traits::*;
use crate::types::*;

/// Fee charged for every applied transaction, in drops
pub const BASE_FEE: u64 = 12;

/// Starting balance of faucet-funded accounts (100 XRP)
pub const DEFAULT_FAUCET_DROPS: u64 = 100 * DROPS_PER_XRP;

#[derive(Debug, Clone)]
struct AccountRoot {
    balance: u64,
    sequence: u32,
    flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LineKey {
    holder: Address,
    issuer: Address,
    currency: CurrencyCode,
}

#[derive(Debug, Clone)]
struct LineState {
    limit: BigDecimal,
    balance: BigDecimal,
    authorized: bool,
}

/// Exchange offer resting on the simulated ledger
#[derive(Debug, Clone, PartialEq)]
pub struct RestingOffer {
    pub owner: Address,
    pub pay: Amount,
    pub get: Amount,
}

/// NFT held on the simulated ledger
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedNft {
    pub id: String,
    pub owner: Address,
    pub uri: String,
    pub transfer_fee: u32,
}

/// NFT sell offer on the simulated ledger
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedNftOffer {
    pub id: String,
    pub owner: Address,
    pub nftoken_id: String,
    pub amount: Amount,
    pub destination: Option<Address>,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<Address, AccountRoot>,
    lines: HashMap<LineKey, LineState>,
    offers: Vec<RestingOffer>,
    nfts: Vec<SimulatedNft>,
    nft_offers: Vec<SimulatedNftOffer>,
    transactions: HashMap<String, TransactionStatus>,
    ledger_index: u32,
    fail_next: Option<String>,
    force_next: Option<String>,
}

/// Result of applying one transaction
struct Applied {
    code: &'static str,
    nftoken_id: Option<String>,
    offer_id: Option<String>,
}

impl Applied {
    fn code(code: &'static str) -> Self {
        Self {
            code,
            nftoken_id: None,
            offer_id: None,
        }
    }
}

/// Ledger simulator implementing [`LedgerClient`]
///
/// Applies payments, trust lines, offers, NFT mints and account settings with
/// the ledger's result codes for the common failure cases. Offers are
/// recorded but never crossed. Every call to `submit_and_wait` is counted.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    submissions: Arc<AtomicUsize>,
    faucet_drops: u64,
}

impl MemoryLedger {
    /// Create an empty ledger whose faucet hands out 100 XRP
    pub fn new() -> Self {
        Self::with_faucet_amount(Drops(DEFAULT_FAUCET_DROPS))
    }

    pub fn with_faucet_amount(amount: Drops) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState {
                ledger_index: 1,
                ..LedgerState::default()
            })),
            submissions: Arc::new(AtomicUsize::new(0)),
            faucet_drops: amount.0,
        }
    }

    /// Number of `submit_and_wait` calls so far
    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Make the next submission fail as if the network dropped it
    pub fn fail_next_submission(&self, message: &str) {
        if let Ok(mut state) = self.state.write() {
            state.fail_next = Some(message.to_string());
        }
    }

    /// Make the next submission come back with the given result code
    pub fn force_next_result(&self, code: &str) {
        if let Ok(mut state) = self.state.write() {
            state.force_next = Some(code.to_string());
        }
    }

    /// Offers resting for an account
    pub fn offers_of(&self, owner: &Address) -> LedgerResult<Vec<RestingOffer>> {
        Ok(self
            .read()?
            .offers
            .iter()
            .filter(|o| &o.owner == owner)
            .cloned()
            .collect())
    }

    /// NFTs owned by an account
    pub fn nfts_of(&self, owner: &Address) -> LedgerResult<Vec<SimulatedNft>> {
        Ok(self
            .read()?
            .nfts
            .iter()
            .filter(|n| &n.owner == owner)
            .cloned()
            .collect())
    }

    /// NFT sell offers created by an account
    pub fn nft_offers_of(&self, owner: &Address) -> LedgerResult<Vec<SimulatedNftOffer>> {
        Ok(self
            .read()?
            .nft_offers
            .iter()
            .filter(|o| &o.owner == owner)
            .cloned()
            .collect())
    }

    /// Remove everything (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        let mut state = self.write()?;
        *state = LedgerState {
            ledger_index: 1,
            ..LedgerState::default()
        };
        self.submissions.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("ledger state lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("ledger state lock poisoned".to_string()))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn random_hash() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
    .to_ascii_uppercase()
}

impl LedgerState {
    fn apply(&mut self, tx: &Transaction) -> Applied {
        let account = &tx.account;
        let Some(root) = self.accounts.get(account) else {
            return Applied::code("terNO_ACCOUNT");
        };
        if root.balance < BASE_FEE {
            return Applied::code("terINSUF_FEE_B");
        }

        let applied = match &tx.intent {
            Intent::Payment {
                destination,
                amount,
            } => self.apply_payment(account, destination, amount),
            Intent::TrustSet { limit, authorize } => self.apply_trust_set(account, limit, *authorize),
            Intent::OfferCreate { pay, get } => self.apply_offer(account, pay, get),
            Intent::NftMint {
                uri,
                transfer_fee,
                flags,
                ..
            } => self.apply_nft_mint(account, uri, *transfer_fee, *flags),
            Intent::NftSellOffer {
                nftoken_id,
                amount,
                destination,
            } => self.apply_nft_offer(account, nftoken_id, amount, destination),
            Intent::AccountSet { set, clear } => {
                if let Some(root) = self.accounts.get_mut(account) {
                    if let Some(flag) = set {
                        root.flags |= flag.ledger_flag();
                    }
                    if let Some(flag) = clear {
                        root.flags &= !flag.ledger_flag();
                    }
                }
                Applied::code("tesSUCCESS")
            }
        };

        // tes and tec results consume the fee and the sequence number
        if applied.code.starts_with("tes") || applied.code.starts_with("tec") {
            if let Some(root) = self.accounts.get_mut(account) {
                root.balance -= BASE_FEE;
                root.sequence += 1;
            }
            self.ledger_index += 1;
        }
        applied
    }

    fn spendable(&self, account: &Address) -> u64 {
        self.accounts
            .get(account)
            .map(|r| r.balance.saturating_sub(BASE_FEE))
            .unwrap_or(0)
    }

    fn requires_auth(&self, issuer: &Address) -> bool {
        self.accounts
            .get(issuer)
            .map(|r| r.flags & AccountInfo::LSF_REQUIRE_AUTH != 0)
            .unwrap_or(false)
    }

    fn apply_payment(&mut self, sender: &Address, destination: &Address, amount: &Amount) -> Applied {
        if sender == destination {
            return Applied::code("temREDUNDANT");
        }
        if !amount.is_positive() {
            return Applied::code("temBAD_AMOUNT");
        }
        if !self.accounts.contains_key(destination) {
            return Applied::code("tecNO_DST");
        }

        match amount {
            Amount::Xrp(drops) => {
                if drops.0 > self.spendable(sender) {
                    return Applied::code("tecUNFUNDED_PAYMENT");
                }
                if let Some(root) = self.accounts.get_mut(sender) {
                    root.balance -= drops.0;
                }
                if let Some(root) = self.accounts.get_mut(destination) {
                    root.balance += drops.0;
                }
                Applied::code("tesSUCCESS")
            }
            Amount::Issued(issued) => self.apply_issued_payment(sender, destination, issued),
        }
    }

    fn apply_issued_payment(
        &mut self,
        sender: &Address,
        destination: &Address,
        issued: &IssuedAmount,
    ) -> Applied {
        let key_for = |holder: &Address| LineKey {
            holder: holder.clone(),
            issuer: issued.issuer.clone(),
            currency: issued.currency.clone(),
        };

        // Debit side
        if sender != &issued.issuer {
            match self.lines.get(&key_for(sender)) {
                None => return Applied::code("tecPATH_DRY"),
                Some(line) if line.balance < issued.value => {
                    return Applied::code("tecPATH_PARTIAL")
                }
                Some(_) => {}
            }
        }

        // Credit side
        if destination != &issued.issuer {
            let requires_auth = self.requires_auth(&issued.issuer);
            match self.lines.get(&key_for(destination)) {
                None => return Applied::code("tecPATH_DRY"),
                Some(line) if requires_auth && !line.authorized => {
                    return Applied::code("tecPATH_DRY")
                }
                Some(line) if &line.balance + &issued.value > line.limit => {
                    return Applied::code("tecPATH_PARTIAL")
                }
                Some(_) => {}
            }
        }

        if sender != &issued.issuer {
            if let Some(line) = self.lines.get_mut(&key_for(sender)) {
                line.balance -= &issued.value;
            }
        }
        if destination != &issued.issuer {
            if let Some(line) = self.lines.get_mut(&key_for(destination)) {
                line.balance += &issued.value;
            }
        }
        Applied::code("tesSUCCESS")
    }

    fn apply_trust_set(&mut self, account: &Address, limit: &IssuedAmount, authorize: bool) -> Applied {
        if &limit.issuer == account {
            return Applied::code("temDST_IS_SRC");
        }
        if !self.accounts.contains_key(&limit.issuer) {
            return Applied::code("tecNO_DST");
        }

        if authorize {
            // The issuer approves the holder named in LimitAmount
            let key = LineKey {
                holder: limit.issuer.clone(),
                issuer: account.clone(),
                currency: limit.currency.clone(),
            };
            self.lines
                .entry(key)
                .or_insert_with(|| LineState {
                    limit: BigDecimal::from(0),
                    balance: BigDecimal::from(0),
                    authorized: false,
                })
                .authorized = true;
            return Applied::code("tesSUCCESS");
        }

        let key = LineKey {
            holder: account.clone(),
            issuer: limit.issuer.clone(),
            currency: limit.currency.clone(),
        };
        self.lines
            .entry(key)
            .and_modify(|line| line.limit = limit.value.clone())
            .or_insert_with(|| LineState {
                limit: limit.value.clone(),
                balance: BigDecimal::from(0),
                authorized: false,
            });
        Applied::code("tesSUCCESS")
    }

    fn apply_offer(&mut self, owner: &Address, pay: &Amount, get: &Amount) -> Applied {
        if !pay.is_positive() || !get.is_positive() {
            return Applied::code("temBAD_OFFER");
        }

        let funded = match pay {
            Amount::Xrp(_) => self.spendable(owner) > 0,
            Amount::Issued(issued) if &issued.issuer == owner => true,
            Amount::Issued(issued) => self
                .lines
                .get(&LineKey {
                    holder: owner.clone(),
                    issuer: issued.issuer.clone(),
                    currency: issued.currency.clone(),
                })
                .map(|line| line.balance > BigDecimal::from(0))
                .unwrap_or(false),
        };
        if !funded {
            return Applied::code("tecUNFUNDED_OFFER");
        }

        if let Amount::Issued(target) = get {
            if &target.issuer != owner && self.requires_auth(&target.issuer) {
                let authorized = self
                    .lines
                    .get(&LineKey {
                        holder: owner.clone(),
                        issuer: target.issuer.clone(),
                        currency: target.currency.clone(),
                    })
                    .map(|line| line.authorized)
                    .unwrap_or(false);
                if !authorized {
                    return Applied::code("tecNO_AUTH");
                }
            }
        }

        self.offers.push(RestingOffer {
            owner: owner.clone(),
            pay: pay.clone(),
            get: get.clone(),
        });
        Applied::code("tesSUCCESS")
    }

    fn apply_nft_mint(&mut self, owner: &Address, uri: &str, transfer_fee: u32, flags: u32) -> Applied {
        if transfer_fee > MAX_TRANSFER_FEE {
            return Applied::code("temBAD_NFTOKEN_TRANSFER_FEE");
        }
        if transfer_fee > 0 && flags & TF_TRANSFERABLE == 0 {
            return Applied::code("temMALFORMED");
        }

        let id = random_hash();
        self.nfts.push(SimulatedNft {
            id: id.clone(),
            owner: owner.clone(),
            uri: uri.to_string(),
            transfer_fee,
        });
        Applied {
            code: "tesSUCCESS",
            nftoken_id: Some(id),
            offer_id: None,
        }
    }

    fn apply_nft_offer(
        &mut self,
        owner: &Address,
        nftoken_id: &str,
        amount: &Amount,
        destination: &Option<Address>,
    ) -> Applied {
        let owned = self
            .nfts
            .iter()
            .any(|n| n.id == nftoken_id && &n.owner == owner);
        if !owned {
            return Applied::code("tecNO_ENTRY");
        }

        let id = random_hash();
        self.nft_offers.push(SimulatedNftOffer {
            id: id.clone(),
            owner: owner.clone(),
            nftoken_id: nftoken_id.to_string(),
            amount: amount.clone(),
            destination: destination.clone(),
        });
        Applied {
            code: "tesSUCCESS",
            nftoken_id: None,
            offer_id: Some(id),
        }
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn generate_funded_wallet(&self) -> LedgerResult<Wallet> {
        let wallet = generate_wallet()?;
        let address = wallet.address.clone();

        self.write()?.accounts.insert(
            address.clone(),
            AccountRoot {
                balance: self.faucet_drops,
                sequence: 1,
                flags: 0,
            },
        );

        debug!("Simulated faucet funded {}", address);
        Ok(wallet)
    }

    async fn account_info(&self, address: &Address) -> LedgerResult<AccountInfo> {
        let state = self.read()?;
        let root = state
            .accounts
            .get(address)
            .ok_or_else(|| LedgerError::AccountNotFound(address.to_string()))?;
        Ok(AccountInfo {
            address: address.clone(),
            balance: Drops(root.balance),
            sequence: root.sequence,
            flags: root.flags,
        })
    }

    async fn account_lines(&self, address: &Address) -> LedgerResult<Vec<TrustLine>> {
        let state = self.read()?;
        if !state.accounts.contains_key(address) {
            return Err(LedgerError::AccountNotFound(address.to_string()));
        }

        let mut lines = Vec::new();
        for (key, line) in &state.lines {
            if &key.holder == address {
                lines.push(TrustLine {
                    peer: key.issuer.clone(),
                    currency: key.currency.clone(),
                    balance: line.balance.clone(),
                    limit: line.limit.clone(),
                    limit_peer: BigDecimal::from(0),
                    authorized: false,
                    peer_authorized: line.authorized,
                });
            } else if &key.issuer == address {
                lines.push(TrustLine {
                    peer: key.holder.clone(),
                    currency: key.currency.clone(),
                    balance: -line.balance.clone(),
                    limit: BigDecimal::from(0),
                    limit_peer: line.limit.clone(),
                    authorized: line.authorized,
                    peer_authorized: false,
                });
            }
        }
        lines.sort_by(|a, b| {
            (a.peer.as_str(), a.currency.as_str()).cmp(&(b.peer.as_str(), b.currency.as_str()))
        });
        Ok(lines)
    }

    async fn submit_and_wait(
        &self,
        transaction: &Transaction,
        _wallet: &Wallet,
    ) -> LedgerResult<SubmitResponse> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let mut state = self.write()?;

        if let Some(message) = state.fail_next.take() {
            return Err(LedgerError::Network(message));
        }

        let hash = random_hash();
        let applied = match state.force_next.take() {
            Some(code) => {
                let validated = !code.starts_with("tem");
                let response = SubmitResponse {
                    hash: hash.clone(),
                    result_code: code,
                    validated,
                    ledger_index: validated.then_some(state.ledger_index),
                    nftoken_id: None,
                    offer_id: None,
                };
                record_status(&mut state, &response);
                return Ok(response);
            }
            None => state.apply(transaction),
        };

        let validated = applied.code.starts_with("tes") || applied.code.starts_with("tec");
        let response = SubmitResponse {
            hash,
            result_code: applied.code.to_string(),
            validated,
            ledger_index: validated.then_some(state.ledger_index),
            nftoken_id: applied.nftoken_id,
            offer_id: applied.offer_id,
        };
        record_status(&mut state, &response);

        debug!(
            "Simulated {} from {}: {}",
            transaction.transaction_type(),
            transaction.account,
            response.result_code
        );
        Ok(response)
    }

    async fn transaction_status(&self, hash: &str) -> LedgerResult<TransactionStatus> {
        self.read()?
            .transactions
            .get(hash)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {}", hash)))
    }
}

fn record_status(state: &mut LedgerState, response: &SubmitResponse) {
    state.transactions.insert(
        response.hash.clone(),
        TransactionStatus {
            hash: response.hash.clone(),
            validated: response.validated,
            result_code: Some(response.result_code.clone()),
            ledger_index: response.ledger_index,
        },
    );
}
