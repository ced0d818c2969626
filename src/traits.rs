//! Traits for the external ledger client, the user store and intent validation

use async_trait::async_trait;

use crate::ledger::transaction::{Intent, Transaction};
use crate::portal::records::{NewNft, NftRecord, UserRecord};
use crate::types::*;

/// Access to the ledger network
///
/// Signing, serialization and transport belong to the implementation. The
/// action wrapper only builds requests and interprets responses, so it works
/// the same against a public node ([`crate::rpc::JsonRpcClient`]) or the
/// in-process simulator ([`crate::utils::MemoryLedger`]).
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Create a new wallet and fund it from the test-network faucet
    async fn generate_funded_wallet(&self) -> LedgerResult<Wallet>;

    /// Account root on the validated ledger
    async fn account_info(&self, address: &Address) -> LedgerResult<AccountInfo>;

    /// All trust lines of an account on the validated ledger
    async fn account_lines(&self, address: &Address) -> LedgerResult<Vec<TrustLine>>;

    /// Sign, submit and wait until the transaction reaches a final outcome.
    ///
    /// `Ok` carries whatever result code the ledger reported, success or not.
    /// `Err` means the outcome is unknown (network failure, timeout).
    async fn submit_and_wait(
        &self,
        transaction: &Transaction,
        wallet: &Wallet,
    ) -> LedgerResult<SubmitResponse>;

    /// Look a transaction up by hash
    async fn transaction_status(&self, hash: &str) -> LedgerResult<TransactionStatus>;
}

/// Storage for portal users and the NFTs they minted
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by phone number
    async fn find_user_by_phone(&self, phone: &str) -> LedgerResult<Option<UserRecord>>;

    /// Get a user by id
    async fn get_user(&self, user_id: u64) -> LedgerResult<Option<UserRecord>>;

    /// Insert a user; phone numbers are unique
    async fn insert_user(&self, phone: &str, wallet_address: &Address)
        -> LedgerResult<UserRecord>;

    /// Record a minted NFT
    async fn insert_nft(&self, nft: NewNft) -> LedgerResult<NftRecord>;

    /// Find an NFT by its ledger id or URI
    async fn find_nft(&self, nft_id: &str) -> LedgerResult<Option<NftRecord>>;

    /// List the NFTs owned by a user
    async fn list_nfts_for_user(&self, user_id: u64) -> LedgerResult<Vec<NftRecord>>;
}

/// Checks on an intent that need no ledger state
pub trait IntentValidator: Send + Sync {
    fn validate_intent(&self, account: &Address, intent: &Intent) -> Result<(), Precondition>;
}

/// Validator that accepts every intent and leaves rejection to the ledger
pub struct PermissiveValidator;

impl IntentValidator for PermissiveValidator {
    fn validate_intent(&self, _account: &Address, _intent: &Intent) -> Result<(), Precondition> {
        Ok(())
    }
}
