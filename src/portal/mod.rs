//! Service layer behind the account portal forms
//!
//! Each method corresponds to one form: register, upload an image to mint,
//! list an NFT for sale, and the dashboard. Routing and rendering are left to
//! whatever web framework hosts it.

pub mod records;

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PortalConfig;
use crate::ledger::{Holdings, XrpAccount};
use crate::registry::AccountRegistry;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::sanitize_filename;
use records::{NewNft, NftRecord, UserRecord};

/// Everything the dashboard page shows for one user
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub user: UserRecord,
    pub nfts: Vec<NftRecord>,
    /// `None` when the user's account is not loaded in this process
    pub holdings: Option<Holdings>,
}

pub struct Portal<C: LedgerClient, D: UserDirectory> {
    registry: AccountRegistry<C>,
    directory: Arc<D>,
    config: PortalConfig,
}

impl<C: LedgerClient, D: UserDirectory> Portal<C, D> {
    pub fn new(registry: AccountRegistry<C>, directory: Arc<D>, config: PortalConfig) -> Self {
        Self {
            registry,
            directory,
            config,
        }
    }

    pub fn registry(&self) -> &AccountRegistry<C> {
        &self.registry
    }

    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Create the account for `phone` and its user row, or return the
    /// existing user.
    ///
    /// A known user is bound to the wallet stored in its row. When that
    /// wallet is not loaded in the registry this fails with
    /// `AccountNotFound` instead of funding a second wallet; use
    /// [`restore_wallet`](Self::restore_wallet) to load it again.
    pub async fn register(&self, phone: &str, username: &str) -> LedgerResult<UserRecord> {
        if let Some(user) = self.directory.find_user_by_phone(phone).await? {
            self.account_for(&user)?;
            return Ok(user);
        }

        let account = self.registry.register(phone, username).await?;
        let user = self.directory.insert_user(phone, account.address()).await?;
        info!("Registered user {} with wallet {}", user.id, user.wallet_address);
        Ok(user)
    }

    /// Load a registered user's wallet back into the registry
    pub async fn restore_wallet(
        &self,
        phone: &str,
        username: &str,
        wallet: Wallet,
    ) -> LedgerResult<Arc<XrpAccount<C>>> {
        let user = self.find_user(phone).await?;
        if wallet.address != user.wallet_address {
            return Err(LedgerError::Validation(format!(
                "Wallet {} does not belong to user {}",
                wallet.address, user.id
            )));
        }

        if let Some(account) = self.registry.by_address(&user.wallet_address)? {
            return Ok(account);
        }

        let account = XrpAccount::from_wallet(username, wallet, self.registry.actions().clone());
        let account = self.registry.insert(phone, account)?;
        info!("Restored wallet {} for user {}", user.wallet_address, user.id);
        Ok(account)
    }

    /// Save an uploaded image and mint an NFT for it
    ///
    /// The NFT is minted by the wallet stored for the user. Nothing is written
    /// or submitted when that wallet is not loaded.
    pub async fn upload_and_mint(
        &self,
        phone: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> LedgerResult<NftRecord> {
        let user = self.find_user(phone).await?;
        let account = self.account_for(&user)?;

        let file_name = sanitize_filename(file_name)
            .ok_or_else(|| LedgerError::Validation(format!("Invalid file name '{}'", file_name)))?;

        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        let stored_name = format!("{}-{}-{}", user.id, Uuid::new_v4().simple(), file_name);
        let image_path: PathBuf = self.config.upload_dir.join(stored_name);
        tokio::fs::write(&image_path, bytes).await?;

        let outcome = account.mint_nft(self.config.default_royalty).await?;
        let response = match outcome.response() {
            Some(response) => response,
            None => {
                if let Err(e) = tokio::fs::remove_file(&image_path).await {
                    warn!("Could not remove {}: {}", image_path.display(), e);
                }
                return Err(LedgerError::ActionFailed(outcome.message()));
            }
        };

        let record = self
            .directory
            .insert_nft(NewNft {
                user_id: user.id,
                image_path: image_path.to_string_lossy().into_owned(),
                uri: account.nft_uri().to_string(),
                nftoken_id: response.nftoken_id.clone(),
            })
            .await?;
        info!("Minted NFT {} for user {}", record.public_id(), user.id);
        Ok(record)
    }

    /// List a recorded NFT for sale by its owner
    pub async fn create_nft_offer(
        &self,
        nft_id: &str,
        xrp: &BigDecimal,
    ) -> LedgerResult<ActionOutcome> {
        let nft = self
            .directory
            .find_nft(nft_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("NFT {}", nft_id)))?;

        let owner = self
            .directory
            .get_user(nft.user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", nft.user_id)))?;

        let account = self.account_for(&owner)?;

        let nftoken_id = nft.nftoken_id.as_deref().ok_or_else(|| {
            LedgerError::Validation(format!("NFT {} has no ledger id", nft.public_id()))
        })?;

        account.create_nft_sell_offer(nftoken_id, xrp, None).await
    }

    pub async fn dashboard(&self, phone: &str) -> LedgerResult<Dashboard> {
        let user = self.find_user(phone).await?;
        let nfts = self.directory.list_nfts_for_user(user.id).await?;

        let holdings = match self.registry.by_address(&user.wallet_address)? {
            Some(account) => Some(self.registry.describe_holdings(&account).await?),
            None => None,
        };

        Ok(Dashboard {
            user,
            nfts,
            holdings,
        })
    }

    async fn find_user(&self, phone: &str) -> LedgerResult<UserRecord> {
        self.directory
            .find_user_by_phone(phone)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user with phone {}", phone)))
    }

    /// The loaded account holding the user's stored wallet
    fn account_for(&self, user: &UserRecord) -> LedgerResult<Arc<XrpAccount<C>>> {
        self.registry
            .by_address(&user.wallet_address)?
            .ok_or_else(|| LedgerError::AccountNotFound(user.wallet_address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerActions;
    use crate::utils::{MemoryDirectory, MemoryLedger};

    fn portal(dir: &std::path::Path) -> (Arc<MemoryLedger>, Portal<MemoryLedger, MemoryDirectory>) {
        let ledger = Arc::new(MemoryLedger::new());
        let registry = AccountRegistry::new(Arc::new(LedgerActions::new(ledger.clone())));
        let portal = Portal::new(
            registry,
            Arc::new(MemoryDirectory::new()),
            PortalConfig::with_upload_dir(dir.join("uploads")),
        );
        (ledger, portal)
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (_, portal) = portal(dir.path());

        let first = portal.register("0825550101", "Thandi").await.unwrap();
        let second = portal.register("0825550101", "Thandi").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(portal.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_saves_file_and_records_nft() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, portal) = portal(dir.path());
        let user = portal.register("0825550101", "Thandi").await.unwrap();

        let nft = portal
            .upload_and_mint("0825550101", "../../my cat.png", b"png-bytes")
            .await
            .unwrap();

        let stored = std::path::Path::new(&nft.image_path);
        assert_eq!(stored.parent(), Some(dir.path().join("uploads").as_path()));
        assert!(nft.image_path.ends_with("-my_cat.png"));
        assert_eq!(std::fs::read(stored).unwrap(), b"png-bytes");
        assert_eq!(nft.user_id, user.id);

        let minted = ledger.nfts_of(&user.wallet_address).unwrap();
        assert_eq!(minted.len(), 1);
        assert_eq!(nft.nftoken_id.as_deref(), Some(minted[0].id.as_str()));
        assert_eq!(minted[0].transfer_fee, 1000);
    }

    #[tokio::test]
    async fn test_upload_requires_registered_user() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, portal) = portal(dir.path());

        let result = portal.upload_and_mint("0825550199", "cat.png", b"x").await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
        assert_eq!(ledger.submission_count(), 0);
        assert!(!dir.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn test_offer_for_recorded_nft() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, portal) = portal(dir.path());
        let user = portal.register("0825550101", "Thandi").await.unwrap();
        let nft = portal
            .upload_and_mint("0825550101", "cat.png", b"x")
            .await
            .unwrap();

        let outcome = portal
            .create_nft_offer(nft.public_id(), &BigDecimal::from(25))
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(ledger.nft_offers_of(&user.wallet_address).unwrap().len(), 1);

        assert!(matches!(
            portal.create_nft_offer("missing", &BigDecimal::from(1)).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dashboard_lists_nfts_and_holdings() {
        let dir = tempfile::tempdir().unwrap();
        let (_, portal) = portal(dir.path());
        portal.register("0825550101", "Thandi").await.unwrap();
        portal
            .upload_and_mint("0825550101", "cat.png", b"x")
            .await
            .unwrap();

        let dashboard = portal.dashboard("0825550101").await.unwrap();
        assert_eq!(dashboard.nfts.len(), 1);
        let holdings = dashboard.holdings.unwrap();
        assert_eq!(holdings.owner, "Thandi");
        assert!(holdings.xrp < BigDecimal::from(100));
        assert!(holdings.tokens.is_empty());
    }

    #[tokio::test]
    async fn test_same_file_name_keeps_both_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let (_, portal) = portal(dir.path());
        portal.register("0825550101", "Thandi").await.unwrap();
        portal.register("0825550102", "Pieter").await.unwrap();

        let first = portal
            .upload_and_mint("0825550101", "cat.png", b"first")
            .await
            .unwrap();
        let second = portal
            .upload_and_mint("0825550101", "cat.png", b"second")
            .await
            .unwrap();
        let other = portal
            .upload_and_mint("0825550102", "cat.png", b"other")
            .await
            .unwrap();

        assert_ne!(first.image_path, second.image_path);
        assert_ne!(first.image_path, other.image_path);
        assert_eq!(std::fs::read(&first.image_path).unwrap(), b"first");
        assert_eq!(std::fs::read(&second.image_path).unwrap(), b"second");
        assert_eq!(std::fs::read(&other.image_path).unwrap(), b"other");
    }

    #[tokio::test]
    async fn test_unloaded_wallet_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, portal) = portal(dir.path());
        let user = portal.register("0825550101", "Thandi").await.unwrap();
        let wallet = portal
            .registry()
            .by_address(&user.wallet_address)
            .unwrap()
            .unwrap()
            .wallet()
            .clone();

        portal.registry().clear().unwrap();

        let upload = portal.upload_and_mint("0825550101", "cat.png", b"x").await;
        assert!(matches!(upload, Err(LedgerError::AccountNotFound(ref a)) if a == user.wallet_address.as_str()));
        assert!(!dir.path().join("uploads").exists());
        assert_eq!(ledger.submission_count(), 0);
        assert!(portal.directory().list_nfts_for_user(user.id).await.unwrap().is_empty());

        let again = portal.register("0825550101", "Thandi").await;
        assert!(matches!(again, Err(LedgerError::AccountNotFound(_))));
        assert!(portal.registry().is_empty());

        let dashboard = portal.dashboard("0825550101").await.unwrap();
        assert!(dashboard.holdings.is_none());

        // A stranger's wallet is refused, the stored one is loaded back
        let stranger = ledger.generate_funded_wallet().await.unwrap();
        assert!(matches!(
            portal.restore_wallet("0825550101", "Thandi", stranger).await,
            Err(LedgerError::Validation(_))
        ));
        let restored = portal
            .restore_wallet("0825550101", "Thandi", wallet)
            .await
            .unwrap();
        assert_eq!(restored.address(), &user.wallet_address);

        let nft = portal
            .upload_and_mint("0825550101", "cat.png", b"x")
            .await
            .unwrap();
        assert_eq!(nft.user_id, user.id);
        assert_eq!(ledger.nfts_of(&user.wallet_address).unwrap().len(), 1);
        assert_eq!(portal.register("0825550101", "Thandi").await.unwrap(), user);
    }
}
