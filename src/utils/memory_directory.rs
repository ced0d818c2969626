//! In-memory user directory for testing and development

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::portal::records::{NewNft, NftRecord, UserRecord};
use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct DirectoryState {
    users: HashMap<u64, UserRecord>,
    nfts: HashMap<u64, NftRecord>,
    next_user_id: u64,
    next_nft_id: u64,
}

/// In-memory users and NFTs
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl MemoryDirectory {
    /// Create a new, empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        let mut state = self.write()?;
        state.users.clear();
        state.nfts.clear();
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, DirectoryState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("directory lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, DirectoryState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("directory lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_user_by_phone(&self, phone: &str) -> LedgerResult<Option<UserRecord>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|user| user.phone == phone)
            .cloned())
    }

    async fn get_user(&self, user_id: u64) -> LedgerResult<Option<UserRecord>> {
        Ok(self.read()?.users.get(&user_id).cloned())
    }

    async fn insert_user(
        &self,
        phone: &str,
        wallet_address: &Address,
    ) -> LedgerResult<UserRecord> {
        let mut state = self.write()?;
        if state.users.values().any(|user| user.phone == phone) {
            return Err(LedgerError::Validation(format!(
                "User with phone '{}' already exists",
                phone
            )));
        }

        state.next_user_id += 1;
        let user = UserRecord {
            id: state.next_user_id,
            phone: phone.to_string(),
            wallet_address: wallet_address.clone(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn insert_nft(&self, nft: NewNft) -> LedgerResult<NftRecord> {
        let mut state = self.write()?;
        if !state.users.contains_key(&nft.user_id) {
            return Err(LedgerError::NotFound(format!("user {}", nft.user_id)));
        }

        state.next_nft_id += 1;
        let record = NftRecord {
            id: state.next_nft_id,
            user_id: nft.user_id,
            image_path: nft.image_path,
            uri: nft.uri,
            nftoken_id: nft.nftoken_id,
            created_at: chrono::Utc::now().naive_utc(),
        };
        state.nfts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_nft(&self, nft_id: &str) -> LedgerResult<Option<NftRecord>> {
        Ok(self
            .read()?
            .nfts
            .values()
            .find(|nft| nft.nftoken_id.as_deref() == Some(nft_id) || nft.uri == nft_id)
            .cloned())
    }

    async fn list_nfts_for_user(&self, user_id: u64) -> LedgerResult<Vec<NftRecord>> {
        let mut nfts: Vec<NftRecord> = self
            .read()?
            .nfts
            .values()
            .filter(|nft| nft.user_id == user_id)
            .cloned()
            .collect();
        nfts.sort_by_key(|nft| nft.id);
        Ok(nfts)
    }
}
