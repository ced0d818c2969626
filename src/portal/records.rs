//! Rows kept by a [`UserDirectory`](crate::traits::UserDirectory)

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// A registered portal user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    /// Phone number; unique across users
    pub phone: String,
    pub wallet_address: Address,
    pub created_at: NaiveDateTime,
}

/// NFT about to be recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNft {
    pub user_id: u64,
    pub image_path: String,
    /// Hex URI the token was minted with
    pub uri: String,
    /// Ledger id of the minted token, when the ledger reported one
    pub nftoken_id: Option<String>,
}

/// A minted NFT and the image it was minted for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftRecord {
    pub id: u64,
    pub user_id: u64,
    pub image_path: String,
    pub uri: String,
    pub nftoken_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl NftRecord {
    /// Identifier shown to users: the ledger id when known, otherwise the URI
    pub fn public_id(&self) -> &str {
        self.nftoken_id.as_deref().unwrap_or(&self.uri)
    }
}
