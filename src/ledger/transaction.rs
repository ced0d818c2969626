//! Typed intents and the transaction requests built from them

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::amount::{Amount, IssuedAmount};
use crate::types::*;

/// Highest NFT transfer fee the ledger accepts (50%)
pub const MAX_TRANSFER_FEE: u32 = 50_000;

/// `NFTokenMint`: the token may be transferred between third parties
pub const TF_TRANSFERABLE: u32 = 0x0000_0008;

/// `NFTokenCreateOffer`: the offer sells the token
pub const TF_SELL_NFTOKEN: u32 = 0x0000_0001;

/// `TrustSet`: the issuer authorizes the holder's line
pub const TF_SETF_AUTH: u32 = 0x0001_0000;

/// Account settings that can be toggled with `AccountSet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountFlag {
    /// Incoming payments must carry a destination tag
    RequireDest,
    /// Holders need authorization before they can hold this account's tokens
    RequireAuth,
    /// Ask senders not to send XRP
    DisallowXrp,
    /// Trust lines to this account ripple by default (issuers want this)
    DefaultRipple,
}

impl AccountFlag {
    /// `asf*` value used in `SetFlag`/`ClearFlag`
    pub fn code(self) -> u32 {
        match self {
            AccountFlag::RequireDest => 1,
            AccountFlag::RequireAuth => 2,
            AccountFlag::DisallowXrp => 3,
            AccountFlag::DefaultRipple => 8,
        }
    }

    /// Matching `lsf*` bit on the account root
    pub fn ledger_flag(self) -> u32 {
        match self {
            AccountFlag::RequireDest => 0x0002_0000,
            AccountFlag::RequireAuth => AccountInfo::LSF_REQUIRE_AUTH,
            AccountFlag::DisallowXrp => 0x0008_0000,
            AccountFlag::DefaultRipple => AccountInfo::LSF_DEFAULT_RIPPLE,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(AccountFlag::RequireDest),
            2 => Some(AccountFlag::RequireAuth),
            3 => Some(AccountFlag::DisallowXrp),
            8 => Some(AccountFlag::DefaultRipple),
            _ => None,
        }
    }
}

/// What an account wants the ledger to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    /// Send XRP or an issued currency
    Payment {
        destination: Address,
        amount: Amount,
    },
    /// Open or change a trust line; with `authorize`, an issuer approves a holder
    TrustSet {
        limit: IssuedAmount,
        authorize: bool,
    },
    /// Standing exchange order: give `pay`, receive `get`
    OfferCreate { pay: Amount, get: Amount },
    /// Mint an NFT
    NftMint {
        uri: String,
        taxon: u32,
        transfer_fee: u32,
        flags: u32,
    },
    /// Offer an owned NFT for sale
    NftSellOffer {
        nftoken_id: String,
        amount: Amount,
        destination: Option<Address>,
    },
    /// Change an account setting
    AccountSet {
        set: Option<AccountFlag>,
        clear: Option<AccountFlag>,
    },
}

impl Intent {
    /// Ledger transaction type this intent becomes
    pub fn transaction_type(&self) -> &'static str {
        match self {
            Intent::Payment { .. } => "Payment",
            Intent::TrustSet { .. } => "TrustSet",
            Intent::OfferCreate { .. } => "OfferCreate",
            Intent::NftMint { .. } => "NFTokenMint",
            Intent::NftSellOffer { .. } => "NFTokenCreateOffer",
            Intent::AccountSet { .. } => "AccountSet",
        }
    }
}

/// Request object submitted on behalf of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub account: Address,
    pub intent: Intent,
    /// Set by the submitting client so the wait is bounded
    pub last_ledger_sequence: Option<u32>,
}

impl Transaction {
    pub fn new(account: Address, intent: Intent) -> Self {
        Self {
            account,
            intent,
            last_ledger_sequence: None,
        }
    }

    pub fn with_last_ledger_sequence(mut self, sequence: u32) -> Self {
        self.last_ledger_sequence = Some(sequence);
        self
    }

    pub fn transaction_type(&self) -> &'static str {
        self.intent.transaction_type()
    }

    /// `tx_json` body. Fee, Sequence and signing fields are left to the signer.
    pub fn to_json(&self) -> Value {
        let mut tx = Map::new();
        tx.insert("TransactionType".into(), json!(self.transaction_type()));
        tx.insert("Account".into(), json!(self.account.as_str()));

        match &self.intent {
            Intent::Payment {
                destination,
                amount,
            } => {
                tx.insert("Destination".into(), json!(destination.as_str()));
                tx.insert("Amount".into(), amount.to_json());
            }
            Intent::TrustSet { limit, authorize } => {
                tx.insert(
                    "LimitAmount".into(),
                    Amount::Issued(limit.clone()).to_json(),
                );
                if *authorize {
                    tx.insert("Flags".into(), json!(TF_SETF_AUTH));
                }
            }
            Intent::OfferCreate { pay, get } => {
                // The taker pays what the owner gets, and vice versa
                tx.insert("TakerPays".into(), get.to_json());
                tx.insert("TakerGets".into(), pay.to_json());
            }
            Intent::NftMint {
                uri,
                taxon,
                transfer_fee,
                flags,
            } => {
                tx.insert("NFTokenTaxon".into(), json!(taxon));
                tx.insert("URI".into(), json!(uri));
                if *transfer_fee > 0 {
                    tx.insert("TransferFee".into(), json!(transfer_fee));
                }
                tx.insert("Flags".into(), json!(flags));
            }
            Intent::NftSellOffer {
                nftoken_id,
                amount,
                destination,
            } => {
                tx.insert("NFTokenID".into(), json!(nftoken_id));
                tx.insert("Amount".into(), amount.to_json());
                tx.insert("Flags".into(), json!(TF_SELL_NFTOKEN));
                if let Some(destination) = destination {
                    tx.insert("Destination".into(), json!(destination.as_str()));
                }
            }
            Intent::AccountSet { set, clear } => {
                if let Some(flag) = set {
                    tx.insert("SetFlag".into(), json!(flag.code()));
                }
                if let Some(flag) = clear {
                    tx.insert("ClearFlag".into(), json!(flag.code()));
                }
            }
        }

        if let Some(sequence) = self.last_ledger_sequence {
            tx.insert("LastLedgerSequence".into(), json!(sequence));
        }

        Value::Object(tx)
    }
}

/// Common intent shapes
pub mod patterns {
    use super::*;
    use crate::amount::CurrencyCode;

    /// Native payment of an XRP amount
    pub fn xrp_payment(destination: Address, xrp: &BigDecimal) -> LedgerResult<Intent> {
        Ok(Intent::Payment {
            destination,
            amount: Amount::xrp(xrp)?,
        })
    }

    /// Payment of an issued currency
    pub fn token_payment(
        destination: Address,
        currency: CurrencyCode,
        issuer: Address,
        value: BigDecimal,
    ) -> Intent {
        Intent::Payment {
            destination,
            amount: Amount::issued(currency, issuer, value),
        }
    }

    /// Trust line willing to hold up to `limit` of the issuer's currency
    pub fn trust_line(currency: CurrencyCode, issuer: Address, limit: BigDecimal) -> Intent {
        Intent::TrustSet {
            limit: IssuedAmount::new(currency, issuer, limit),
            authorize: false,
        }
    }

    /// Issuer-side authorization of a holder's line
    pub fn authorize_holder(currency: CurrencyCode, holder: Address) -> Intent {
        Intent::TrustSet {
            limit: IssuedAmount::new(currency, holder, BigDecimal::from(0)),
            authorize: true,
        }
    }

    /// Transferable NFT with taxon 0; royalties above the maximum are capped
    pub fn transferable_nft(uri: String, royalty: u32) -> Intent {
        Intent::NftMint {
            uri,
            taxon: 0,
            transfer_fee: royalty.min(MAX_TRANSFER_FEE),
            flags: TF_TRANSFERABLE,
        }
    }

    /// Sell offer for an NFT priced in XRP
    pub fn nft_sell_offer(
        nftoken_id: String,
        xrp: &BigDecimal,
        destination: Option<Address>,
    ) -> LedgerResult<Intent> {
        Ok(Intent::NftSellOffer {
            nftoken_id,
            amount: Amount::xrp(xrp)?,
            destination,
        })
    }

    /// Exchange order giving `pay` for `get`
    pub fn offer(pay: Amount, get: Amount) -> Intent {
        Intent::OfferCreate { pay, get }
    }

    pub fn set_flag(flag: AccountFlag) -> Intent {
        Intent::AccountSet {
            set: Some(flag),
            clear: None,
        }
    }

    pub fn clear_flag(flag: AccountFlag) -> Intent {
        Intent::AccountSet {
            set: None,
            clear: Some(flag),
        }
    }
}
