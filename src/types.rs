//! Core types shared by the ledger client, the action wrapper and the portal

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::{AmountError, CurrencyCode, Drops};

/// Classic account address on the ledger (`r...`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and validate a classic address
    pub fn parse(address: &str) -> LedgerResult<Self> {
        crate::utils::validation::validate_classic_address(address)?;
        Ok(Self(address.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Credentials of a funded account
#[derive(Clone)]
pub struct Wallet {
    /// Classic address of the account
    pub address: Address,
    /// Encoded family seed the account's keys derive from
    seed: String,
    /// Hex public key, when the generator reported one
    pub public_key: Option<String>,
}

impl Wallet {
    pub fn new(address: Address, seed: String, public_key: Option<String>) -> Self {
        Self {
            address,
            seed,
            public_key,
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("seed", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Account root data as reported by the validated ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: Address,
    pub balance: Drops,
    pub sequence: u32,
    /// Ledger-object flags (`lsf*`)
    pub flags: u32,
}

impl AccountInfo {
    /// Issuer requires holders' trust lines to be authorized
    pub const LSF_REQUIRE_AUTH: u32 = 0x0004_0000;
    /// Issuer's trust lines ripple by default
    pub const LSF_DEFAULT_RIPPLE: u32 = 0x0080_0000;

    pub fn requires_auth(&self) -> bool {
        self.flags & Self::LSF_REQUIRE_AUTH != 0
    }

    pub fn xrp_balance(&self) -> BigDecimal {
        self.balance.to_xrp()
    }
}

/// One trust line, seen from the account whose lines were listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustLine {
    /// Counterparty of the line (the issuer, from a holder's point of view)
    pub peer: Address,
    pub currency: CurrencyCode,
    /// Positive when this account holds the peer's currency
    pub balance: BigDecimal,
    /// Limit this account set on the line
    pub limit: BigDecimal,
    /// Limit the peer set on the line
    pub limit_peer: BigDecimal,
    /// This account has authorized the peer to hold its currency
    pub authorized: bool,
    /// The peer has authorized this account to hold the peer's currency
    pub peer_authorized: bool,
}

impl TrustLine {
    /// Headroom left before the line's limit is reached
    pub fn remaining_limit(&self) -> BigDecimal {
        &self.limit - &self.balance
    }
}

/// Result of a reliable submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub hash: String,
    /// Engine result code (`tesSUCCESS`, `tecUNFUNDED_PAYMENT`, ...)
    pub result_code: String,
    pub validated: bool,
    pub ledger_index: Option<u32>,
    /// Id of a freshly minted NFT
    pub nftoken_id: Option<String>,
    /// Id of a freshly created NFT offer
    pub offer_id: Option<String>,
}

impl SubmitResponse {
    pub fn is_successful(&self) -> bool {
        self.validated && self.result_code == "tesSUCCESS"
    }
}

/// Status of a transaction looked up by hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub hash: String,
    pub validated: bool,
    pub result_code: Option<String>,
    pub ledger_index: Option<u32>,
}

/// A local check that stopped an action before it reached the network
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Precondition {
    #[error("Sorry. You are sending more than you have: balance {available}, requested {requested}. Try lowering the amount.")]
    InsufficientBalance {
        available: String,
        requested: String,
    },
    #[error("{holder} has no trust line for {currency} issued by {issuer}")]
    MissingTrustLine {
        holder: Address,
        currency: CurrencyCode,
        issuer: Address,
    },
    #[error("{holder} is not authorized to hold {currency} issued by {issuer}")]
    Unauthorized {
        holder: Address,
        currency: CurrencyCode,
        issuer: Address,
    },
    #[error("Trust line limit exceeded: remaining {remaining}, requested {requested}")]
    TrustLimitExceeded { remaining: String, requested: String },
    #[error("Invalid request: {0}")]
    Invalid(String),
}

/// Outcome of a ledger action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Validated with `tesSUCCESS`
    Succeeded(SubmitResponse),
    /// The ledger answered with a non-success result code
    FailedByLedger {
        hash: Option<String>,
        code: String,
    },
    /// Network, RPC or timeout failure; the transaction's fate is unknown
    SubmissionError { message: String },
    /// Stopped locally; nothing was submitted
    Rejected(Precondition),
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded(_))
    }

    /// Whether a request reached the network
    pub fn was_submitted(&self) -> bool {
        !matches!(self, ActionOutcome::Rejected(_))
    }

    pub fn response(&self) -> Option<&SubmitResponse> {
        match self {
            ActionOutcome::Succeeded(response) => Some(response),
            _ => None,
        }
    }

    pub fn hash(&self) -> Option<&str> {
        match self {
            ActionOutcome::Succeeded(response) => Some(&response.hash),
            ActionOutcome::FailedByLedger { hash, .. } => hash.as_deref(),
            _ => None,
        }
    }

    /// Human-readable status line
    pub fn message(&self) -> String {
        match self {
            ActionOutcome::Succeeded(response) => {
                format!("Transaction {} validated: tesSUCCESS", response.hash)
            }
            ActionOutcome::FailedByLedger { code, .. } => {
                format!("Transaction failed on ledger: {}", code)
            }
            ActionOutcome::SubmissionError { message } => format!("Submit failed: {}", message),
            ActionOutcome::Rejected(reason) => reason.to_string(),
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Errors that can occur while talking to the ledger or the local stores
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: String, message: String },
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    InvalidAmount(#[from] AmountError),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Action failed: {0}")]
    ActionFailed(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
