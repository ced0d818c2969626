//! Client and portal configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{LedgerError, LedgerResult};

/// Public test network JSON-RPC endpoint
pub const TESTNET_RPC_URL: &str = "https://s.altnet.rippletest.net:51234";

/// Test network faucet
pub const TESTNET_FAUCET_URL: &str = "https://faucet.altnet.rippletest.net/accounts";

/// Whether the action wrapper checks balances and trust lines before submitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreflightPolicy {
    /// Query the ledger and reject locally when a submission cannot succeed
    #[default]
    Enforce,
    /// Submit directly and let the ledger reject
    Skip,
}

impl std::str::FromStr for PreflightPolicy {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" | "on" | "true" => Ok(PreflightPolicy::Enforce),
            "skip" | "off" | "false" => Ok(PreflightPolicy::Skip),
            other => Err(LedgerError::Validation(format!(
                "Unknown preflight policy '{}'. Expected 'enforce' or 'skip'.",
                other
            ))),
        }
    }
}

/// Where transactions are signed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// Sign Ed25519 wallets in process and submit the signed blob
    #[default]
    Local,
    /// Send the seed to the node in sign-and-submit mode. Public servers
    /// refuse this; it needs a node run with signing enabled.
    Server,
}

impl std::str::FromStr for SigningMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(SigningMode::Local),
            "server" => Ok(SigningMode::Server),
            other => Err(LedgerError::Validation(format!(
                "Unknown signing mode '{}'. Expected 'local' or 'server'.",
                other
            ))),
        }
    }
}

/// Settings for talking to the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub faucet_url: String,
    /// Per-request HTTP timeout
    pub request_timeout_ms: u64,
    /// Delay between status polls while waiting for validation
    pub poll_interval_ms: u64,
    /// Upper bound on one reliable submission, including validation
    pub submit_timeout_ms: u64,
    /// `LastLedgerSequence` is set this many ledgers past the current one
    pub ledger_offset: u32,
    pub preflight: PreflightPolicy,
    /// `Local` unless the node is known to sign for clients
    pub signing: SigningMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::testnet()
    }
}

impl ClientConfig {
    /// Defaults for the public test network
    pub fn testnet() -> Self {
        Self {
            rpc_url: TESTNET_RPC_URL.to_string(),
            faucet_url: TESTNET_FAUCET_URL.to_string(),
            request_timeout_ms: 10_000,
            poll_interval_ms: 1_000,
            submit_timeout_ms: 60_000,
            ledger_offset: 20,
            preflight: PreflightPolicy::Enforce,
            signing: SigningMode::Local,
        }
    }

    /// Test network defaults overridden by `XRPL_*` environment variables
    pub fn from_env() -> LedgerResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Test network defaults overridden by whatever `lookup` returns for the
    /// `XRPL_*` names
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> LedgerResult<Self> {
        let mut config = Self::testnet();

        if let Some(url) = lookup("XRPL_RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(url) = lookup("XRPL_FAUCET_URL") {
            config.faucet_url = url;
        }
        if let Some(value) = lookup("XRPL_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_millis("XRPL_REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("XRPL_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_millis("XRPL_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("XRPL_SUBMIT_TIMEOUT_MS") {
            config.submit_timeout_ms = parse_millis("XRPL_SUBMIT_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("XRPL_LEDGER_OFFSET") {
            config.ledger_offset = value.trim().parse().map_err(|_| {
                LedgerError::Validation("XRPL_LEDGER_OFFSET must be a number of ledgers".to_string())
            })?;
        }
        if let Some(value) = lookup("XRPL_PREFLIGHT") {
            config.preflight = value.parse()?;
        }
        if let Some(value) = lookup("XRPL_SIGNING") {
            config.signing = value.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields keep their test network defaults
    pub fn from_json_str(json: &str) -> LedgerResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| LedgerError::Validation(format!("Invalid client config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if !is_http(&self.rpc_url) {
            return Err(LedgerError::Validation(format!(
                "RPC URL '{}' must be http(s)",
                self.rpc_url
            )));
        }
        if !is_http(&self.faucet_url) {
            return Err(LedgerError::Validation(format!(
                "Faucet URL '{}' must be http(s)",
                self.faucet_url
            )));
        }
        if self.ledger_offset == 0 {
            return Err(LedgerError::Validation(
                "Ledger offset must be at least one ledger".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(LedgerError::Validation(
                "Poll interval must be positive".to_string(),
            ));
        }
        if self.submit_timeout_ms < self.poll_interval_ms {
            return Err(LedgerError::Validation(
                "Submit timeout must be at least one poll interval".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

/// Settings for the account portal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Directory uploaded images are written to
    pub upload_dir: PathBuf,
    /// NFT transfer fee in 1/100000 units (1000 = 1%)
    pub default_royalty: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("static/uploads"),
            default_royalty: 1000,
        }
    }
}

impl PortalConfig {
    pub fn with_upload_dir(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            ..Self::default()
        }
    }
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn parse_millis(name: &str, value: &str) -> LedgerResult<u64> {
    value.trim().parse().map_err(|_| {
        LedgerError::Validation(format!("{} must be a number of milliseconds", name))
    })
}
