//! # XRPL Actions
//!
//! Typed wrappers for the everyday XRP Ledger actions: XRP and token
//! payments, trust lines, NFT minting and sale offers, and DEX offers.
//!
//! ## Features
//!
//! - **Client-side pre-checks**: overspending, missing or unauthorized trust
//!   lines, and trust-limit overruns are refused before anything is submitted
//! - **Explicit outcomes**: every action returns an [`ActionOutcome`] that says
//!   whether it succeeded, failed on ledger, failed to submit, or was refused
//! - **Exact amounts**: XRP is carried as integer drops and issued currencies
//!   as decimal strings
//! - **Account registry**: one funded account per external identifier
//! - **Portal service**: registration, image upload and mint, NFT offers and a
//!   dashboard over any [`UserDirectory`]
//! - **Client abstraction**: the same code runs against a public node or the
//!   in-process [`utils::MemoryLedger`]
//! - **Local signing**: Ed25519 wallets are generated and sign in process, so
//!   seeds are never sent to a node
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bigdecimal::BigDecimal;
//! use xrpl_actions::{rpc::JsonRpcClient, LedgerActions, XrpAccount};
//!
//! # async fn run() -> xrpl_actions::LedgerResult<()> {
//! let client = Arc::new(JsonRpcClient::testnet()?);
//! let actions = Arc::new(LedgerActions::new(client));
//!
//! let alice = XrpAccount::create("Alice", actions.clone()).await?;
//! let bob = XrpAccount::create("Bob", actions).await?;
//!
//! let outcome = alice.send_xrp(&BigDecimal::from(10), bob.address()).await?;
//! println!("{}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod amount;
pub mod config;
pub mod ledger;
pub mod portal;
pub mod registry;
pub mod rpc;
pub mod signing;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use amount::*;
pub use config::*;
pub use ledger::*;
pub use portal::Portal;
pub use registry::AccountRegistry;
pub use traits::*;
pub use types::*;

// Re-export request patterns for convenience
pub use ledger::transaction::patterns;
