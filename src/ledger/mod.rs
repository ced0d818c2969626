//! Ledger module containing the action wrapper, account wrapper and transaction requests

pub mod account;
pub mod core;
pub mod transaction;

pub use account::*;
pub use core::*;
pub use transaction::*;
