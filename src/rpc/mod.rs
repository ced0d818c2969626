//! Network client for a public ledger node and the test-network faucet

mod faucet;
pub mod json_rpc;

pub use json_rpc::*;
