//! Utility modules

pub mod memory_directory;
pub mod memory_ledger;
pub mod validation;

pub use memory_directory::*;
pub use memory_ledger::*;
pub use validation::*;
