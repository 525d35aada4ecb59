pub mod error;
pub mod ledger;
pub mod memory;
pub mod testing;

pub use error::LedgerError;
pub use ledger::ErrorLedger;
pub use memory::MemoryErrorLedger;
