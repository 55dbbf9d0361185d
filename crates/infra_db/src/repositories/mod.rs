//! Repository implementations of the billing domain ports

pub mod ledger;
pub mod directory;

pub use ledger::PgLedgerStore;
pub use directory::PgStudentDirectory;
