/// Database configuration and connection management
pub mod database;

/// Ledger settings (base currency, exchange rate, seeded templates) from ledger.toml
pub mod ledger;

pub use ledger::LedgerConfig;
