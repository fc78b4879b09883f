/// Local ledger database connection and table creation
pub mod database;

/// Engine configuration loading from finance.toml
pub mod engine;
