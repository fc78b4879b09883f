//! Entity module - `SeaORM` definitions for the local ledger tables.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod budget_line;
pub mod invoice;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use budget_line::{
    Column as LocalBudgetLineColumn, Entity as LocalBudgetLine, Model as LocalBudgetLineModel,
};
pub use invoice::{Column as LocalInvoiceColumn, Entity as LocalInvoice, Model as LocalInvoiceModel};
pub use transaction::{
    Column as LocalTransactionColumn, Entity as LocalTransaction,
    Model as LocalTransactionModel,
};
