//! Database configuration module for the local ledger.
//!
//! This module handles the `SQLite` connection for the locally-owned ledger and creates
//! its tables from the `SeaORM` entity definitions using `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.

use crate::entities::{LocalBudgetLine, LocalInvoice, LocalTransaction};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/building_finance.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or the default path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the local ledger database.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

/// Creates the ledger tables if they do not exist yet.
///
/// Tables are generated from the `DeriveEntityModel` definitions for transactions,
/// budget lines and invoices.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut transaction_table = schema.create_table_from_entity(LocalTransaction);
    let mut budget_line_table = schema.create_table_from_entity(LocalBudgetLine);
    let mut invoice_table = schema.create_table_from_entity(LocalInvoice);

    transaction_table.if_not_exists();
    budget_line_table.if_not_exists();
    invoice_table.if_not_exists();

    db.execute(builder.build(&transaction_table)).await?;
    db.execute(builder.build(&budget_line_table)).await?;
    db.execute(builder.build(&invoice_table)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{LocalBudgetLineModel, LocalInvoiceModel, LocalTransactionModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<LocalTransactionModel> = LocalTransaction::find().limit(1).all(&db).await?;
        let _: Vec<LocalBudgetLineModel> = LocalBudgetLine::find().limit(1).all(&db).await?;
        let _: Vec<LocalInvoiceModel> = LocalInvoice::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
