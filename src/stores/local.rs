//! Local ledger store backed by `SeaORM`.
//!
//! Rows are selected for one building. Transactions are narrowed to the requested
//! period, but undated rows are kept so the normalizer can report them as malformed.
//! Invoices are not narrowed: an invoice that fell due last month and is still unpaid
//! is still owed.

use crate::{
    core::{
        model::Period,
        source::{LocalBudgetLine, LocalInvoice, LocalSnapshot, LocalStore, LocalTransaction},
    },
    entities::{
        LocalBudgetLine as BudgetLineEntity, LocalBudgetLineColumn, LocalBudgetLineModel,
        LocalInvoice as InvoiceEntity, LocalInvoiceColumn, LocalInvoiceModel,
        LocalTransaction as TransactionEntity, LocalTransactionColumn, LocalTransactionModel,
    },
    errors::Result,
};
use sea_orm::{Condition, DatabaseConnection, QueryOrder, prelude::*};
use tracing::debug;

/// [`LocalStore`] over the ledger tables.
#[derive(Debug, Clone)]
pub struct SeaOrmLocalStore {
    db: DatabaseConnection,
}

impl SeaOrmLocalStore {
    /// Wraps an open connection. Tables must already exist.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn transactions(
        &self,
        building_id: &str,
        period: &Period,
    ) -> Result<Vec<LocalTransactionModel>> {
        TransactionEntity::find()
            .filter(LocalTransactionColumn::BuildingId.eq(building_id))
            .filter(
                Condition::any()
                    .add(LocalTransactionColumn::TransactionDate.between(period.start, period.end))
                    .add(LocalTransactionColumn::TransactionDate.is_null()),
            )
            .order_by_asc(LocalTransactionColumn::Id)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    async fn budget_lines(
        &self,
        building_id: &str,
        period: &Period,
    ) -> Result<Vec<LocalBudgetLineModel>> {
        BudgetLineEntity::find()
            .filter(LocalBudgetLineColumn::BuildingId.eq(building_id))
            .filter(LocalBudgetLineColumn::Period.eq(period.label()))
            .order_by_asc(LocalBudgetLineColumn::Id)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    async fn invoices(&self, building_id: &str) -> Result<Vec<LocalInvoiceModel>> {
        InvoiceEntity::find()
            .filter(LocalInvoiceColumn::BuildingId.eq(building_id))
            .order_by_asc(LocalInvoiceColumn::Id)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }
}

impl LocalStore for SeaOrmLocalStore {
    async fn query(&self, building_id: &str, period: &Period) -> Result<LocalSnapshot> {
        let transactions = self.transactions(building_id, period).await?;
        let budget_lines = self.budget_lines(building_id, period).await?;
        let invoices = self.invoices(building_id).await?;

        debug!(
            "Local ledger for {building_id} ({}): {} transactions, {} budget lines, {} invoices",
            period.label(),
            transactions.len(),
            budget_lines.len(),
            invoices.len()
        );

        Ok(LocalSnapshot {
            transactions: transactions.into_iter().map(Into::into).collect(),
            budget_lines: budget_lines.into_iter().map(Into::into).collect(),
            invoices: invoices.into_iter().map(Into::into).collect(),
        })
    }
}

impl From<LocalTransactionModel> for LocalTransaction {
    fn from(model: LocalTransactionModel) -> Self {
        Self {
            id: model.id.to_string(),
            building_id: model.building_id,
            transaction_type: model.transaction_type,
            description: model.description,
            category: model.category,
            amount_minor_units: model.amount_minor_units,
            date: model.transaction_date,
            status: model.status,
            external_id: model.external_id,
        }
    }
}

impl From<LocalBudgetLineModel> for LocalBudgetLine {
    fn from(model: LocalBudgetLineModel) -> Self {
        Self {
            id: model.id.to_string(),
            category: model.category,
            period: model.period,
            budgeted_minor_units: model.budgeted_minor_units,
            actual_minor_units: model.actual_minor_units,
        }
    }
}

impl From<LocalInvoiceModel> for LocalInvoice {
    fn from(model: LocalInvoiceModel) -> Self {
        Self {
            id: model.id.to_string(),
            amount_minor_units: model.amount_minor_units,
            status: model.status,
            due_date: model.due_date,
            external_id: model.external_id,
        }
    }
}
