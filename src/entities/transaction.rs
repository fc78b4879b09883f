//! Local transaction entity - the building's own ledger rows.
//!
//! Each row has a `building_id`, a `transaction_type` (`income`/`expense`), an amount in
//! minor units, a date, a workflow `status`, and an optional `external_id` set when the
//! row has been linked to a synced transaction. Amount and date are nullable because
//! drafts can be saved before they are complete.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "local_transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Building the transaction belongs to
    pub building_id: String,
    /// `"income"` or `"expense"`
    pub transaction_type: String,
    /// Human-readable description
    pub description: Option<String>,
    /// User-entered category name
    pub category: Option<String>,
    /// Amount in minor currency units
    pub amount_minor_units: Option<i64>,
    /// Date of the economic event
    pub transaction_date: Option<Date>,
    /// `"pending"`, `"approved"`, `"completed"` or `"overdue"`
    pub status: String,
    /// Id of the matching transaction in the external system, once linked
    pub external_id: Option<String>,
    /// When the row was created
    pub created_at: DateTimeUtc,
}

/// Local transactions have no relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
