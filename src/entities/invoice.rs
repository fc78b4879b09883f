//! Local invoice entity - invoices raised or received by the building.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local invoice database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "local_invoices")]
pub struct Model {
    /// Unique identifier for the invoice
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Building the invoice belongs to
    pub building_id: String,
    /// Amount in minor currency units
    pub amount_minor_units: Option<i64>,
    /// `"pending"`, `"approved"` or `"overdue"`
    pub status: String,
    /// When payment is due
    pub due_date: Option<Date>,
    /// Id of the matching invoice in the external system, once linked
    pub external_id: Option<String>,
}

/// Invoices have no relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
