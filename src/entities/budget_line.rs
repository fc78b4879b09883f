//! Local budget line entity - budgeted and actual amounts per category and period.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local budget line database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "local_budget_lines")]
pub struct Model {
    /// Unique identifier for the budget line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Building the budget belongs to
    pub building_id: String,
    /// Budget category name
    pub category: Option<String>,
    /// Period label, `YYYY-MM`
    pub period: String,
    /// Budgeted amount in minor currency units
    pub budgeted_minor_units: Option<i64>,
    /// Actual amount in minor currency units
    pub actual_minor_units: Option<i64>,
}

/// Budget lines have no relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
