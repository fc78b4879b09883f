//! Raw source records and the collaborator store contracts.
//!
//! Each source keeps its own field names and vocabulary. Nothing here is interpreted;
//! mapping into canonical types happens in [`crate::core::normalize`].

use crate::{
    core::model::{EntityKind, Period, SyncStatus},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, future::Future};

/// Ledger row as stored by the local application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTransaction {
    /// Ledger row id
    pub id: String,
    /// Owning building
    pub building_id: String,
    /// `income` or `expense`
    #[serde(rename = "type")]
    pub transaction_type: String,
    /// Free-text description
    pub description: Option<String>,
    /// User-entered category
    pub category: Option<String>,
    /// Amount in minor units
    pub amount_minor_units: Option<i64>,
    /// Economic date
    pub date: Option<NaiveDate>,
    /// `pending`, `approved`, `completed` or `overdue`
    pub status: String,
    /// External system id when the row was linked to a synced transaction
    pub external_id: Option<String>,
}

/// Transaction row written by the external sync job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTransaction {
    /// Id in the property-management system
    pub external_id: String,
    /// Owning building
    pub building_id: String,
    /// `payment` or `charge`
    pub transaction_type: String,
    /// Reference text from the external system
    pub reference: Option<String>,
    /// External nominal/category code
    pub category: Option<String>,
    /// Amount in minor units
    pub amount_minor_units: Option<i64>,
    /// Posting date
    pub transaction_date: Option<NaiveDate>,
    /// External workflow status (`paid`, `overdue`, ...)
    pub status: String,
    /// When the sync job wrote this row
    pub synced_at: DateTime<Utc>,
    /// Status of the sync that wrote it
    pub sync_status: SyncStatus,
}

/// Tagged raw transaction. The normalizer dispatches on the tag, never on field presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRecord {
    /// Row from the local ledger
    Local(LocalTransaction),
    /// Row from the external sync store
    External(ExternalTransaction),
}

/// Budget line as stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalBudgetLine {
    /// Ledger row id
    pub id: String,
    /// Category name
    pub category: Option<String>,
    /// Period label (`YYYY-MM`)
    pub period: String,
    /// Budgeted amount in minor units
    pub budgeted_minor_units: Option<i64>,
    /// Actual amount in minor units
    pub actual_minor_units: Option<i64>,
}

/// Budget line from the external system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalBudgetLine {
    /// Id in the property-management system
    pub external_id: String,
    /// External budget heading
    pub budget_category: Option<String>,
    /// Period label (`YYYY-MM`)
    pub period: String,
    /// Budget amount in minor units
    pub budget_amount: Option<i64>,
    /// Actual spend in minor units
    pub actual_amount: Option<i64>,
    /// When the sync job wrote this row
    pub synced_at: DateTime<Utc>,
    /// Status of the sync that wrote it
    pub sync_status: SyncStatus,
}

/// Invoice as stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInvoice {
    /// Ledger row id
    pub id: String,
    /// Amount in minor units
    pub amount_minor_units: Option<i64>,
    /// `pending`, `approved` or `overdue`
    pub status: String,
    /// Due date
    pub due_date: Option<NaiveDate>,
    /// External system id when linked
    pub external_id: Option<String>,
}

/// Invoice from the external system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalInvoice {
    /// Id in the property-management system
    pub external_id: String,
    /// Amount in minor units
    pub amount_minor_units: Option<i64>,
    /// External status (`outstanding`, `approved`, `overdue`, ...)
    pub status: String,
    /// Due date
    pub due_date: Option<NaiveDate>,
    /// When the sync job wrote this row
    pub synced_at: DateTime<Utc>,
    /// Status of the sync that wrote it
    pub sync_status: SyncStatus,
}

/// Last sync outcome for one entity type (`transactions`, `invoices`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySyncState {
    /// Status of the most recent sync run for the entity type
    pub status: SyncStatus,
    /// When that run finished, if it has
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// External row that was present in the export but did not decode into its row type.
///
/// The store keeps going past such rows; the normalizer reports each one as malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// Which table the row came from
    pub entity: EntityKind,
    /// `external_id` when the row carried a readable one, otherwise its position
    pub record_id: String,
    /// Decoder message
    pub message: String,
}

/// Everything the local ledger holds for one building and period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSnapshot {
    /// Ledger transactions
    pub transactions: Vec<LocalTransaction>,
    /// Budget lines
    pub budget_lines: Vec<LocalBudgetLine>,
    /// Invoices
    pub invoices: Vec<LocalInvoice>,
}

/// Everything the external sync store holds for one building and period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSnapshot {
    /// Synced transactions
    pub transactions: Vec<ExternalTransaction>,
    /// Synced invoices
    pub invoices: Vec<ExternalInvoice>,
    /// Synced budget lines
    pub budget_lines: Vec<ExternalBudgetLine>,
    /// Sync state keyed by entity type name
    #[serde(default)]
    pub sync_status_by_entity_type: BTreeMap<String, EntitySyncState>,
    /// Rows the store could not decode
    #[serde(skip)]
    pub rejected: Vec<RejectedRow>,
}

/// Internally-owned ledger. Rows are already validated by the write path.
pub trait LocalStore {
    /// Fetches the local snapshot for `building_id` and `period`.
    fn query(
        &self,
        building_id: &str,
        period: &Period,
    ) -> impl Future<Output = Result<LocalSnapshot>> + Send;
}

/// Read-only view of the periodically synced external system.
pub trait ExternalSyncStore {
    /// Fetches the external snapshot for `building_id` and `period`.
    fn query(
        &self,
        building_id: &str,
        period: &Period,
    ) -> impl Future<Output = Result<ExternalSnapshot>> + Send;
}
