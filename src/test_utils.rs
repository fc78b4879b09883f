//! Shared test utilities for the finance engine.
//!
//! This module provides builders for raw source rows and canonical records with
//! sensible defaults, in-memory store fakes, and an in-memory ledger database.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        model::{
            BudgetLine, FinancialRecord, Invoice, InvoiceStatus, Period, Provenance, RecordStatus,
            SyncMeta, SyncStatus, TransactionKind,
        },
        source::{
            ExternalBudgetLine, ExternalInvoice, ExternalSnapshot, ExternalSyncStore,
            ExternalTransaction, LocalBudgetLine, LocalInvoice, LocalSnapshot, LocalStore,
            LocalTransaction,
        },
    },
    entities::{budget_line, invoice, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tracing_subscriber::EnvFilter;

/// Sync timestamp given to every external fixture unless overridden.
pub const DEFAULT_SYNCED_AT: &str = "2025-04-30T08:00:00Z";

/// Installs a tracing subscriber that writes through the test harness.
/// Safe to call from every test; only the first call installs it.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")),
        )
        .with_test_writer()
        .try_init();
}

/// Parses a `YYYY-MM-DD` date.
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Parses an RFC 3339 timestamp.
pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

// ----- raw source rows -----

/// Local ledger row for building `b-1`.
///
/// # Defaults
/// * `status`: `"completed"`
/// * `description`: None
/// * `external_id`: None
pub fn local_tx(id: &str, kind: &str, amount: i64, on: &str, category: &str) -> LocalTransaction {
    LocalTransaction {
        id: id.to_string(),
        building_id: "b-1".to_string(),
        transaction_type: kind.to_string(),
        description: None,
        category: Some(category.to_string()),
        amount_minor_units: Some(amount),
        date: Some(date(on)),
        status: "completed".to_string(),
        external_id: None,
    }
}

/// External transaction row for building `b-1`, synced successfully at
/// [`DEFAULT_SYNCED_AT`] with status `"paid"`.
pub fn ext_tx(id: &str, kind: &str, amount: i64, on: &str, category: &str) -> ExternalTransaction {
    ExternalTransaction {
        external_id: id.to_string(),
        building_id: "b-1".to_string(),
        transaction_type: kind.to_string(),
        reference: None,
        category: Some(category.to_string()),
        amount_minor_units: Some(amount),
        transaction_date: Some(date(on)),
        status: "paid".to_string(),
        synced_at: utc(DEFAULT_SYNCED_AT),
        sync_status: SyncStatus::Success,
    }
}

pub fn local_invoice(id: &str, amount: i64, status: &str, due: &str) -> LocalInvoice {
    LocalInvoice {
        id: id.to_string(),
        amount_minor_units: Some(amount),
        status: status.to_string(),
        due_date: Some(date(due)),
        external_id: None,
    }
}

pub fn ext_invoice(id: &str, amount: i64, status: &str, due: &str) -> ExternalInvoice {
    ExternalInvoice {
        external_id: id.to_string(),
        amount_minor_units: Some(amount),
        status: status.to_string(),
        due_date: Some(date(due)),
        synced_at: utc(DEFAULT_SYNCED_AT),
        sync_status: SyncStatus::Success,
    }
}

/// Local budget line for `2025-04`.
pub fn local_budget(id: &str, category: &str, budgeted: i64, actual: i64) -> LocalBudgetLine {
    LocalBudgetLine {
        id: id.to_string(),
        category: Some(category.to_string()),
        period: "2025-04".to_string(),
        budgeted_minor_units: Some(budgeted),
        actual_minor_units: Some(actual),
    }
}

/// External budget line for `2025-04`.
pub fn ext_budget(id: &str, category: &str, budgeted: i64, actual: i64) -> ExternalBudgetLine {
    ExternalBudgetLine {
        external_id: id.to_string(),
        budget_category: Some(category.to_string()),
        period: "2025-04".to_string(),
        budget_amount: Some(budgeted),
        actual_amount: Some(actual),
        synced_at: utc(DEFAULT_SYNCED_AT),
        sync_status: SyncStatus::Success,
    }
}

// ----- canonical records -----

pub fn external_provenance_at(synced_at: &str, sync_status: SyncStatus) -> Provenance {
    Provenance::External(SyncMeta {
        synced_at: utc(synced_at),
        sync_status,
    })
}

/// Completed local record with an empty description.
pub fn local_record(
    id: &str,
    kind: TransactionKind,
    amount: i64,
    on: &str,
    category: &str,
) -> FinancialRecord {
    FinancialRecord {
        id: id.to_string(),
        building_id: "b-1".to_string(),
        kind,
        category: category.to_string(),
        description: String::new(),
        amount_minor_units: amount,
        date: date(on),
        provenance: Provenance::Local,
        external_id: None,
        status: RecordStatus::Completed,
        conflict: false,
    }
}

/// Completed external record synced successfully at [`DEFAULT_SYNCED_AT`].
/// The id doubles as the external id.
pub fn external_record(
    id: &str,
    kind: TransactionKind,
    amount: i64,
    on: &str,
    category: &str,
) -> FinancialRecord {
    FinancialRecord {
        provenance: external_provenance_at(DEFAULT_SYNCED_AT, SyncStatus::Success),
        external_id: Some(id.to_string()),
        ..local_record(id, kind, amount, on, category)
    }
}

pub fn invoice(
    id: &str,
    amount: i64,
    status: InvoiceStatus,
    due: &str,
    provenance: Provenance,
) -> Invoice {
    let external_id = provenance.is_external().then(|| id.to_string());
    Invoice {
        id: id.to_string(),
        amount_minor_units: amount,
        status,
        due_date: date(due),
        provenance,
        external_id,
    }
}

pub fn budget_line(
    category: &str,
    period: &str,
    budgeted: i64,
    actual: i64,
    provenance: Provenance,
) -> BudgetLine {
    BudgetLine {
        category: category.to_string(),
        period: period.to_string(),
        budgeted_minor_units: budgeted,
        actual_minor_units: actual,
        provenance,
    }
}

// ----- store fakes -----

/// Local store that always returns the same snapshot.
pub struct StaticLocalStore(pub LocalSnapshot);

impl LocalStore for StaticLocalStore {
    async fn query(&self, _building_id: &str, _period: &Period) -> Result<LocalSnapshot> {
        Ok(self.0.clone())
    }
}

/// External store that always returns the same snapshot.
pub struct StaticExternalStore(pub ExternalSnapshot);

impl ExternalSyncStore for StaticExternalStore {
    async fn query(&self, _building_id: &str, _period: &Period) -> Result<ExternalSnapshot> {
        Ok(self.0.clone())
    }
}

/// Store that is always down.
pub struct FailingStore;

fn unavailable(source_name: &str) -> Error {
    Error::SourceUnavailable {
        source_name: source_name.to_string(),
        message: "connection refused".to_string(),
    }
}

impl LocalStore for FailingStore {
    async fn query(&self, _building_id: &str, _period: &Period) -> Result<LocalSnapshot> {
        Err(unavailable("local"))
    }
}

impl ExternalSyncStore for FailingStore {
    async fn query(&self, _building_id: &str, _period: &Period) -> Result<ExternalSnapshot> {
        Err(unavailable("external"))
    }
}

/// External store that answers only after `delay`.
pub struct SlowExternalStore {
    pub delay: std::time::Duration,
    pub snapshot: ExternalSnapshot,
}

impl ExternalSyncStore for SlowExternalStore {
    async fn query(&self, _building_id: &str, _period: &Period) -> Result<ExternalSnapshot> {
        tokio::time::sleep(self.delay).await;
        Ok(self.snapshot.clone())
    }
}

// ----- ledger database -----

/// Creates an in-memory `SQLite` database with all ledger tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Inserts a completed ledger transaction.
///
/// # Defaults
/// * `status`: `"completed"`
/// * `description`, `external_id`: None
pub async fn insert_ledger_transaction(
    db: &DatabaseConnection,
    building_id: &str,
    kind: &str,
    amount: Option<i64>,
    on: Option<&str>,
    category: &str,
) -> Result<transaction::Model> {
    let row = transaction::ActiveModel {
        building_id: Set(building_id.to_string()),
        transaction_type: Set(kind.to_string()),
        description: Set(None),
        category: Set(Some(category.to_string())),
        amount_minor_units: Set(amount),
        transaction_date: Set(on.map(date)),
        status: Set("completed".to_string()),
        external_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    row.insert(db).await.map_err(Into::into)
}

pub async fn insert_ledger_budget_line(
    db: &DatabaseConnection,
    building_id: &str,
    category: &str,
    period: &str,
    budgeted: i64,
    actual: i64,
) -> Result<budget_line::Model> {
    let row = budget_line::ActiveModel {
        building_id: Set(building_id.to_string()),
        category: Set(Some(category.to_string())),
        period: Set(period.to_string()),
        budgeted_minor_units: Set(Some(budgeted)),
        actual_minor_units: Set(Some(actual)),
        ..Default::default()
    };
    row.insert(db).await.map_err(Into::into)
}

pub async fn insert_ledger_invoice(
    db: &DatabaseConnection,
    building_id: &str,
    amount: i64,
    status: &str,
    due: Option<&str>,
) -> Result<invoice::Model> {
    let row = invoice::ActiveModel {
        building_id: Set(building_id.to_string()),
        amount_minor_units: Set(Some(amount)),
        status: Set(status.to_string()),
        due_date: Set(due.map(date)),
        external_id: Set(None),
        ..Default::default()
    };
    row.insert(db).await.map_err(Into::into)
}
