//! Record normalization - maps source-specific rows into canonical types.
//!
//! Each source has an explicit mapping table for its vocabulary (transaction type,
//! workflow status, invoice status, category aliases). A row whose required fields
//! are missing, or whose vocabulary falls outside its table, is dropped and reported
//! as a [`DataIssue::Malformed`] diagnostic; it never reaches an aggregate.

use crate::{
    config::engine::CategoryConfig,
    core::{
        model::{
            BudgetLine, DataIssue, Diagnostics, DropReason, EntityKind, FinancialRecord,
            Invoice, InvoiceStatus, Provenance, RecordStatus, SourceKind, SyncMeta, SyncStatus,
            TransactionKind, UNCATEGORISED,
        },
        source::{
            ExternalBudgetLine, ExternalInvoice, ExternalSnapshot, ExternalTransaction,
            LocalBudgetLine, LocalInvoice, LocalSnapshot, LocalTransaction, SourceRecord,
        },
    },
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Canonical categories used when no configuration overrides them.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Service Charges",
    "Ground Rent",
    "Reserve Fund",
    "Insurance",
    "Repairs & Maintenance",
    "Utilities",
    "Cleaning",
    "Management Fees",
    "Professional Fees",
    "Staff Costs",
];

/// Canonical category enumeration plus per-source alias tables.
///
/// Lookups are case-insensitive and ignore surrounding whitespace. Anything that is
/// neither a canonical name nor a known alias for its source maps to
/// [`UNCATEGORISED`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap {
    canonical: BTreeMap<String, String>,
    local_aliases: BTreeMap<String, String>,
    external_aliases: BTreeMap<String, String>,
}

impl Default for CategoryMap {
    fn default() -> Self {
        let mut map = Self::empty();
        for name in DEFAULT_CATEGORIES {
            map.canonical.insert(lookup_key(name), (*name).to_string());
        }
        map
    }
}

impl CategoryMap {
    fn empty() -> Self {
        Self {
            canonical: BTreeMap::new(),
            local_aliases: BTreeMap::new(),
            external_aliases: BTreeMap::new(),
        }
    }

    /// Builds the map from configured categories. An empty list keeps the defaults.
    #[must_use]
    pub fn from_config(categories: &[CategoryConfig]) -> Self {
        if categories.is_empty() {
            return Self::default();
        }

        let mut map = Self::empty();
        for category in categories {
            let name = category.name.trim().to_string();
            map.canonical.insert(lookup_key(&name), name.clone());
            for alias in &category.local_aliases {
                map.local_aliases.insert(lookup_key(alias), name.clone());
            }
            for alias in &category.external_aliases {
                map.external_aliases.insert(lookup_key(alias), name.clone());
            }
        }
        map
    }

    /// Resolves a raw category from `source` to its canonical name.
    #[must_use]
    pub fn resolve(&self, source: SourceKind, raw: Option<&str>) -> String {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return UNCATEGORISED.to_string();
        };
        let key = lookup_key(raw);

        let aliases = match source {
            SourceKind::Local => &self.local_aliases,
            SourceKind::External => &self.external_aliases,
        };

        self.canonical
            .get(&key)
            .or_else(|| aliases.get(&key))
            .cloned()
            .unwrap_or_else(|| {
                debug!("Unknown {source} category '{raw}', using {UNCATEGORISED}");
                UNCATEGORISED.to_string()
            })
    }
}

fn lookup_key(value: &str) -> String {
    value.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Vocabulary tables
// ---------------------------------------------------------------------------

fn local_kind(value: &str) -> Option<TransactionKind> {
    match lookup_key(value).as_str() {
        "income" => Some(TransactionKind::Income),
        "expense" => Some(TransactionKind::Expense),
        _ => None,
    }
}

fn external_kind(value: &str) -> Option<TransactionKind> {
    match lookup_key(value).as_str() {
        "payment" => Some(TransactionKind::Income),
        "charge" => Some(TransactionKind::Expense),
        _ => None,
    }
}

fn local_status(value: &str) -> Option<RecordStatus> {
    match lookup_key(value).as_str() {
        "pending" => Some(RecordStatus::Pending),
        "approved" => Some(RecordStatus::Approved),
        "completed" => Some(RecordStatus::Completed),
        "overdue" => Some(RecordStatus::Overdue),
        _ => None,
    }
}

fn external_status(value: &str) -> Option<RecordStatus> {
    match lookup_key(value).as_str() {
        "pending" => Some(RecordStatus::Pending),
        "approved" => Some(RecordStatus::Approved),
        "paid" | "settled" | "completed" => Some(RecordStatus::Completed),
        "overdue" | "arrears" => Some(RecordStatus::Overdue),
        _ => None,
    }
}

fn local_invoice_status(value: &str) -> Option<InvoiceStatus> {
    match lookup_key(value).as_str() {
        "pending" => Some(InvoiceStatus::Pending),
        "approved" => Some(InvoiceStatus::Approved),
        "overdue" => Some(InvoiceStatus::Overdue),
        _ => None,
    }
}

fn external_invoice_status(value: &str) -> Option<InvoiceStatus> {
    match lookup_key(value).as_str() {
        "pending" | "outstanding" => Some(InvoiceStatus::Pending),
        "approved" => Some(InvoiceStatus::Approved),
        "overdue" => Some(InvoiceStatus::Overdue),
        _ => None,
    }
}

/// Largest single amount accepted from either source: ten trillion major units.
///
/// Keeps each amount exactly representable as an `f64` when percentages are taken.
pub const MAX_AMOUNT_MINOR_UNITS: i64 = 1_000_000_000_000_000;

/// Checks an optional amount: present, non-negative and within [`MAX_AMOUNT_MINOR_UNITS`].
fn require_amount(amount: Option<i64>) -> Result<i64, DropReason> {
    match amount {
        None => Err(DropReason::MissingAmount),
        Some(value) if value < 0 => Err(DropReason::NegativeAmount(value)),
        Some(value) if value > MAX_AMOUNT_MINOR_UNITS => Err(DropReason::AmountTooLarge(value)),
        Some(value) => Ok(value),
    }
}

fn external_provenance(synced_at: DateTime<Utc>, sync_status: SyncStatus) -> Provenance {
    Provenance::External(SyncMeta {
        synced_at,
        sync_status,
    })
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Normalizes one tagged raw transaction.
///
/// # Errors
/// Returns the [`DataIssue::Malformed`] diagnostic when the row must be dropped.
pub fn normalize_transaction(
    record: SourceRecord,
    categories: &CategoryMap,
) -> Result<FinancialRecord, DataIssue> {
    match record {
        SourceRecord::Local(row) => normalize_local_transaction(row, categories),
        SourceRecord::External(row) => normalize_external_transaction(row, categories),
    }
}

fn normalize_local_transaction(
    row: LocalTransaction,
    categories: &CategoryMap,
) -> Result<FinancialRecord, DataIssue> {
    let malformed = |reason| DataIssue::Malformed {
        source_kind: SourceKind::Local,
        entity: EntityKind::Transaction,
        record_id: row.id.clone(),
        reason,
    };

    let amount = require_amount(row.amount_minor_units).map_err(malformed)?;
    let date = row.date.ok_or_else(|| malformed(DropReason::MissingDate))?;
    let kind = local_kind(&row.transaction_type)
        .ok_or_else(|| malformed(DropReason::UnknownKind(row.transaction_type.clone())))?;
    let status = local_status(&row.status)
        .ok_or_else(|| malformed(DropReason::UnknownStatus(row.status.clone())))?;

    Ok(FinancialRecord {
        category: categories.resolve(SourceKind::Local, row.category.as_deref()),
        description: row.description.unwrap_or_default(),
        external_id: row.external_id.filter(|id| !id.trim().is_empty()),
        id: row.id,
        building_id: row.building_id,
        kind,
        amount_minor_units: amount,
        date,
        provenance: Provenance::Local,
        status,
        conflict: false,
    })
}

fn normalize_external_transaction(
    row: ExternalTransaction,
    categories: &CategoryMap,
) -> Result<FinancialRecord, DataIssue> {
    let malformed = |reason| DataIssue::Malformed {
        source_kind: SourceKind::External,
        entity: EntityKind::Transaction,
        record_id: row.external_id.clone(),
        reason,
    };

    let amount = require_amount(row.amount_minor_units).map_err(malformed)?;
    let date = row
        .transaction_date
        .ok_or_else(|| malformed(DropReason::MissingDate))?;
    let kind = external_kind(&row.transaction_type)
        .ok_or_else(|| malformed(DropReason::UnknownKind(row.transaction_type.clone())))?;
    let status = external_status(&row.status)
        .ok_or_else(|| malformed(DropReason::UnknownStatus(row.status.clone())))?;

    Ok(FinancialRecord {
        id: row.external_id.clone(),
        building_id: row.building_id,
        kind,
        category: categories.resolve(SourceKind::External, row.category.as_deref()),
        description: row.reference.unwrap_or_default(),
        amount_minor_units: amount,
        date,
        provenance: external_provenance(row.synced_at, row.sync_status),
        external_id: Some(row.external_id),
        status,
        conflict: false,
    })
}

// ---------------------------------------------------------------------------
// Invoices and budget lines
// ---------------------------------------------------------------------------

/// Normalizes a local invoice.
///
/// # Errors
/// Returns the [`DataIssue::Malformed`] diagnostic when the row must be dropped.
pub fn normalize_local_invoice(row: LocalInvoice) -> Result<Invoice, DataIssue> {
    let malformed = |reason| DataIssue::Malformed {
        source_kind: SourceKind::Local,
        entity: EntityKind::Invoice,
        record_id: row.id.clone(),
        reason,
    };

    let amount = require_amount(row.amount_minor_units).map_err(malformed)?;
    let due_date = row.due_date.ok_or_else(|| malformed(DropReason::MissingDate))?;
    let status = local_invoice_status(&row.status)
        .ok_or_else(|| malformed(DropReason::UnknownStatus(row.status.clone())))?;

    Ok(Invoice {
        id: row.id,
        amount_minor_units: amount,
        status,
        due_date,
        provenance: Provenance::Local,
        external_id: row.external_id.filter(|id| !id.trim().is_empty()),
    })
}

/// Normalizes an external invoice.
///
/// # Errors
/// Returns the [`DataIssue::Malformed`] diagnostic when the row must be dropped.
pub fn normalize_external_invoice(row: ExternalInvoice) -> Result<Invoice, DataIssue> {
    let malformed = |reason| DataIssue::Malformed {
        source_kind: SourceKind::External,
        entity: EntityKind::Invoice,
        record_id: row.external_id.clone(),
        reason,
    };

    let amount = require_amount(row.amount_minor_units).map_err(malformed)?;
    let due_date = row.due_date.ok_or_else(|| malformed(DropReason::MissingDate))?;
    let status = external_invoice_status(&row.status)
        .ok_or_else(|| malformed(DropReason::UnknownStatus(row.status.clone())))?;

    Ok(Invoice {
        id: row.external_id.clone(),
        amount_minor_units: amount,
        status,
        due_date,
        provenance: external_provenance(row.synced_at, row.sync_status),
        external_id: Some(row.external_id),
    })
}

/// Normalizes a local budget line.
///
/// # Errors
/// Returns the [`DataIssue::Malformed`] diagnostic when an amount is missing or negative.
pub fn normalize_local_budget_line(
    row: LocalBudgetLine,
    categories: &CategoryMap,
) -> Result<BudgetLine, DataIssue> {
    let malformed = |reason| DataIssue::Malformed {
        source_kind: SourceKind::Local,
        entity: EntityKind::BudgetLine,
        record_id: row.id.clone(),
        reason,
    };

    let budgeted = require_amount(row.budgeted_minor_units).map_err(malformed)?;
    let actual = require_amount(row.actual_minor_units).map_err(malformed)?;

    Ok(BudgetLine {
        category: categories.resolve(SourceKind::Local, row.category.as_deref()),
        period: row.period,
        budgeted_minor_units: budgeted,
        actual_minor_units: actual,
        provenance: Provenance::Local,
    })
}

/// Normalizes an external budget line.
///
/// # Errors
/// Returns the [`DataIssue::Malformed`] diagnostic when an amount is missing or negative.
pub fn normalize_external_budget_line(
    row: ExternalBudgetLine,
    categories: &CategoryMap,
) -> Result<BudgetLine, DataIssue> {
    let malformed = |reason| DataIssue::Malformed {
        source_kind: SourceKind::External,
        entity: EntityKind::BudgetLine,
        record_id: row.external_id.clone(),
        reason,
    };

    let budgeted = require_amount(row.budget_amount).map_err(malformed)?;
    let actual = require_amount(row.actual_amount).map_err(malformed)?;

    Ok(BudgetLine {
        category: categories.resolve(SourceKind::External, row.budget_category.as_deref()),
        period: row.period,
        budgeted_minor_units: budgeted,
        actual_minor_units: actual,
        provenance: external_provenance(row.synced_at, row.sync_status),
    })
}

// ---------------------------------------------------------------------------
// Whole snapshots
// ---------------------------------------------------------------------------

/// Canonical rows from one source plus the rows that had to be dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedSource {
    /// Canonical transactions
    pub records: Vec<FinancialRecord>,
    /// Canonical invoices
    pub invoices: Vec<Invoice>,
    /// Canonical budget lines
    pub budget_lines: Vec<BudgetLine>,
    /// One `Malformed` entry per dropped row
    pub diagnostics: Diagnostics,
}

impl NormalizedSource {
    fn keep<T>(items: &mut Vec<T>, diagnostics: &mut Diagnostics, result: Result<T, DataIssue>) {
        match result {
            Ok(item) => items.push(item),
            Err(issue) => {
                warn!("{issue}");
                diagnostics.push(issue);
            }
        }
    }
}

/// Normalizes everything the local ledger returned.
#[must_use]
pub fn normalize_local_snapshot(snapshot: LocalSnapshot, categories: &CategoryMap) -> NormalizedSource {
    let mut out = NormalizedSource::default();

    for row in snapshot.transactions {
        let result = normalize_transaction(SourceRecord::Local(row), categories);
        NormalizedSource::keep(&mut out.records, &mut out.diagnostics, result);
    }
    for row in snapshot.invoices {
        NormalizedSource::keep(&mut out.invoices, &mut out.diagnostics, normalize_local_invoice(row));
    }
    for row in snapshot.budget_lines {
        let result = normalize_local_budget_line(row, categories);
        NormalizedSource::keep(&mut out.budget_lines, &mut out.diagnostics, result);
    }

    debug!(
        "Normalized local snapshot: {} records, {} invoices, {} budget lines, {} dropped",
        out.records.len(),
        out.invoices.len(),
        out.budget_lines.len(),
        out.diagnostics.malformed_count()
    );
    out
}

/// Normalizes everything the external sync store returned.
#[must_use]
pub fn normalize_external_snapshot(
    snapshot: ExternalSnapshot,
    categories: &CategoryMap,
) -> NormalizedSource {
    let mut out = NormalizedSource::default();

    for row in snapshot.transactions {
        let result = normalize_transaction(SourceRecord::External(row), categories);
        NormalizedSource::keep(&mut out.records, &mut out.diagnostics, result);
    }
    for row in snapshot.invoices {
        NormalizedSource::keep(&mut out.invoices, &mut out.diagnostics, normalize_external_invoice(row));
    }
    for row in snapshot.budget_lines {
        let result = normalize_external_budget_line(row, categories);
        NormalizedSource::keep(&mut out.budget_lines, &mut out.diagnostics, result);
    }
    for row in snapshot.rejected {
        out.diagnostics.push(DataIssue::Malformed {
            source_kind: SourceKind::External,
            entity: row.entity,
            record_id: row.record_id,
            reason: DropReason::Undecodable(row.message),
        });
    }

    debug!(
        "Normalized external snapshot: {} records, {} invoices, {} budget lines, {} dropped",
        out.records.len(),
        out.invoices.len(),
        out.budget_lines.len(),
        out.diagnostics.malformed_count()
    );
    out
}
