//! Aggregation - derived metrics over the reconciled set.
//!
//! Every amount stays an exact `i64` in minor units. Percentages are computed once from
//! exact integer totals and are never rounded here; rounding belongs to
//! [`crate::core::report`].

use crate::core::{
    model::{
        FinancialRecord, Invoice, InvoiceStatus, RecordStatus, SourceAvailability, SyncStatus,
        TransactionKind,
    },
    reconcile::{CategoryBudget, recent_first},
    staleness::{self, Freshness},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// `numerator / denominator × 100`, or `None` when the denominator is zero.
#[must_use]
pub fn percentage(numerator: i64, denominator: i64) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    // Single amounts are capped below 2^53 by the normalizer; larger totals lose only
    // sub-unit precision in the ratio.
    #[allow(clippy::cast_precision_loss)]
    let scaled = numerator as f64 * 100.0 / denominator as f64;
    Some(scaled)
}

/// Totals gathered in one pass over the reconciled records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Sum of income amounts
    pub total_income: i64,
    /// Sum of expense amounts
    pub total_expense: i64,
    /// Income records that are settled
    pub payments_received: i64,
    /// All income records, settled or not
    pub demands_issued: i64,
    /// Number of records
    pub record_count: usize,
    /// Number of externally sourced records
    pub external_record_count: usize,
}

impl Totals {
    /// Tallies `records` in a single pass. Sums saturate at `i64::MAX` instead of wrapping.
    #[must_use]
    pub fn tally(records: &[FinancialRecord]) -> Self {
        records.iter().fold(Self::default(), |mut totals, record| {
            let amount = record.amount_minor_units;
            match record.kind {
                TransactionKind::Income => {
                    totals.total_income = totals.total_income.saturating_add(amount);
                    totals.demands_issued = totals.demands_issued.saturating_add(amount);
                    if record.status == RecordStatus::Completed {
                        totals.payments_received = totals.payments_received.saturating_add(amount);
                    }
                }
                TransactionKind::Expense => {
                    totals.total_expense = totals.total_expense.saturating_add(amount);
                }
            }
            totals.record_count += 1;
            if record.is_external() {
                totals.external_record_count += 1;
            }
            totals
        })
    }

    /// Income minus expense, exact.
    #[must_use]
    pub const fn net_position(&self) -> i64 {
        self.total_income.saturating_sub(self.total_expense)
    }

    /// Collected share of demanded income; `None` when nothing was demanded.
    #[must_use]
    pub fn collection_rate(&self) -> Option<f64> {
        percentage(self.payments_received, self.demands_issued)
    }

    /// Share of records that came from the external system; 0 when there are none.
    #[must_use]
    pub fn external_data_percentage(&self) -> f64 {
        let external = i64::try_from(self.external_record_count).unwrap_or(i64::MAX);
        let total = i64::try_from(self.record_count).unwrap_or(i64::MAX);
        percentage(external, total).unwrap_or(0.0)
    }
}

/// Invoice sums per status bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvoiceBuckets {
    /// Pending plus approved
    pub outstanding: i64,
    /// Number of outstanding invoices
    pub outstanding_count: usize,
    /// Overdue
    pub overdue: i64,
    /// Number of overdue invoices
    pub overdue_count: usize,
}

impl InvoiceBuckets {
    /// Groups `invoices` by status.
    #[must_use]
    pub fn tally(invoices: &[Invoice]) -> Self {
        invoices.iter().fold(Self::default(), |mut buckets, invoice| {
            match invoice.status {
                InvoiceStatus::Pending | InvoiceStatus::Approved => {
                    buckets.outstanding = buckets.outstanding.saturating_add(invoice.amount_minor_units);
                    buckets.outstanding_count += 1;
                }
                InvoiceStatus::Overdue => {
                    buckets.overdue = buckets.overdue.saturating_add(invoice.amount_minor_units);
                    buckets.overdue_count += 1;
                }
            }
            buckets
        })
    }
}

/// Headline figures for the dashboard. Built fresh per request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    /// Sum of income in minor units
    pub total_income: i64,
    /// Sum of expenses in minor units
    pub total_expense: i64,
    /// `total_income - total_expense`
    pub net_position: i64,
    /// Pending and approved invoice total
    pub outstanding_invoices: i64,
    /// Overdue invoice total
    pub overdue_payments: i64,
    /// Number of outstanding invoices
    pub outstanding_invoice_count: usize,
    /// Number of overdue invoices
    pub overdue_invoice_count: usize,
    /// Collected share of demanded income, absent when nothing was demanded
    pub collection_rate: Option<f64>,
    /// Share of records from the external system
    pub external_data_percentage: f64,
    /// Number of reconciled records
    pub record_count: usize,
    /// Latest external sync among the contributors
    pub last_external_sync: Option<DateTime<Utc>>,
    /// Worst external sync status among the contributors
    pub external_sync_status: Option<SyncStatus>,
    /// Whether the latest external sync is older than the configured limit
    pub is_stale: bool,
    /// True when a source failed and the figures cover only the other one
    pub partial: bool,
    /// Which sources contributed
    pub source_availability: SourceAvailability,
}

/// Builds the summary from reconciled records and invoices.
///
/// `freshness` and `is_stale` come from the staleness tracker; the aggregator only
/// copies them onto the output.
#[must_use]
pub fn summarize(
    records: &[FinancialRecord],
    invoices: &[Invoice],
    freshness: Option<Freshness>,
    is_stale: bool,
    source_availability: SourceAvailability,
) -> FinancialSummary {
    let totals = Totals::tally(records);
    let buckets = InvoiceBuckets::tally(invoices);

    FinancialSummary {
        total_income: totals.total_income,
        total_expense: totals.total_expense,
        net_position: totals.net_position(),
        outstanding_invoices: buckets.outstanding,
        overdue_payments: buckets.overdue,
        outstanding_invoice_count: buckets.outstanding_count,
        overdue_invoice_count: buckets.overdue_count,
        collection_rate: totals.collection_rate(),
        external_data_percentage: totals.external_data_percentage(),
        record_count: totals.record_count,
        last_external_sync: freshness.and_then(|f| f.last_synced),
        external_sync_status: freshness.map(|f| f.sync_status),
        is_stale,
        partial: source_availability.is_partial(),
        source_availability,
    }
}

/// Budget versus actual for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetComparison {
    /// Canonical category
    pub category: String,
    /// Budgeted amount in minor units
    pub budgeted: i64,
    /// Actual amount in minor units
    pub actual: i64,
    /// `actual - budgeted`; positive means overspent
    pub variance: i64,
    /// `variance / budgeted × 100`, or 0 when nothing was budgeted
    pub variance_percentage: f64,
    /// Whether any external line contributed
    pub is_external: bool,
    /// Latest sync among external contributors
    pub last_synced: Option<DateTime<Utc>>,
    /// Worst sync status among external contributors
    pub sync_status: Option<SyncStatus>,
}

/// Computes variance once per merged category.
#[must_use]
pub fn compare_budgets(merged: &[CategoryBudget]) -> Vec<BudgetComparison> {
    merged
        .iter()
        .map(|line| {
            let variance = line.actual_minor_units.saturating_sub(line.budgeted_minor_units);
            let freshness = staleness::track(&line.contributors);
            BudgetComparison {
                category: line.category.clone(),
                budgeted: line.budgeted_minor_units,
                actual: line.actual_minor_units,
                variance,
                variance_percentage: percentage(variance, line.budgeted_minor_units).unwrap_or(0.0),
                is_external: freshness.is_some(),
                last_synced: freshness.and_then(|f| f.last_synced),
                sync_status: freshness.map(|f| f.sync_status),
            }
        })
        .collect()
}

/// One row of the recent-transaction feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTransaction {
    /// Record id
    pub id: String,
    /// Description text
    pub description: String,
    /// Amount in minor units (magnitude)
    pub amount: i64,
    /// Income or expense
    pub kind: TransactionKind,
    /// Economic date
    pub date: NaiveDate,
    /// Canonical category
    pub category: String,
    /// Workflow status
    pub status: RecordStatus,
    /// Whether the record came from the external system
    pub is_external: bool,
    /// Sync time for external records
    pub last_synced: Option<DateTime<Utc>>,
    /// Sync status for external records
    pub sync_status: Option<SyncStatus>,
    /// Set when the record is part of an unresolved ambiguous duplicate
    pub conflict: bool,
}

/// The `limit` most recent records, newest first.
#[must_use]
pub fn recent_transactions(records: &[FinancialRecord], limit: usize) -> Vec<RecentTransaction> {
    let mut ordered: Vec<&FinancialRecord> = records.iter().collect();
    ordered.sort_by(|a, b| recent_first(a, b));

    ordered
        .into_iter()
        .take(limit)
        .map(|record| {
            let meta = record.provenance.sync_meta();
            RecentTransaction {
                id: record.id.clone(),
                description: record.description.clone(),
                amount: record.amount_minor_units,
                kind: record.kind,
                date: record.date,
                category: record.category.clone(),
                status: record.status,
                is_external: record.is_external(),
                last_synced: meta.map(|m| m.synced_at),
                sync_status: meta.map(|m| m.sync_status),
                conflict: record.conflict,
            }
        })
        .collect()
}
