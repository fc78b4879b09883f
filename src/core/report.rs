//! Presentation helpers for dashboard output.
//!
//! The engine works in integer minor units and unrounded percentages. This module is
//! the only place amounts become currency strings and percentages get rounded, so a
//! figure is never rounded twice on its way to the screen.

use crate::core::{
    aggregate::{BudgetComparison, FinancialSummary, RecentTransaction, percentage},
    model::{SourceKind, SyncStatus, TransactionKind},
};

/// Rounds a percentage to one decimal place for display.
#[must_use]
pub fn round_percentage(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Formats an optional percentage, `"n/a"` when undefined.
#[must_use]
pub fn format_percentage(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}%", round_percentage(v)))
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

/// Formats minor units as currency, e.g. `-£1,234.50`.
///
/// # Arguments
/// * `amount` - Amount in minor units (hundredths)
/// * `symbol` - Currency symbol placed before the digits
#[must_use]
pub fn format_minor_units(amount: i64, symbol: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let magnitude = amount.unsigned_abs();
    let major = group_thousands(magnitude / 100);
    let minor = magnitude % 100;
    format!("{sign}{symbol}{major}.{minor:02}")
}

/// Formats a transaction amount with a sign taken from its kind.
///
/// # Returns
/// Formatted string like "+£50.00" for income or "-£25.50" for an expense
#[must_use]
pub fn format_transaction_amount(kind: TransactionKind, amount: i64, symbol: &str) -> String {
    let sign = match kind {
        TransactionKind::Income => '+',
        TransactionKind::Expense => '-',
    };
    format!("{sign}{}", format_minor_units(amount.abs(), symbol))
}

/// Generates a progress bar string for visual representation.
///
/// Creates a text-based bar like: `[████████░░] 80.0%`. The bar is clamped to
/// 0-100 but the printed figure is not, so overspend stays visible.
#[must_use]
pub fn format_progress_bar(progress_percent: f64, bar_length: usize) -> String {
    let clamped_progress = progress_percent.clamp(0.0, 100.0);

    // clamped_progress is in [0, 100] and bar_length is small, so the product fits.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((clamped_progress / 100.0) * bar_length as f64).round() as usize;
    let empty = bar_length.saturating_sub(filled);

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        round_percentage(progress_percent)
    )
}

/// One line per budget category: spend against budget, usage bar and variance.
#[must_use]
pub fn format_budget_line(budget: &BudgetComparison, symbol: &str) -> String {
    let usage = percentage(budget.actual, budget.budgeted).unwrap_or(0.0);
    let variance_sign = if budget.variance > 0 { "+" } else { "" };
    let mut line = format!(
        "{}: {} of {} {} ({variance_sign}{})",
        budget.category,
        format_minor_units(budget.actual, symbol),
        format_minor_units(budget.budgeted, symbol),
        format_progress_bar(usage, 10),
        format_minor_units(budget.variance, symbol),
    );
    if budget.sync_status == Some(SyncStatus::Error) {
        line.push_str(" [sync error]");
    }
    line
}

/// Generates a summary line for a feed entry.
#[must_use]
pub fn format_transaction_summary(transaction: &RecentTransaction, symbol: &str) -> String {
    let amount = format_transaction_amount(transaction.kind, transaction.amount, symbol);
    let mut line = format!(
        "{} | {amount} | {} | {}",
        transaction.date, transaction.category, transaction.description
    );
    if transaction.is_external {
        line.push_str(" [external]");
    }
    if transaction.conflict {
        line.push_str(" [conflict]");
    }
    line
}

/// Badges explaining why the figures may be incomplete or out of date.
#[must_use]
pub fn summary_badges(summary: &FinancialSummary) -> Vec<String> {
    let mut badges = Vec::new();
    if summary.partial {
        let failed: Vec<String> = summary
            .source_availability
            .failed_sources()
            .iter()
            .map(SourceKind::to_string)
            .collect();
        badges.push(format!("partial data: {} unavailable", failed.join(", ")));
    }
    if summary.external_sync_status == Some(SyncStatus::Error) {
        badges.push("sync error".to_string());
    }
    if summary.is_stale {
        if let Some(last) = summary.last_external_sync {
            badges.push(format!("stale: last synced {}", last.format("%Y-%m-%d %H:%M UTC")));
        }
    }
    badges
}

/// Human-readable rendition of the headline figures.
#[must_use]
pub fn format_summary(summary: &FinancialSummary, symbol: &str) -> Vec<String> {
    let mut lines = vec![
        format!("Income: {}", format_minor_units(summary.total_income, symbol)),
        format!("Expenses: {}", format_minor_units(summary.total_expense, symbol)),
        format!("Net position: {}", format_minor_units(summary.net_position, symbol)),
        format!(
            "Outstanding invoices: {} ({})",
            format_minor_units(summary.outstanding_invoices, symbol),
            summary.outstanding_invoice_count
        ),
        format!(
            "Overdue payments: {} ({})",
            format_minor_units(summary.overdue_payments, symbol),
            summary.overdue_invoice_count
        ),
        format!("Collection rate: {}", format_percentage(summary.collection_rate)),
        format!(
            "External data: {}",
            format_percentage(Some(summary.external_data_percentage))
        ),
    ];
    lines.extend(summary_badges(summary).into_iter().map(|badge| format!("[{badge}]")));
    lines
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{
        aggregate::summarize,
        model::{Provenance, RecordStatus, SourceAvailability, SourceState},
        staleness::Freshness,
    };
    use crate::test_utils::*;

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(0, "£"), "£0.00");
        assert_eq!(format_minor_units(5, "£"), "£0.05");
        assert_eq!(format_minor_units(100_000, "£"), "£1,000.00");
        assert_eq!(format_minor_units(123_456_789, "$"), "$1,234,567.89");
        assert_eq!(format_minor_units(-50_050, "£"), "-£500.50");
    }

    #[test]
    fn test_format_transaction_amount() {
        assert_eq!(format_transaction_amount(TransactionKind::Income, 5_000, "£"), "+£50.00");
        assert_eq!(format_transaction_amount(TransactionKind::Expense, 2_550, "£"), "-£25.50");
    }

    #[test]
    fn test_round_percentage() {
        assert_eq!(round_percentage(33.333_333), 33.3);
        assert_eq!(round_percentage(66.666_666), 66.7);
        assert_eq!(format_percentage(Some(75.0)), "75.0%");
        assert_eq!(format_percentage(None), "n/a");
    }

    #[test]
    fn test_format_progress_bar_half() {
        assert_eq!(format_progress_bar(50.0, 10), "[█████░░░░░] 50.0%");
    }

    #[test]
    fn test_format_progress_bar_overspent_is_clamped() {
        assert_eq!(format_progress_bar(150.0, 10), "[██████████] 150.0%");
        assert_eq!(format_progress_bar(-25.0, 10), "[░░░░░░░░░░] -25.0%");
    }

    #[test]
    fn test_format_budget_line() {
        let budget = BudgetComparison {
            category: "Insurance".to_string(),
            budgeted: 10_000,
            actual: 15_000,
            variance: 5_000,
            variance_percentage: 50.0,
            is_external: false,
            last_synced: None,
            sync_status: None,
        };

        assert_eq!(
            format_budget_line(&budget, "£"),
            "Insurance: £150.00 of £100.00 [██████████] 150.0% (+£50.00)"
        );
    }

    #[test]
    fn test_format_budget_line_with_zero_budget() {
        let budget = BudgetComparison {
            category: "Cleaning".to_string(),
            budgeted: 0,
            actual: 0,
            variance: 0,
            variance_percentage: 0.0,
            is_external: true,
            last_synced: Some(utc(DEFAULT_SYNCED_AT)),
            sync_status: Some(SyncStatus::Error),
        };

        assert_eq!(
            format_budget_line(&budget, "£"),
            "Cleaning: £0.00 of £0.00 [░░░░░░░░░░] 0.0% (£0.00) [sync error]"
        );
    }

    #[test]
    fn test_format_transaction_summary() {
        let entry = RecentTransaction {
            id: "X1".to_string(),
            description: "Lift repair".to_string(),
            amount: 12_500,
            kind: TransactionKind::Expense,
            date: date("2025-04-10"),
            category: "Repairs & Maintenance".to_string(),
            status: RecordStatus::Completed,
            is_external: true,
            last_synced: Some(utc(DEFAULT_SYNCED_AT)),
            sync_status: Some(SyncStatus::Success),
            conflict: true,
        };

        assert_eq!(
            format_transaction_summary(&entry, "£"),
            "2025-04-10 | -£125.00 | Repairs & Maintenance | Lift repair [external] [conflict]"
        );
    }

    #[test]
    fn test_summary_badges_for_partial_and_stale() {
        let availability = SourceAvailability {
            local: SourceState::Available,
            external: SourceState::Unavailable {
                reason: "timeout".to_string(),
            },
        };
        let freshness = Freshness {
            last_synced: Some(utc("2025-04-01T09:30:00Z")),
            sync_status: SyncStatus::Error,
        };

        let summary = summarize(&[], &[], Some(freshness), true, availability);

        assert_eq!(
            summary_badges(&summary),
            vec![
                "partial data: external unavailable".to_string(),
                "sync error".to_string(),
                "stale: last synced 2025-04-01 09:30 UTC".to_string(),
            ]
        );
    }

    #[test]
    fn test_format_summary() {
        let records = vec![
            local_record("L1", TransactionKind::Income, 100_000, "2025-04-01", "Service Charges"),
            local_record("L2", TransactionKind::Expense, 40_000, "2025-04-02", "Insurance"),
        ];
        let invoices = vec![invoice(
            "I1",
            25_000,
            crate::core::model::InvoiceStatus::Overdue,
            "2025-03-01",
            Provenance::Local,
        )];

        let summary = summarize(&records, &invoices, None, false, SourceAvailability::all_available());
        let lines = format_summary(&summary, "£");

        assert_eq!(
            lines,
            vec![
                "Income: £1,000.00",
                "Expenses: £400.00",
                "Net position: £600.00",
                "Outstanding invoices: £0.00 (0)",
                "Overdue payments: £250.00 (1)",
                "Collection rate: 100.0%",
                "External data: 0.0%",
            ]
        );
    }
}
