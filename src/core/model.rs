//! Canonical finance types shared by the normalizer, reconciler and aggregator.
//!
//! Amounts are always non-negative `i64` magnitudes in minor currency units; the
//! direction of money is carried by [`TransactionKind`], never by a sign.

use crate::errors::{Error, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Category assigned when a source omits the category or uses one we do not know.
pub const UNCATEGORISED: &str = "Uncategorised";

/// Direction of a financial record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money received by the building
    Income,
    /// Money paid out by the building
    Expense,
}

/// Workflow status of a canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Submitted, awaiting approval
    Pending,
    /// Approved but not yet settled
    Approved,
    /// Settled
    Completed,
    /// Past due and not settled
    Overdue,
}

/// Status bucket of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Issued, awaiting approval
    Pending,
    /// Approved for payment
    Approved,
    /// Past its due date
    Overdue,
}

/// Status reported by the external sync job.
///
/// Variants are declared in ascending severity so `Ord` gives the
/// `error > pending > in_progress > success` ordering directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Last sync completed cleanly
    Success,
    /// A sync is currently running
    InProgress,
    /// A sync is queued
    Pending,
    /// Last sync failed
    Error,
}

/// Sync metadata carried by every externally sourced item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    /// When the item was last written by the sync job
    pub synced_at: DateTime<Utc>,
    /// Status of that sync
    pub sync_status: SyncStatus,
}

/// Where a record came from. Sync metadata only exists on the external variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    /// Internally-owned ledger
    Local,
    /// Periodically synced property-management system
    External(SyncMeta),
}

impl Provenance {
    /// Whether this is the external source.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    /// Sync metadata, present only for external provenance.
    #[must_use]
    pub const fn sync_meta(&self) -> Option<&SyncMeta> {
        match self {
            Self::Local => None,
            Self::External(meta) => Some(meta),
        }
    }

    /// The bare source tag.
    #[must_use]
    pub const fn source(&self) -> SourceKind {
        match self {
            Self::Local => SourceKind::Local,
            Self::External(_) => SourceKind::External,
        }
    }
}

/// Bare source tag, used in diagnostics and availability reporting.
/// `Local` sorts before `External`, which is the recent-feed tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Local ledger
    Local,
    /// External sync store
    External,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Whether a source's fetch produced data for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceState {
    /// Fetch succeeded (possibly with no rows)
    Available,
    /// Fetch failed or timed out
    Unavailable {
        /// Failure description
        reason: String,
    },
}

impl SourceState {
    /// Whether the source contributed data.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Per-source fetch outcome for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceAvailability {
    /// Local ledger outcome
    pub local: SourceState,
    /// External sync store outcome
    pub external: SourceState,
}

impl SourceAvailability {
    /// Both sources answered.
    #[must_use]
    pub const fn all_available() -> Self {
        Self {
            local: SourceState::Available,
            external: SourceState::Available,
        }
    }

    /// True when at least one source is missing from the figures.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        !self.local.is_available() || !self.external.is_available()
    }

    /// Sources that failed, local first.
    #[must_use]
    pub fn failed_sources(&self) -> Vec<SourceKind> {
        [
            (SourceKind::Local, &self.local),
            (SourceKind::External, &self.external),
        ]
        .into_iter()
        .filter(|(_, state)| !state.is_available())
        .map(|(kind, _)| kind)
        .collect()
    }
}

/// Inclusive date range a request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    /// First day of the period
    pub start: NaiveDate,
    /// Last day of the period (inclusive)
    pub end: NaiveDate,
}

impl Period {
    /// Creates a period, rejecting ranges whose end precedes their start.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::invalid_request(format!(
                "period end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Creates the calendar-month period for `year`/`month`.
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::invalid_request(format!("invalid month {year}-{month:02}")))?;
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or_else(|| Error::invalid_request(format!("month {year}-{month:02} out of range")))?;
        Ok(Self { start, end })
    }

    /// Whether `date` falls inside the period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Budget period label: `YYYY-MM` for calendar months, `start..end` otherwise.
    #[must_use]
    pub fn label(&self) -> String {
        let is_calendar_month = self.start.day() == 1
            && self
                .start
                .checked_add_months(Months::new(1))
                .and_then(|next| next.pred_opt())
                == Some(self.end);
        if is_calendar_month {
            format!("{:04}-{:02}", self.start.year(), self.start.month())
        } else {
            format!("{}..{}", self.start, self.end)
        }
    }
}

impl FromStr for Period {
    type Err = Error;

    /// Parses `YYYY-MM` or `YYYY-MM-DD..YYYY-MM-DD`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((start, end)) = s.split_once("..") {
            let parse = |value: &str| {
                NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                    .map_err(|e| Error::invalid_request(format!("invalid date '{value}': {e}")))
            };
            return Self::new(parse(start)?, parse(end)?);
        }

        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| Error::invalid_request(format!("invalid period '{s}'")))?;
        let year = year
            .parse::<i32>()
            .map_err(|e| Error::invalid_request(format!("invalid period year '{year}': {e}")))?;
        let month = month
            .parse::<u32>()
            .map_err(|e| Error::invalid_request(format!("invalid period month '{month}': {e}")))?;
        Self::month(year, month)
    }
}

/// A validated engine request. Construction is the only place a hard error can occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinanceRequest {
    /// Building the figures are computed for
    pub building_id: String,
    /// Period the figures cover
    pub period: Period,
    /// Instant staleness is measured against
    pub as_of: DateTime<Utc>,
}

impl FinanceRequest {
    /// Validates and builds a request evaluated at the current instant.
    pub fn new(building_id: impl Into<String>, period: Period) -> Result<Self> {
        Self::at(building_id, period, Utc::now())
    }

    /// Validates and builds a request evaluated at `as_of`.
    pub fn at(building_id: impl Into<String>, period: Period, as_of: DateTime<Utc>) -> Result<Self> {
        let building_id: String = building_id.into();
        let building_id = building_id.trim().to_string();
        if building_id.is_empty() {
            return Err(Error::invalid_request("building id is required"));
        }
        // Re-validate in case the period was built field-by-field.
        let period = Period::new(period.start, period.end)?;
        Ok(Self {
            building_id,
            period,
            as_of,
        })
    }
}

/// Canonical record produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialRecord {
    /// Source-local identifier (the external id for external records)
    pub id: String,
    /// Building the record belongs to
    pub building_id: String,
    /// Income or expense
    pub kind: TransactionKind,
    /// Canonical category name
    pub category: String,
    /// Free-text description, empty when the source had none
    pub description: String,
    /// Non-negative magnitude in minor units
    pub amount_minor_units: i64,
    /// Economic date of the event
    pub date: NaiveDate,
    /// Originating source and its sync metadata
    pub provenance: Provenance,
    /// Link to the external system's id, if known
    pub external_id: Option<String>,
    /// Workflow status
    pub status: RecordStatus,
    /// Set by reconciliation when an ambiguous duplicate was retained
    pub conflict: bool,
}

impl FinancialRecord {
    /// Whether the record came from the external system.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        self.provenance.is_external()
    }
}

/// Canonical invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Source-local identifier
    pub id: String,
    /// Non-negative magnitude in minor units
    pub amount_minor_units: i64,
    /// Status bucket
    pub status: InvoiceStatus,
    /// When payment is due
    pub due_date: NaiveDate,
    /// Originating source
    pub provenance: Provenance,
    /// Link to the external system's id, if known
    pub external_id: Option<String>,
}

/// Canonical budget line for one category and period from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetLine {
    /// Canonical category name
    pub category: String,
    /// Period label the line applies to
    pub period: String,
    /// Budgeted amount in minor units
    pub budgeted_minor_units: i64,
    /// Actual amount in minor units
    pub actual_minor_units: i64,
    /// Originating source
    pub provenance: Provenance,
}

/// Kind of entity a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Ledger transaction
    Transaction,
    /// Invoice
    Invoice,
    /// Budget line
    BudgetLine,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction => write!(f, "transaction"),
            Self::Invoice => write!(f, "invoice"),
            Self::BudgetLine => write!(f, "budget line"),
        }
    }
}

/// Why a raw row could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "value", rename_all = "snake_case")]
pub enum DropReason {
    /// No amount on the row
    MissingAmount,
    /// No date on the row
    MissingDate,
    /// Amount below zero
    NegativeAmount(i64),
    /// Amount above the largest value the engine accepts
    AmountTooLarge(i64),
    /// Row did not decode into the source's row shape
    Undecodable(String),
    /// Kind/type value outside the source's mapping table
    UnknownKind(String),
    /// Status value outside the source's mapping table
    UnknownStatus(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAmount => write!(f, "missing amount"),
            Self::MissingDate => write!(f, "missing date"),
            Self::NegativeAmount(amount) => write!(f, "negative amount {amount}"),
            Self::AmountTooLarge(amount) => write!(f, "amount {amount} exceeds the accepted maximum"),
            Self::Undecodable(message) => write!(f, "undecodable row: {message}"),
            Self::UnknownKind(value) => write!(f, "unknown transaction type '{value}'"),
            Self::UnknownStatus(value) => write!(f, "unknown status '{value}'"),
        }
    }
}

/// How a local duplicate was linked to its external counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Local record carried the external id
    ExplicitLink,
    /// Exact (kind, amount, date, category) match
    Heuristic,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExplicitLink => write!(f, "explicit link"),
            Self::Heuristic => write!(f, "amount/date/category match"),
        }
    }
}

/// Non-fatal data-quality finding. Absorbed into diagnostics, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum DataIssue {
    /// Row missing required fields; excluded from every aggregate.
    #[error("{source_kind} {entity} '{record_id}' dropped: {reason}")]
    Malformed {
        /// Originating source
        source_kind: SourceKind,
        /// Entity type
        entity: EntityKind,
        /// Row identifier
        record_id: String,
        /// Why it was dropped
        reason: DropReason,
    },

    /// A collaborator fetch failed; totals cover the other source only.
    #[error("{source_kind} source unavailable: {reason}")]
    SourceUnavailable {
        /// Failed source
        source_kind: SourceKind,
        /// Failure description
        reason: String,
    },

    /// Records that look like the same event but disagree on amount. Both kept.
    #[error(
        "local '{local_id}' ({local_amount}) and external '{external_id}' ({external_amount}) may be the same event"
    )]
    AmbiguousDuplicate {
        /// Local record id
        local_id: String,
        /// External record id
        external_id: String,
        /// Local amount in minor units
        local_amount: i64,
        /// External amount in minor units
        external_amount: i64,
    },

    /// Local record replaced by the external record for the same event.
    #[error("{entity} local '{local_id}' superseded by external '{external_id}' ({rule})")]
    Superseded {
        /// Entity type
        entity: EntityKind,
        /// Local record id
        local_id: String,
        /// External record id that was retained
        external_id: String,
        /// Which reconciliation key matched
        rule: MatchRule,
        /// External minus local amount; non-zero only for explicit links
        amount_delta: i64,
    },

    /// An older copy of an external row replaced by a later sync.
    #[error("external {entity} '{external_id}' synced at {stale_synced_at} replaced by a later sync")]
    StaleSync {
        /// Entity type
        entity: EntityKind,
        /// External id present more than once
        external_id: String,
        /// Sync time of the discarded copy
        stale_synced_at: DateTime<Utc>,
    },

    /// Row dated outside the requested period.
    #[error("{source_kind} record '{record_id}' dated {date} is outside the period")]
    OutOfPeriod {
        /// Originating source
        source_kind: SourceKind,
        /// Row identifier
        record_id: String,
        /// Row date
        date: NaiveDate,
    },

    /// Same id returned twice by one local source; later copy ignored.
    #[error("{source_kind} {entity} id '{record_id}' appears more than once")]
    DuplicateId {
        /// Originating source
        source_kind: SourceKind,
        /// Entity type
        entity: EntityKind,
        /// Repeated id
        record_id: String,
    },
}

/// Ordered list of data issues collected during one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Issues in the order they were found
    pub issues: Vec<DataIssue>,
}

impl Diagnostics {
    /// Records one issue.
    pub fn push(&mut self, issue: DataIssue) {
        self.issues.push(issue);
    }

    /// Appends every issue from `other`.
    pub fn extend(&mut self, other: Self) {
        self.issues.extend(other.issues);
    }

    /// Whether nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Number of dropped rows.
    #[must_use]
    pub fn malformed_count(&self) -> usize {
        self.count(|issue| matches!(issue, DataIssue::Malformed { .. }))
    }

    /// Number of ambiguous duplicates retained with a conflict flag.
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.count(|issue| matches!(issue, DataIssue::AmbiguousDuplicate { .. }))
    }

    /// Number of local rows superseded by external ones.
    #[must_use]
    pub fn superseded_count(&self) -> usize {
        self.count(|issue| matches!(issue, DataIssue::Superseded { .. }))
    }

    fn count(&self, predicate: impl Fn(&DataIssue) -> bool) -> usize {
        self.issues.iter().filter(|issue| predicate(issue)).count()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_sync_status_severity_order() {
        assert!(SyncStatus::Error > SyncStatus::Pending);
        assert!(SyncStatus::Pending > SyncStatus::InProgress);
        assert!(SyncStatus::InProgress > SyncStatus::Success);
    }

    #[test]
    fn test_month_period_bounds() {
        let period = Period::month(2025, 2).unwrap();
        assert_eq!(period.start, date("2025-02-01"));
        assert_eq!(period.end, date("2025-02-28"));
        assert_eq!(period.label(), "2025-02");

        let december = Period::month(2024, 12).unwrap();
        assert_eq!(december.end, date("2024-12-31"));
    }

    #[test]
    fn test_invalid_month_rejected() {
        assert!(matches!(
            Period::month(2025, 13),
            Err(Error::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_inverted_period_rejected() {
        let result = Period::new(date("2025-04-30"), date("2025-04-01"));
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));
    }

    #[test]
    fn test_custom_period_label_and_contains() {
        let period = Period::new(date("2025-04-10"), date("2025-05-09")).unwrap();
        assert_eq!(period.label(), "2025-04-10..2025-05-09");
        assert!(period.contains(date("2025-04-10")));
        assert!(period.contains(date("2025-05-09")));
        assert!(!period.contains(date("2025-05-10")));
    }

    #[test]
    fn test_period_from_str() {
        assert_eq!("2025-04".parse::<Period>().unwrap(), Period::month(2025, 4).unwrap());
        let range: Period = "2025-01-01..2025-03-31".parse().unwrap();
        assert_eq!(range.start, date("2025-01-01"));
        assert_eq!(range.end, date("2025-03-31"));
        assert!("April".parse::<Period>().is_err());
    }

    #[test]
    fn test_request_requires_building_id() {
        let period = Period::month(2025, 4).unwrap();
        assert!(matches!(
            FinanceRequest::new("   ", period),
            Err(Error::InvalidRequest { .. })
        ));
        assert_eq!(FinanceRequest::new(" b-1 ", period).unwrap().building_id, "b-1");
    }

    #[test]
    fn test_request_rejects_hand_built_inverted_period() {
        let period = Period {
            start: date("2025-05-01"),
            end: date("2025-04-01"),
        };
        assert!(FinanceRequest::new("b-1", period).is_err());
    }

    #[test]
    fn test_provenance_sync_meta_only_on_external() {
        assert!(Provenance::Local.sync_meta().is_none());
        let external = Provenance::External(SyncMeta {
            synced_at: Utc::now(),
            sync_status: SyncStatus::Success,
        });
        assert!(external.is_external());
        assert_eq!(external.source(), SourceKind::External);
    }

    #[test]
    fn test_diagnostic_counts() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(DataIssue::Malformed {
            source_kind: SourceKind::Local,
            entity: EntityKind::Transaction,
            record_id: "1".into(),
            reason: DropReason::MissingAmount,
        });
        diagnostics.push(DataIssue::AmbiguousDuplicate {
            local_id: "1".into(),
            external_id: "X".into(),
            local_amount: 10,
            external_amount: 12,
        });
        assert_eq!(diagnostics.malformed_count(), 1);
        assert_eq!(diagnostics.conflict_count(), 1);
        assert_eq!(diagnostics.superseded_count(), 0);
        assert_eq!(
            diagnostics.issues[0].to_string(),
            "local transaction '1' dropped: missing amount"
        );
    }
}
