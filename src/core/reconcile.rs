//! Reconciliation engine - merges local and external rows into one deduplicated set.
//!
//! Matching runs in three passes over the local rows, in id order:
//!
//! 1. explicit link: the local row carries the external id of a synced row;
//! 2. heuristic: exact `(kind, amount, date, category)` match with an unclaimed external row;
//! 3. conflict: same `(kind, date, category, description)` but a different amount.
//!
//! Passes 1 and 2 keep the external row and report the local one as superseded. Pass 3
//! keeps both and flags them. Every external row absorbs at most one local row.
//! All functions here are pure: the same inputs always give the same output.

use crate::core::model::{
    BudgetLine, DataIssue, Diagnostics, EntityKind, FinancialRecord, Invoice, MatchRule, Period,
    Provenance, SourceKind, TransactionKind,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};
use tracing::{debug, info, warn};

/// Output of a reconciliation pass: the unified items and what happened to the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled<T> {
    /// Deduplicated items
    pub items: Vec<T>,
    /// Superseded, conflicting and out-of-period findings
    pub diagnostics: Diagnostics,
}

/// Budget totals for one canonical category, summed across both sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBudget {
    /// Canonical category name
    pub category: String,
    /// Sum of budgeted amounts
    pub budgeted_minor_units: i64,
    /// Sum of actual amounts
    pub actual_minor_units: i64,
    /// Provenance of every line that contributed
    pub contributors: Vec<Provenance>,
}

/// Rows that can be linked to an external counterpart by id.
trait Linkable: Clone {
    const ENTITY: EntityKind;

    fn id(&self) -> &str;
    fn link(&self) -> Option<&str>;
    fn provenance(&self) -> &Provenance;
    fn amount(&self) -> i64;
}

impl Linkable for FinancialRecord {
    const ENTITY: EntityKind = EntityKind::Transaction;

    fn id(&self) -> &str {
        &self.id
    }
    fn link(&self) -> Option<&str> {
        self.external_id.as_deref()
    }
    fn provenance(&self) -> &Provenance {
        &self.provenance
    }
    fn amount(&self) -> i64 {
        self.amount_minor_units
    }
}

impl Linkable for Invoice {
    const ENTITY: EntityKind = EntityKind::Invoice;

    fn id(&self) -> &str {
        &self.id
    }
    fn link(&self) -> Option<&str> {
        self.external_id.as_deref()
    }
    fn provenance(&self) -> &Provenance {
        &self.provenance
    }
    fn amount(&self) -> i64 {
        self.amount_minor_units
    }
}

fn synced_at(provenance: &Provenance) -> Option<DateTime<Utc>> {
    provenance.sync_meta().map(|meta| meta.synced_at)
}

/// Keeps the most recently synced copy of every external id.
fn latest_external<T: Linkable>(items: &[T], diagnostics: &mut Diagnostics) -> BTreeMap<String, T> {
    let mut latest: BTreeMap<String, T> = BTreeMap::new();
    for item in items {
        let Some(existing) = latest.get(item.id()) else {
            latest.insert(item.id().to_string(), item.clone());
            continue;
        };

        let (kept, stale) = if synced_at(item.provenance()) > synced_at(existing.provenance()) {
            (item.clone(), existing.clone())
        } else {
            (existing.clone(), item.clone())
        };
        if let Some(stale_synced_at) = synced_at(stale.provenance()) {
            diagnostics.push(DataIssue::StaleSync {
                entity: T::ENTITY,
                external_id: stale.id().to_string(),
                stale_synced_at,
            });
        }
        latest.insert(kept.id().to_string(), kept);
    }
    latest
}

/// Keeps the first copy of every local id.
fn unique_local<T: Linkable>(items: &[T], diagnostics: &mut Diagnostics) -> BTreeMap<String, T> {
    let mut unique: BTreeMap<String, T> = BTreeMap::new();
    for item in items {
        if unique.contains_key(item.id()) {
            diagnostics.push(DataIssue::DuplicateId {
                source_kind: SourceKind::Local,
                entity: T::ENTITY,
                record_id: item.id().to_string(),
            });
        } else {
            unique.insert(item.id().to_string(), item.clone());
        }
    }
    unique
}

/// Removes local rows whose explicit link names a present external row.
fn apply_explicit_links<T: Linkable>(
    locals: &mut BTreeMap<String, T>,
    externals: &BTreeMap<String, T>,
    claimed: &mut BTreeSet<String>,
    diagnostics: &mut Diagnostics,
) {
    let mut superseded = Vec::new();
    for (local_id, local) in locals.iter() {
        let Some(link) = local.link() else { continue };
        let Some(external) = externals.get(link) else {
            debug!("Local {} '{local_id}' links to '{link}' which is not in this sync", T::ENTITY);
            continue;
        };
        if !claimed.insert(link.to_string()) {
            // Another local row already owns this external row; keep this one.
            warn!("External {} '{link}' is linked from more than one local row", T::ENTITY);
            continue;
        }

        let amount_delta = external.amount().saturating_sub(local.amount());
        if amount_delta != 0 {
            warn!(
                "Linked {} '{local_id}' and '{link}' disagree by {amount_delta}; external kept",
                T::ENTITY
            );
        }
        diagnostics.push(DataIssue::Superseded {
            entity: T::ENTITY,
            local_id: local_id.clone(),
            external_id: link.to_string(),
            rule: MatchRule::ExplicitLink,
            amount_delta,
        });
        superseded.push(local_id.clone());
    }

    for id in superseded {
        locals.remove(&id);
    }
}

/// Orders records for the recent feed: newest first, local before external, then id.
#[must_use]
pub fn recent_first(a: &FinancialRecord, b: &FinancialRecord) -> Ordering {
    b.date
        .cmp(&a.date)
        .then_with(|| a.provenance.source().cmp(&b.provenance.source()))
        .then_with(|| compare_ids(&a.id, &b.id))
}

/// Ascending id order. Integer ids compare by value and sort ahead of non-integer ids,
/// which compare as text.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

type StrongKey = (TransactionKind, i64, NaiveDate, String);
type WeakKey = (TransactionKind, NaiveDate, String, String);

fn strong_key(record: &FinancialRecord) -> StrongKey {
    (
        record.kind,
        record.amount_minor_units,
        record.date,
        record.category.clone(),
    )
}

/// `None` when the description is blank; blank descriptions never signal a conflict.
fn weak_key(record: &FinancialRecord) -> Option<WeakKey> {
    let description = record.description.trim().to_lowercase();
    if description.is_empty() {
        return None;
    }
    Some((record.kind, record.date, record.category.clone(), description))
}

/// Merges normalized local and external transactions for `period`.
///
/// Records dated outside the period are excluded. The returned set contains at most
/// one record per matched event and is sorted with [`recent_first`].
#[must_use]
pub fn reconcile(
    local: &[FinancialRecord],
    external: &[FinancialRecord],
    period: &Period,
) -> Reconciled<FinancialRecord> {
    let mut diagnostics = Diagnostics::default();

    let mut in_period = |records: &[FinancialRecord]| -> Vec<FinancialRecord> {
        records
            .iter()
            .filter(|record| {
                let keep = period.contains(record.date);
                if !keep {
                    diagnostics.push(DataIssue::OutOfPeriod {
                        source_kind: record.provenance.source(),
                        record_id: record.id.clone(),
                        date: record.date,
                    });
                }
                keep
            })
            .cloned()
            .collect()
    };
    let local = in_period(local);
    let external = in_period(external);

    let mut externals = latest_external(external.as_slice(), &mut diagnostics);
    let mut locals = unique_local(local.as_slice(), &mut diagnostics);
    let mut claimed = BTreeSet::new();

    apply_explicit_links(&mut locals, &externals, &mut claimed, &mut diagnostics);

    // Heuristic pass. Linked locals whose target is absent are left alone.
    let mut by_strong_key: BTreeMap<StrongKey, Vec<String>> = BTreeMap::new();
    for (id, record) in &externals {
        if !claimed.contains(id) {
            by_strong_key.entry(strong_key(record)).or_default().push(id.clone());
        }
    }

    let mut superseded = Vec::new();
    for (local_id, record) in &locals {
        if record.external_id.is_some() {
            continue;
        }
        let Some(candidates) = by_strong_key.get_mut(&strong_key(record)) else {
            continue;
        };
        if candidates.is_empty() {
            continue;
        }
        let external_id = candidates.remove(0);
        debug!("Local transaction '{local_id}' matches external '{external_id}'");
        claimed.insert(external_id.clone());
        diagnostics.push(DataIssue::Superseded {
            entity: EntityKind::Transaction,
            local_id: local_id.clone(),
            external_id,
            rule: MatchRule::Heuristic,
            amount_delta: 0,
        });
        superseded.push(local_id.clone());
    }
    for id in superseded {
        locals.remove(&id);
    }

    // Conflict pass: same described event, different amount. Both rows stay.
    let mut by_weak_key: BTreeMap<WeakKey, Vec<String>> = BTreeMap::new();
    for (id, record) in &externals {
        if claimed.contains(id) {
            continue;
        }
        if let Some(key) = weak_key(record) {
            by_weak_key.entry(key).or_default().push(id.clone());
        }
    }

    for (local_id, record) in &mut locals {
        if record.external_id.is_some() {
            continue;
        }
        let Some(key) = weak_key(record) else { continue };
        let Some(candidates) = by_weak_key.get_mut(&key) else {
            continue;
        };
        if candidates.is_empty() {
            continue;
        }
        let external_id = candidates.remove(0);
        let Some(external_record) = externals.get_mut(&external_id) else {
            continue;
        };

        warn!(
            "Local transaction '{local_id}' ({}) and external '{external_id}' ({}) look like the same event",
            record.amount_minor_units, external_record.amount_minor_units
        );
        record.conflict = true;
        external_record.conflict = true;
        diagnostics.push(DataIssue::AmbiguousDuplicate {
            local_id: local_id.clone(),
            external_id,
            local_amount: record.amount_minor_units,
            external_amount: external_record.amount_minor_units,
        });
    }

    let mut items: Vec<FinancialRecord> = locals.into_values().chain(externals.into_values()).collect();
    items.sort_by(recent_first);

    info!(
        "Reconciled {} local and {} external transactions into {} ({} superseded, {} conflicts)",
        local.len(),
        external.len(),
        items.len(),
        diagnostics.superseded_count(),
        diagnostics.conflict_count()
    );

    Reconciled { items, diagnostics }
}

/// Merges local and external invoices. Only explicit links are used to match invoices.
#[must_use]
pub fn reconcile_invoices(local: &[Invoice], external: &[Invoice]) -> Reconciled<Invoice> {
    let mut diagnostics = Diagnostics::default();

    let externals = latest_external(external, &mut diagnostics);
    let mut locals = unique_local(local, &mut diagnostics);
    let mut claimed = BTreeSet::new();
    apply_explicit_links(&mut locals, &externals, &mut claimed, &mut diagnostics);

    let mut items: Vec<Invoice> = locals.into_values().chain(externals.into_values()).collect();
    items.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.provenance.source().cmp(&b.provenance.source()))
            .then_with(|| a.id.cmp(&b.id))
    });

    Reconciled { items, diagnostics }
}

/// Sums budget lines per canonical category across both sources.
///
/// Lines for a different period label are ignored. Categories come back in name order.
#[must_use]
pub fn merge_budget_lines(
    local: &[BudgetLine],
    external: &[BudgetLine],
    period_label: &str,
) -> Vec<CategoryBudget> {
    let mut merged: BTreeMap<String, CategoryBudget> = BTreeMap::new();

    for line in local.iter().chain(external) {
        if line.period != period_label {
            debug!(
                "Skipping {} budget line for '{}' in period {}",
                line.provenance.source(),
                line.category,
                line.period
            );
            continue;
        }
        let entry = merged
            .entry(line.category.clone())
            .or_insert_with(|| CategoryBudget {
                category: line.category.clone(),
                budgeted_minor_units: 0,
                actual_minor_units: 0,
                contributors: Vec::new(),
            });
        entry.budgeted_minor_units = entry
            .budgeted_minor_units
            .saturating_add(line.budgeted_minor_units);
        entry.actual_minor_units = entry.actual_minor_units.saturating_add(line.actual_minor_units);
        entry.contributors.push(line.provenance);
    }

    merged.into_values().collect()
}
