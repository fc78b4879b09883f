//! Dashboard generation - fans out to both stores, then reconciles and aggregates.
//!
//! The only suspension points are the two store queries, which run concurrently. Once
//! both have resolved (or failed, or timed out) everything else is synchronous. A failed
//! source never aborts the run: the dashboard is built from whatever arrived and is
//! flagged `partial`.

use crate::{
    config::engine::EngineConfig,
    core::{
        aggregate::{self, BudgetComparison, FinancialSummary, RecentTransaction},
        model::{
            DataIssue, Diagnostics, FinanceRequest, SourceAvailability, SourceKind, SourceState,
        },
        normalize::{self, CategoryMap, NormalizedSource},
        reconcile,
        source::{ExternalSnapshot, ExternalSyncStore, LocalSnapshot, LocalStore},
        staleness,
    },
    errors::{Error, Result},
};
use serde::Serialize;
use std::{future::Future, time::Duration};
use tracing::{info, warn};

/// Everything the presentation layer needs for the finance page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialDashboard {
    /// Headline totals
    pub summary: FinancialSummary,
    /// Budget versus actual per category
    pub budget_comparisons: Vec<BudgetComparison>,
    /// Newest transactions first
    pub recent_transactions: Vec<RecentTransaction>,
    /// Data-quality findings behind the "partial data" / "sync error" badges
    pub diagnostics: Diagnostics,
}

/// Awaits `fetch`, converting a timeout into [`Error::SourceUnavailable`].
async fn fetch_with_timeout<T>(
    source: SourceKind,
    timeout: Duration,
    fetch: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, fetch)
        .await
        .unwrap_or_else(|_| {
            Err(Error::SourceUnavailable {
                source_name: source.to_string(),
                message: format!("no response within {}s", timeout.as_secs()),
            })
        })
}

/// Queries both stores concurrently and builds the dashboard for `request`.
///
/// Dropping the returned future cancels both fetches; nothing is held between calls.
pub async fn generate_financial_dashboard<L, E>(
    local: &L,
    external: &E,
    request: &FinanceRequest,
    config: &EngineConfig,
) -> FinancialDashboard
where
    L: LocalStore + Sync,
    E: ExternalSyncStore + Sync,
{
    let timeout = config.fetch_timeout();
    info!(
        "Generating finance dashboard for building {} ({})",
        request.building_id,
        request.period.label()
    );

    let (local_result, external_result) = tokio::join!(
        fetch_with_timeout(
            SourceKind::Local,
            timeout,
            local.query(&request.building_id, &request.period),
        ),
        fetch_with_timeout(
            SourceKind::External,
            timeout,
            external.query(&request.building_id, &request.period),
        ),
    );

    assemble_dashboard(request, local_result, external_result, config)
}

fn source_state<T>(
    source: SourceKind,
    result: &Result<T>,
    diagnostics: &mut Diagnostics,
) -> SourceState {
    match result {
        Ok(_) => SourceState::Available,
        Err(e) => {
            warn!("Continuing without {source} data: {e}");
            let reason = e.to_string();
            diagnostics.push(DataIssue::SourceUnavailable {
                source_kind: source,
                reason: reason.clone(),
            });
            SourceState::Unavailable { reason }
        }
    }
}

/// Builds the dashboard from already-fetched snapshots. Pure and synchronous.
#[must_use]
pub fn assemble_dashboard(
    request: &FinanceRequest,
    local: Result<LocalSnapshot>,
    external: Result<ExternalSnapshot>,
    config: &EngineConfig,
) -> FinancialDashboard {
    let categories = CategoryMap::from_config(&config.categories);
    let mut diagnostics = Diagnostics::default();

    let source_availability = SourceAvailability {
        local: source_state(SourceKind::Local, &local, &mut diagnostics),
        external: source_state(SourceKind::External, &external, &mut diagnostics),
    };

    let local = local
        .map(|snapshot| normalize::normalize_local_snapshot(snapshot, &categories))
        .unwrap_or_default();
    let (external, entity_states) = match external {
        Ok(mut snapshot) => {
            let states = std::mem::take(&mut snapshot.sync_status_by_entity_type);
            (normalize::normalize_external_snapshot(snapshot, &categories), states)
        }
        Err(_) => (NormalizedSource::default(), Default::default()),
    };
    diagnostics.extend(local.diagnostics);
    diagnostics.extend(external.diagnostics);

    let records = reconcile::reconcile(&local.records, &external.records, &request.period);
    let invoices = reconcile::reconcile_invoices(&local.invoices, &external.invoices);
    let budgets = reconcile::merge_budget_lines(
        &local.budget_lines,
        &external.budget_lines,
        &request.period.label(),
    );
    diagnostics.extend(records.diagnostics);
    diagnostics.extend(invoices.diagnostics);

    let tracked = staleness::track(
        records
            .items
            .iter()
            .map(|record| &record.provenance)
            .chain(invoices.items.iter().map(|invoice| &invoice.provenance)),
    );
    let freshness = staleness::with_entity_states(tracked, &entity_states);
    let is_stale = staleness::is_stale(freshness.as_ref(), request.as_of, config.stale_after());

    let summary = aggregate::summarize(
        &records.items,
        &invoices.items,
        freshness,
        is_stale,
        source_availability,
    );
    let budget_comparisons = aggregate::compare_budgets(&budgets);
    let recent_transactions =
        aggregate::recent_transactions(&records.items, config.recent_transaction_limit);

    info!(
        "Dashboard for {}: income {} expense {} net {} ({} records, {} issues, partial={})",
        request.building_id,
        summary.total_income,
        summary.total_expense,
        summary.net_position,
        summary.record_count,
        diagnostics.issues.len(),
        summary.partial
    );

    FinancialDashboard {
        summary,
        budget_comparisons,
        recent_transactions,
        diagnostics,
    }
}
