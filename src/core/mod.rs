/// Canonical domain types, requests and diagnostics
pub mod model;
/// Raw per-source rows and the store contracts
pub mod source;
/// Vocabulary and category mapping into canonical records
pub mod normalize;
/// Cross-source dedup and merge
pub mod reconcile;
/// Sync freshness annotation
pub mod staleness;
/// Totals, budget comparisons and the recent feed
pub mod aggregate;
/// Fan-out, fan-in orchestration of a dashboard request
pub mod dashboard;
/// Currency and percentage formatting for display
pub mod report;
