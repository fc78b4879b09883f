//! External sync store backed by a JSON export of the sync tables.
//!
//! The sync job writes one file keyed by building id:
//!
//! ```json
//! { "b-1": { "transactions": [...], "invoices": [...], "budget_lines": [...],
//!            "sync_status_by_entity_type": { "transactions": { "status": "success", ... } } } }
//! ```
//!
//! The file is re-read on every query so a fresh export is picked up without a restart.
//! Rows are decoded one at a time: a row that does not fit its table's shape is set
//! aside as a [`RejectedRow`] and the rest of the export is still used. Only a file that
//! cannot be read, or is not a JSON object keyed by building, makes the source unavailable.

use crate::{
    core::{
        model::{EntityKind, Period},
        source::{EntitySyncState, ExternalSnapshot, ExternalSyncStore, RejectedRow},
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// [`ExternalSyncStore`] reading a JSON export from disk.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    /// Creates a store reading from `path`. The file is not touched until the first query.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the export file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, message: impl std::fmt::Display) -> Error {
        Error::SourceUnavailable {
            source_name: "external".to_string(),
            message: format!("{}: {message}", self.path.display()),
        }
    }
}

/// One building's entry in the export, rows still undecoded.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BuildingExport {
    transactions: Vec<Value>,
    invoices: Vec<Value>,
    budget_lines: Vec<Value>,
    sync_status_by_entity_type: BTreeMap<String, Value>,
}

impl BuildingExport {
    /// Drops rows that belong to another period. A row whose date or period label
    /// cannot be read is kept so it surfaces downstream. Invoices are never narrowed.
    fn narrow_to_period(&mut self, period: &Period) {
        let label = period.label();
        self.transactions.retain(|row| {
            row.get("transaction_date")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse::<NaiveDate>().ok())
                .is_none_or(|on| period.contains(on))
        });
        self.budget_lines.retain(|row| {
            row.get("period")
                .and_then(Value::as_str)
                .is_none_or(|value| value == label)
        });
    }

    fn decode(self) -> ExternalSnapshot {
        let mut rejected = Vec::new();
        let transactions = decode_rows(self.transactions, EntityKind::Transaction, &mut rejected);
        let invoices = decode_rows(self.invoices, EntityKind::Invoice, &mut rejected);
        let budget_lines = decode_rows(self.budget_lines, EntityKind::BudgetLine, &mut rejected);

        let mut sync_status_by_entity_type = BTreeMap::new();
        for (entity_type, state) in self.sync_status_by_entity_type {
            match serde_json::from_value::<EntitySyncState>(state) {
                Ok(state) => {
                    sync_status_by_entity_type.insert(entity_type, state);
                }
                Err(e) => warn!("Ignoring unreadable sync state for '{entity_type}': {e}"),
            }
        }

        ExternalSnapshot {
            transactions,
            invoices,
            budget_lines,
            sync_status_by_entity_type,
            rejected,
        }
    }
}

fn row_id(row: &Value, index: usize) -> String {
    row.get("external_id")
        .and_then(Value::as_str)
        .map_or_else(|| format!("#{index}"), str::to_string)
}

fn decode_rows<T: DeserializeOwned>(
    rows: Vec<Value>,
    entity: EntityKind,
    rejected: &mut Vec<RejectedRow>,
) -> Vec<T> {
    let mut decoded = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let record_id = row_id(&row, index);
        match serde_json::from_value(row) {
            Ok(value) => decoded.push(value),
            Err(e) => {
                warn!("Setting aside undecodable external {entity} '{record_id}': {e}");
                rejected.push(RejectedRow {
                    entity,
                    record_id,
                    message: e.to_string(),
                });
            }
        }
    }
    decoded
}

impl ExternalSyncStore for JsonSnapshotStore {
    async fn query(&self, building_id: &str, period: &Period) -> Result<ExternalSnapshot> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.unavailable(e))?;
        let mut buildings: BTreeMap<String, BuildingExport> =
            serde_json::from_str(&raw).map_err(|e| self.unavailable(e))?;

        let Some(mut export) = buildings.remove(building_id) else {
            warn!(
                "No external data for building {building_id} in {}",
                self.path.display()
            );
            return Ok(ExternalSnapshot::default());
        };

        export.narrow_to_period(period);
        let snapshot = export.decode();
        debug!(
            "External export for {building_id} ({}): {} transactions, {} budget lines, {} invoices, {} rejected",
            period.label(),
            snapshot.transactions.len(),
            snapshot.budget_lines.len(),
            snapshot.invoices.len(),
            snapshot.rejected.len()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        config::engine::EngineConfig,
        core::{
            dashboard::generate_financial_dashboard,
            model::FinanceRequest,
            source::LocalSnapshot,
        },
        test_utils::*,
    };
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// X1 is well formed. X2 has no `status` and an unknown `sync_status`.
    /// X3 is just as broken but dated outside April.
    const MIXED_EXPORT: &str = r#"{
        "b-1": {
            "transactions": [
                { "external_id": "X1", "building_id": "b-1", "transaction_type": "payment",
                  "reference": "April service charge", "category": "Service Charges",
                  "amount_minor_units": 100000, "transaction_date": "2025-04-01",
                  "status": "paid", "synced_at": "2025-04-30T08:00:00Z", "sync_status": "success" },
                { "external_id": "X2", "building_id": "b-1", "transaction_type": "payment",
                  "amount_minor_units": 5000, "transaction_date": "2025-04-02",
                  "synced_at": "2025-04-30T08:00:00Z", "sync_status": "failed" },
                { "external_id": "X3", "building_id": "b-1", "transaction_type": "payment",
                  "amount_minor_units": 5000, "transaction_date": "2025-03-02",
                  "synced_at": "2025-04-30T08:00:00Z", "sync_status": "failed" }
            ],
            "sync_status_by_entity_type": {
                "transactions": { "status": "success", "last_synced_at": "2025-04-30T08:00:00Z" },
                "invoices": { "status": "exploded" }
            }
        }
    }"#;

    fn april() -> Period {
        Period::month(2025, 4).unwrap()
    }

    fn write_raw(raw: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();
        file
    }

    fn write_export(buildings: &BTreeMap<String, ExternalSnapshot>) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(buildings).unwrap().as_bytes())
            .unwrap();
        file
    }

    #[tokio::test]
    async fn test_reads_building_and_narrows_period() -> Result<()> {
        let mut undated = ext_tx("X3", "charge", 10, "2025-04-01", "Cleaning");
        undated.transaction_date = None;
        let mut march_budget = ext_budget("XB0", "Insurance", 1_000, 1_000);
        march_budget.period = "2025-03".to_string();
        let snapshot = ExternalSnapshot {
            transactions: vec![
                ext_tx("X1", "payment", 100, "2025-04-01", "Service Charges"),
                ext_tx("X2", "payment", 200, "2025-03-31", "Service Charges"),
                undated,
            ],
            invoices: vec![ext_invoice("XI1", 50, "overdue", "2025-02-01")],
            budget_lines: vec![
                ext_budget("XB1", "Insurance", 1_000, 900),
                march_budget,
            ],
            ..Default::default()
        };
        let mut buildings = BTreeMap::new();
        buildings.insert("b-1".to_string(), snapshot);
        buildings.insert("b-2".to_string(), ExternalSnapshot::default());
        let file = write_export(&buildings);

        let result = JsonSnapshotStore::new(file.path()).query("b-1", &april()).await?;

        let ids: Vec<&str> = result.transactions.iter().map(|t| t.external_id.as_str()).collect();
        assert_eq!(ids, vec!["X1", "X3"]);
        assert_eq!(result.invoices.len(), 1);
        assert_eq!(result.budget_lines.len(), 1);
        assert_eq!(result.budget_lines[0].external_id, "XB1");
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_building_is_empty() -> Result<()> {
        let file = write_export(&BTreeMap::new());
        let result = JsonSnapshotStore::new(file.path()).query("b-9", &april()).await?;
        assert_eq!(result, ExternalSnapshot::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("absent.json"));

        let err = store.query("b-1", &april()).await.unwrap_err();

        assert!(matches!(err, Error::SourceUnavailable { .. }));
        assert!(err.to_string().starts_with("external source unavailable"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_unavailable() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = JsonSnapshotStore::new(file.path())
            .query("b-1", &april())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[test]
    fn test_sync_states_decode_from_export() {
        let raw = r#"{
            "b-1": {
                "transactions": [],
                "invoices": [],
                "budget_lines": [],
                "sync_status_by_entity_type": {
                    "invoices": { "status": "error", "last_synced_at": null }
                }
            }
        }"#;
        let buildings: BTreeMap<String, ExternalSnapshot> = serde_json::from_str(raw).unwrap();
        let state = buildings["b-1"].sync_status_by_entity_type["invoices"];
        assert_eq!(state.status, crate::core::model::SyncStatus::Error);
        assert_eq!(state.last_synced_at, None);
    }

    #[tokio::test]
    async fn test_undecodable_row_is_set_aside() -> Result<()> {
        let file = write_raw(MIXED_EXPORT);

        let result = JsonSnapshotStore::new(file.path()).query("b-1", &april()).await?;

        let ids: Vec<&str> = result.transactions.iter().map(|t| t.external_id.as_str()).collect();
        assert_eq!(ids, vec!["X1"]);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].entity, EntityKind::Transaction);
        assert_eq!(result.rejected[0].record_id, "X2");
        let states: Vec<&str> = result.sync_status_by_entity_type.keys().map(String::as_str).collect();
        assert_eq!(states, vec!["transactions"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_row_without_id_uses_position() -> Result<()> {
        let file = write_raw(
            r#"{ "b-1": { "budget_lines": [ { "period": "2025-04", "budget_amount": "lots" } ] } }"#,
        );

        let result = JsonSnapshotStore::new(file.path()).query("b-1", &april()).await?;

        assert!(result.budget_lines.is_empty());
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].entity, EntityKind::BudgetLine);
        assert_eq!(result.rejected[0].record_id, "#0");
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_row_does_not_make_dashboard_partial() -> Result<()> {
        init_test_tracing();
        let file = write_raw(MIXED_EXPORT);
        let request = FinanceRequest::at("b-1", april(), utc("2025-04-30T12:00:00Z"))?;

        let dashboard = generate_financial_dashboard(
            &StaticLocalStore(LocalSnapshot::default()),
            &JsonSnapshotStore::new(file.path()),
            &request,
            &EngineConfig::default(),
        )
        .await;

        assert!(!dashboard.summary.partial);
        assert_eq!(dashboard.summary.record_count, 1);
        assert_eq!(dashboard.summary.total_income, 100_000);
        assert_eq!(dashboard.diagnostics.malformed_count(), 1);
        Ok(())
    }
}
