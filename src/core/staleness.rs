//! Staleness and provenance annotation.
//!
//! Reads sync metadata that the external collaborator attached to its rows and folds it
//! into one [`Freshness`] per output value. Never creates or changes sync state.

use crate::core::{
    model::{Provenance, SyncStatus},
    source::EntitySyncState,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Sync freshness of an output value that has at least one external contributor.
///
/// `last_synced` is absent only when the status came from a sync run that never
/// reported a finish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Freshness {
    /// Most recent `synced_at` among the external contributors
    pub last_synced: Option<DateTime<Utc>>,
    /// Worst sync status among the external contributors
    pub sync_status: SyncStatus,
}

impl Freshness {
    /// Combines two annotations: latest sync time, worst status.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            last_synced: self.last_synced.max(other.last_synced),
            sync_status: self.sync_status.max(other.sync_status),
        }
    }
}

/// Freshness of a value built from `contributors`, or `None` when all of them are local.
pub fn track<'a, I>(contributors: I) -> Option<Freshness>
where
    I: IntoIterator<Item = &'a Provenance>,
{
    contributors
        .into_iter()
        .filter_map(Provenance::sync_meta)
        .map(|meta| Freshness {
            last_synced: Some(meta.synced_at),
            sync_status: meta.sync_status,
        })
        .reduce(Freshness::merge)
}

/// Folds the external store's per-entity sync states into a summary-level annotation.
///
/// The status becomes the worst of everything seen, even when no entity state carries a
/// finish time. The record-derived `last_synced` is kept when present; otherwise the
/// latest entity-level sync time is used.
#[must_use]
pub fn with_entity_states(
    tracked: Option<Freshness>,
    states: &BTreeMap<String, EntitySyncState>,
) -> Option<Freshness> {
    let from_states = states
        .values()
        .map(|state| state.status)
        .max()
        .map(|status| Freshness {
            last_synced: states.values().filter_map(|state| state.last_synced_at).max(),
            sync_status: status,
        });

    match (tracked, from_states) {
        (Some(tracked), Some(from_states)) => Some(Freshness {
            last_synced: tracked.last_synced.or(from_states.last_synced),
            sync_status: tracked.sync_status.max(from_states.sync_status),
        }),
        (tracked, from_states) => tracked.or(from_states),
    }
}

/// Whether the last external sync is older than `max_age` at `as_of`.
/// Values with no external contributor, or no known sync time, are never stale.
#[must_use]
pub fn is_stale(freshness: Option<&Freshness>, as_of: DateTime<Utc>, max_age: Duration) -> bool {
    freshness
        .and_then(|f| f.last_synced)
        .is_some_and(|last_synced| as_of - last_synced > max_age)
}
