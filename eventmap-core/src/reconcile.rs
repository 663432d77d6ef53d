//! Merge freshly fetched listings into the persisted working set.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::record::{EventId, Listing, Record};

/// Counts describing what reconciliation did to the working set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub added: usize,
    pub changed: usize,
    pub unchanged: usize,
    /// Previously stored events that are no longer listed.
    pub removed: usize,
    /// Listings dropped for having no usable `event_id`.
    pub skipped: usize,
}

pub struct Reconciled {
    pub records: Vec<Record>,
    pub stats: ReconcileStats,
}

/// Merge `new` listings with the `old` working set, keeping `new`'s order.
///
/// Unchanged events keep their stored version, geocode and remote id
/// included. New or changed events come through as fetched, with no
/// enrichment. Stored events missing from `new` are left out.
pub fn reconcile(new: Vec<Listing>, old: &[Record]) -> SyncResult<Reconciled> {
    let old_by_id = index_by_id(old)?;

    let mut stats = ReconcileStats::default();
    let mut seen: HashSet<EventId> = HashSet::new();
    let mut records = Vec::with_capacity(new.len());

    for listing in new {
        let Some(record) = listing.into_record() else {
            stats.skipped += 1;
            continue;
        };

        if !seen.insert(record.event_id.clone()) {
            return Err(SyncError::DuplicateEventId {
                id: record.event_id.to_string(),
                origin: "fetched",
            });
        }

        match old_by_id.get(&record.event_id) {
            None => {
                debug!(event_id = %record.event_id, "new event");
                stats.added += 1;
                records.push(record);
            }
            Some(&previous) if previous.content == record.content => {
                stats.unchanged += 1;
                records.push(previous.clone());
            }
            Some(_) => {
                debug!(event_id = %record.event_id, "event changed upstream, dropping enrichment");
                stats.changed += 1;
                records.push(record);
            }
        }
    }

    stats.removed = old
        .iter()
        .filter(|r| !seen.contains(&r.event_id))
        .count();

    Ok(Reconciled { records, stats })
}

fn index_by_id(records: &[Record]) -> SyncResult<HashMap<&EventId, &Record>> {
    let mut by_id = HashMap::with_capacity(records.len());

    for record in records {
        if by_id.insert(&record.event_id, record).is_some() {
            return Err(SyncError::DuplicateEventId {
                id: record.event_id.to_string(),
                origin: "stored",
            });
        }
    }

    Ok(by_id)
}
