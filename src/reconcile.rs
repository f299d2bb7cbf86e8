//! Diffs a freshly fetched snapshot against what is currently displayed.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::entity::{RankedEntity, RecordError, RouteRecord};

/// Outcome of reconciling one fetched snapshot.
#[derive(Debug, Default)]
pub struct Reconciled {
    /// New routes and routes whose speed differs from the displayed one,
    /// in snapshot order.
    pub changed: Vec<RankedEntity>,
    /// Records that failed validation and were left out.
    pub rejected: Vec<RecordError>,
    /// Valid records whose speed matched the displayed value.
    pub unchanged: usize,
}

/// Keeps only the records worth animating. The comparison is against the
/// displayed board, not the previous fetch, so an update that is still
/// queued is diffed again and superseded by the queue's upsert.
pub fn reconcile<I>(fetched: I, displayed: &[RankedEntity]) -> Reconciled
where
    I: IntoIterator<Item = RouteRecord>,
{
    let shown: HashMap<&str, f64> = displayed
        .iter()
        .map(|e| (e.key.as_str(), e.value))
        .collect();

    let mut out = Reconciled::default();

    for record in fetched {
        let entity = match RankedEntity::try_from(record) {
            Ok(entity) => entity,
            Err(e) => {
                debug!(error = %e, "Skipping malformed route record");
                out.rejected.push(e);
                continue;
            }
        };

        match shown.get(entity.key.as_str()) {
            Some(&value) if value == entity.value => out.unchanged += 1,
            _ => out.changed.push(entity),
        }
    }

    if !out.rejected.is_empty() {
        warn!(rejected = out.rejected.len(), "Snapshot contained malformed route records");
    }

    debug!(
        changed = out.changed.len(),
        unchanged = out.unchanged,
        rejected = out.rejected.len(),
        "Snapshot reconciled"
    );

    out
}
