use crate::analyzers::aggregate::{aggregate_by_agent, aggregate_by_route};
use crate::analyzers::compare::compare;
use crate::analyzers::report::assemble;
use crate::analyzers::types::ComparisonReport;
use crate::error::SnapshotError;
use crate::snapshot::{Snapshot, SnapshotStore, parse_date_key};
use tracing::{info, warn};

/// Runs the comparison pipeline on two in-memory snapshots.
pub fn compare_snapshots(older: &Snapshot, newer: &Snapshot) -> ComparisonReport {
    let deltas = compare(older, newer);
    let agents = aggregate_by_agent(&deltas);
    let routes = aggregate_by_route(&deltas);
    assemble(older.date, newer.date, deltas, agents, routes)
}

/// Loads the snapshots for two `YYYYMMDD` keys and compares them.
///
/// The caller's labelling of older and newer is trusted. Both snapshots are
/// loaded before anything is computed, so a missing or malformed snapshot
/// fails the run without producing a report.
#[tracing::instrument(skip(store), fields(snapshots_dir = %store.root().display()))]
pub fn run_comparison(
    store: &SnapshotStore,
    older_key: &str,
    newer_key: &str,
) -> Result<ComparisonReport, SnapshotError> {
    let older_date = parse_date_key(older_key)?;
    let newer_date = parse_date_key(newer_key)?;
    if older_date >= newer_date {
        warn!(older = older_key, newer = newer_key, "Older snapshot is not before newer snapshot");
    }

    let older = store.load(older_date)?;
    let newer = store.load(newer_date)?;
    info!(
        older = older_key,
        older_records = older.len(),
        newer = newer_key,
        newer_records = newer.len(),
        "Comparing snapshots"
    );

    let report = compare_snapshots(&older, &newer);
    if report.deltas.is_empty() {
        warn!("Snapshots share no flights");
    }
    info!(
        matched = report.headline.total_flights,
        changed = report.headline.changed_flights,
        "Comparison complete"
    );

    Ok(report)
}
