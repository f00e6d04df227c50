//! Output formatting and persistence for comparison reports.
//!
//! Tables are written as CSV, headline figures as JSON. A report is written
//! all-or-nothing: files are staged under a `.tmp` suffix and only moved into
//! place once every one of them was written.

use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analyzers::types::{
    AgentShare, AgentSummary, BucketCount, ComparisonReport, DeltaRecord, HeadlineStats,
    RouteSummary,
};
use crate::error::ReportError;
use crate::snapshot::date_key;

/// Writes `rows` to a new CSV file at `path`, header first.
///
/// The header is taken from the first row, so an empty iterator produces an
/// empty file. Use [`write_table`] when the schema must survive with no rows.
pub fn write_records<I>(path: &Path, rows: I) -> csv::Result<()>
where
    I: IntoIterator,
    I::Item: Serialize,
{
    debug!(path = %path.display(), "Writing CSV");

    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes `headers` followed by `rows` to a new CSV file at `path`.
///
/// `headers` must list the serialized fields of the row type in order.
pub fn write_table<I>(path: &Path, headers: &[&str], rows: I) -> csv::Result<()>
where
    I: IntoIterator,
    I::Item: Serialize,
{
    debug!(path = %path.display(), "Writing CSV table");

    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Serialize)]
struct DeltaRow<'a> {
    origin: &'a str,
    destination: &'a str,
    depart_date: NaiveDate,
    gate: &'a str,
    route: String,
    price_eur_old: f64,
    price_eur_new: f64,
    price_diff: f64,
    change_pct: f64,
    change_type: &'static str,
}

impl DeltaRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "origin",
        "destination",
        "depart_date",
        "gate",
        "route",
        "price_eur_old",
        "price_eur_new",
        "price_diff",
        "change_pct",
        "change_type",
    ];
}

impl<'a> From<&'a DeltaRecord> for DeltaRow<'a> {
    fn from(d: &'a DeltaRecord) -> Self {
        Self {
            origin: &d.key.origin,
            destination: &d.key.destination,
            depart_date: d.key.depart_date,
            gate: &d.key.agent,
            route: d.key.route(),
            price_eur_old: d.price_old,
            price_eur_new: d.price_new,
            price_diff: d.price_diff,
            change_pct: d.change_pct,
            change_type: d.change_bucket.label(),
        }
    }
}

#[derive(Serialize)]
struct AgentRow<'a> {
    gate: &'a str,
    total_flights: usize,
    avg_price_diff: f64,
    std_price_diff: f64,
    avg_change_pct: Option<f64>,
    min_change_pct: Option<f64>,
    max_change_pct: Option<f64>,
    avg_current_price: f64,
    pricing_strategy: &'static str,
}

impl AgentRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "gate",
        "total_flights",
        "avg_price_diff",
        "std_price_diff",
        "avg_change_pct",
        "min_change_pct",
        "max_change_pct",
        "avg_current_price",
        "pricing_strategy",
    ];
}

impl<'a> From<&'a AgentSummary> for AgentRow<'a> {
    fn from(a: &'a AgentSummary) -> Self {
        Self {
            gate: &a.agent,
            total_flights: a.total_flights,
            avg_price_diff: round2(a.avg_price_diff),
            std_price_diff: round2(a.std_price_diff),
            avg_change_pct: a.avg_change_pct.map(round2),
            min_change_pct: a.min_change_pct.map(round2),
            max_change_pct: a.max_change_pct.map(round2),
            avg_current_price: round2(a.avg_current_price),
            pricing_strategy: a.pricing_strategy.label(),
        }
    }
}

#[derive(Serialize)]
struct RouteRow<'a> {
    route: &'a str,
    total_flights: usize,
    avg_price_diff: f64,
    std_price_diff: f64,
    avg_change_pct: Option<f64>,
    min_change_pct: Option<f64>,
    max_change_pct: Option<f64>,
    num_agents: usize,
}

impl RouteRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "route",
        "total_flights",
        "avg_price_diff",
        "std_price_diff",
        "avg_change_pct",
        "min_change_pct",
        "max_change_pct",
        "num_agents",
    ];
}

impl<'a> From<&'a RouteSummary> for RouteRow<'a> {
    fn from(r: &'a RouteSummary) -> Self {
        Self {
            route: &r.route,
            total_flights: r.total_flights,
            avg_price_diff: round2(r.avg_price_diff),
            std_price_diff: round2(r.std_price_diff),
            avg_change_pct: r.avg_change_pct.map(round2),
            min_change_pct: r.min_change_pct.map(round2),
            max_change_pct: r.max_change_pct.map(round2),
            num_agents: r.distinct_agents,
        }
    }
}

/// Headline part of a report, written as JSON.
#[derive(Serialize)]
struct ComparisonSummary<'a> {
    older_date: NaiveDate,
    newer_date: NaiveDate,
    headline: &'a HeadlineStats,
    bucket_distribution: &'a [BucketCount],
    agent_share: &'a [AgentShare],
}

/// Where a report's files ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub detailed: PathBuf,
    pub agents: PathBuf,
    pub routes: PathBuf,
    pub summary: PathBuf,
}

impl ReportPaths {
    fn all(&self) -> [&Path; 4] {
        [&self.detailed, &self.agents, &self.routes, &self.summary]
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Persists comparison reports below a results directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    results_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn paths(&self, older: NaiveDate, newer: NaiveDate) -> ReportPaths {
        let suffix = format!("{}_to_{}", date_key(older), date_key(newer));
        ReportPaths {
            detailed: self
                .results_dir
                .join(format!("detailed_comparison_{suffix}.csv")),
            agents: self.results_dir.join(format!("agent_analysis_{suffix}.csv")),
            routes: self.results_dir.join(format!("route_analysis_{suffix}.csv")),
            summary: self
                .results_dir
                .join(format!("comparison_summary_{suffix}.json")),
        }
    }

    /// Writes every file of `report`, or none of them.
    #[tracing::instrument(skip(self, report), fields(results_dir = %self.results_dir.display()))]
    pub fn write(&self, report: &ComparisonReport) -> Result<ReportPaths, ReportError> {
        fs::create_dir_all(&self.results_dir).map_err(|source| ReportError::Write {
            path: self.results_dir.clone(),
            source,
        })?;

        let paths = self.paths(report.older_date, report.newer_date);

        if let Err(e) = Self::stage(report, &paths) {
            Self::discard_staged(&paths);
            return Err(e);
        }

        let mut moved: Vec<&Path> = Vec::new();
        for path in paths.all() {
            let staged = staging_path(path);
            if let Err(source) = fs::rename(&staged, path) {
                Self::discard_staged(&paths);
                Self::remove_moved(&moved);
                return Err(ReportError::Write {
                    path: path.to_path_buf(),
                    source,
                });
            }
            moved.push(path);
        }

        info!(
            detailed = %paths.detailed.display(),
            agents = %paths.agents.display(),
            routes = %paths.routes.display(),
            summary = %paths.summary.display(),
            "Report written"
        );
        Ok(paths)
    }

    fn stage(report: &ComparisonReport, paths: &ReportPaths) -> Result<(), ReportError> {
        write_table(
            &staging_path(&paths.detailed),
            DeltaRow::HEADERS,
            report.deltas.iter().map(DeltaRow::from),
        )?;
        write_table(
            &staging_path(&paths.agents),
            AgentRow::HEADERS,
            report.agents.iter().map(AgentRow::from),
        )?;
        write_table(
            &staging_path(&paths.routes),
            RouteRow::HEADERS,
            report.routes.iter().map(RouteRow::from),
        )?;

        let summary = ComparisonSummary {
            older_date: report.older_date,
            newer_date: report.newer_date,
            headline: &report.headline,
            bucket_distribution: &report.bucket_distribution,
            agent_share: &report.agent_share,
        };
        let staged = staging_path(&paths.summary);
        fs::write(&staged, serde_json::to_string_pretty(&summary)?)
            .map_err(|source| ReportError::Write { path: staged, source })?;

        Ok(())
    }

    fn discard_staged(paths: &ReportPaths) {
        for path in paths.all() {
            let staged = staging_path(path);
            if staged.exists() {
                if let Err(e) = fs::remove_file(&staged) {
                    warn!(path = %staged.display(), error = %e, "Failed to remove staged file");
                }
            }
        }
    }

    /// Removes files already moved into place by a write that failed later.
    fn remove_moved(moved: &[&Path]) {
        for path in moved {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove partial report file");
            }
        }
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

/// Logs the headline figures and both summary tables.
pub fn log_report(report: &ComparisonReport) {
    let h = &report.headline;
    info!(
        older = %report.older_date,
        newer = %report.newer_date,
        total_flights = h.total_flights,
        changed_flights = h.changed_flights,
        changed_share_pct = %fmt_opt(h.changed_share_pct),
        avg_change_pct = %fmt_opt(h.avg_change_pct),
        max_increase = %fmt_opt(h.max_increase),
        max_decrease = %fmt_opt(h.max_decrease),
        active_agents = h.active_agents,
        routes_monitored = h.routes_monitored,
        "Analysis summary"
    );

    for b in &report.bucket_distribution {
        debug!(bucket = %b.bucket, count = b.count, share_pct = %format!("{:.1}", b.share_pct), "Change type");
    }

    for a in &report.agents {
        info!(
            gate = %a.agent,
            flights = a.total_flights,
            avg_price_diff = %format!("{:.2}", a.avg_price_diff),
            avg_change_pct = %fmt_opt(a.avg_change_pct),
            strategy = %a.pricing_strategy,
            "Agent pricing strategy"
        );
    }

    for r in &report.routes {
        info!(
            route = %r.route,
            flights = r.total_flights,
            avg_price_diff = %format!("{:.2}", r.avg_price_diff),
            avg_change_pct = %fmt_opt(r.avg_change_pct),
            agents = r.distinct_agents,
            "Route pricing trend"
        );
    }
}
