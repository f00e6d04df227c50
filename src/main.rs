//! CLI entry point for the fare tracker.
//!
//! Provides subcommands for collecting a fare snapshot, listing stored
//! snapshots, and comparing two snapshots into a price-movement report.

mod infra;
mod services;

use crate::infra::travelpayouts::client::TravelpayoutsClient;
use crate::services::price_feed::PriceFeed;
use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use fare_tracker::analyzers::analyzer::run_comparison;
use fare_tracker::config::RouteConfig;
use fare_tracker::output::{ReportWriter, log_report};
use fare_tracker::snapshot::{Snapshot, SnapshotStore, date_key};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "fare_tracker")]
#[command(about = "Track airfare snapshots and compare price movements", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect today's fares for all monitored routes into a snapshot keyed by the local date
    Fetch {
        /// Directory holding one subdirectory per snapshot date
        #[arg(short, long, default_value = "snapshots")]
        snapshots_dir: PathBuf,

        /// JSON file listing routes as [["BCN", "MAD"], ...]
        #[arg(short, long)]
        routes: Option<PathBuf>,

        /// Maximum number of fares requested per route
        #[arg(short, long, default_value_t = 30)]
        limit: usize,

        /// Maximum number of concurrent route requests
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Compare two snapshots and write the analysis tables
    Compare {
        /// Earlier snapshot date (YYYYMMDD)
        #[arg(long)]
        date1: String,

        /// Later snapshot date (YYYYMMDD)
        #[arg(long)]
        date2: String,

        /// Directory holding one subdirectory per snapshot date
        #[arg(short, long, default_value = "snapshots")]
        snapshots_dir: PathBuf,

        /// Directory the report files are written to
        #[arg(short, long, default_value = "analysis_results")]
        results_dir: PathBuf,
    },
    /// List the stored snapshot dates
    ListSnapshots {
        /// Directory holding one subdirectory per snapshot date
        #[arg(short, long, default_value = "snapshots")]
        snapshots_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fare_tracker.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fare_tracker.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            snapshots_dir,
            routes,
            limit,
            concurrency,
        } => {
            let routes = match routes {
                Some(path) => RouteConfig::load(&path)?,
                None => RouteConfig::default(),
            };
            let token = std::env::var("TRAVELPAYOUTS_TOKEN")
                .context("TRAVELPAYOUTS_TOKEN must be set")?;
            let feed = TravelpayoutsClient::new(&token, limit)?;

            collect_snapshot(
                Arc::new(feed),
                &routes,
                &SnapshotStore::new(snapshots_dir),
                concurrency,
            )
            .await?;
        }
        Commands::Compare {
            date1,
            date2,
            snapshots_dir,
            results_dir,
        } => {
            let store = SnapshotStore::new(snapshots_dir);
            let report = run_comparison(&store, &date1, &date2)?;
            log_report(&report);
            ReportWriter::new(results_dir).write(&report)?;
        }
        Commands::ListSnapshots { snapshots_dir } => {
            let store = SnapshotStore::new(snapshots_dir);
            let dates = store.list()?;

            info!(total = dates.len(), dir = %store.root().display(), "Snapshots found");
            for date in dates {
                info!(date = %date_key(date), path = %store.snapshot_path(date).display(), "Snapshot");
            }
        }
    }

    Ok(())
}

/// Fetches every route concurrently and saves the results as today's snapshot.
///
/// A route that fails or returns nothing is logged and skipped, as is any row
/// the snapshot store would refuse to load back. The snapshot is keyed by the
/// local calendar date and only written when at least one fare was collected.
#[tracing::instrument(skip(feed, routes, store), fields(routes = routes.routes().len(), concurrency = concurrency))]
async fn collect_snapshot<F: PriceFeed + 'static>(
    feed: Arc<F>,
    routes: &RouteConfig,
    store: &SnapshotStore,
    concurrency: usize,
) -> Result<()> {
    let collected_at = Utc::now();
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));

    info!(
        route_count = routes.routes().len(),
        "Fetching fares for all routes"
    );

    let mut tasks = vec![];
    for route in routes.routes() {
        let sem = semaphore.clone();
        let feed = feed.clone();
        let task_route = route.clone();

        let route_span = tracing::info_span!("fetch_route", route = %route);

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire_owned().await?;
                feed.latest_prices(&task_route).await
            }
            .instrument(route_span),
        );
        tasks.push((route.clone(), task));
    }

    // Joined in route order so the snapshot rows keep the configured order.
    let mut observations = Vec::new();
    for (route, task) in tasks {
        match task.await {
            Ok(Ok(rows)) if rows.is_empty() => warn!(route = %route, "No fares returned"),
            Ok(Ok(rows)) => {
                info!(route = %route, flights = rows.len(), "Fares collected");
                observations.extend(rows.into_iter().filter(|obs| match obs.validate() {
                    Ok(()) => true,
                    Err(reason) => {
                        warn!(route = %route, gate = %obs.agent, %reason, "Dropping invalid fare");
                        false
                    }
                }));
            }
            Ok(Err(e)) => error!(route = %route, error = %e, "Route fetch failed"),
            Err(e) => error!(route = %route, error = %e, "Route task panicked"),
        }
    }

    if observations.is_empty() {
        warn!("No data found for any route, snapshot not written");
        return Ok(());
    }

    let snapshot = Snapshot::new(Local::now().date_naive(), observations);
    let summary = store.save(&snapshot, collected_at)?;

    info!(
        snapshot_date = %summary.snapshot_date,
        total_flights = summary.total_flights,
        routes_covered = summary.routes_covered,
        active_agents = summary.active_agents,
        price_min = summary.price_range_min,
        price_max = summary.price_range_max,
        average_price = %format!("{:.2}", summary.average_price),
        date_range_start = %summary.date_range_start,
        date_range_end = %summary.date_range_end,
        "Data collection completed"
    );

    for (route, price) in snapshot.cheapest_by_route() {
        info!(route = %route, price_eur = price, "Cheapest fare");
    }
    for (agent, count) in snapshot.agent_counts() {
        info!(gate = %agent, flights = count, "Agent distribution");
    }

    Ok(())
}
