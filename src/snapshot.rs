//! Dated snapshots of observed fares.
//!
//! Each snapshot is a directory named by its `YYYYMMDD` date key:
//!
//! ```text
//! snapshots/
//!   20250701/
//!     all_routes.csv
//!     snapshot_summary.json
//!     route_breakdown/
//!       bcn_mad_prices.csv
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::types::{FlightKey, route_label};
use crate::error::SnapshotError;
use crate::output::write_records;

const SNAPSHOT_FILE: &str = "all_routes.csv";
const SUMMARY_FILE: &str = "snapshot_summary.json";
const ROUTE_BREAKDOWN_DIR: &str = "route_breakdown";

/// A single fare quoted by an agent (`gate` in the feed) for one flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    #[serde(rename = "gate")]
    pub agent: String,
    pub price_eur: f64,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub return_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub trip_class: Option<u8>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub number_of_changes: Option<u32>,
    #[serde(default)]
    pub found_at: Option<String>,
}

impl PriceObservation {
    pub fn new(
        origin: &str,
        destination: &str,
        depart_date: NaiveDate,
        agent: &str,
        price_eur: f64,
    ) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            depart_date,
            agent: agent.to_string(),
            price_eur,
            return_date: None,
            trip_class: None,
            number_of_changes: None,
            found_at: None,
        }
    }

    pub fn key(&self) -> FlightKey {
        FlightKey {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            depart_date: self.depart_date,
            agent: self.agent.clone(),
        }
    }

    pub fn route(&self) -> String {
        route_label(&self.origin, &self.destination)
    }

    /// Checks the row against what [`SnapshotStore::load`] accepts.
    pub fn validate(&self) -> Result<(), String> {
        if !is_airport_code(&self.origin) {
            return Err(format!("origin '{}' is not a 3-letter code", self.origin));
        }
        if !is_airport_code(&self.destination) {
            return Err(format!(
                "destination '{}' is not a 3-letter code",
                self.destination
            ));
        }
        if self.agent.trim().is_empty() {
            return Err("empty gate".to_string());
        }
        if !self.price_eur.is_finite() || self.price_eur < 0.0 {
            return Err(format!("invalid price {}", self.price_eur));
        }
        Ok(())
    }
}

fn is_airport_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

/// All observations collected on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub observations: Vec<PriceObservation>,
}

impl Snapshot {
    pub fn new(date: NaiveDate, observations: Vec<PriceObservation>) -> Self {
        Self { date, observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Lowest observed price per route, cheapest route first.
    pub fn cheapest_by_route(&self) -> Vec<(String, f64)> {
        let mut cheapest: BTreeMap<String, f64> = BTreeMap::new();
        for obs in &self.observations {
            cheapest
                .entry(obs.route())
                .and_modify(|p| *p = p.min(obs.price_eur))
                .or_insert(obs.price_eur);
        }
        let mut routes: Vec<_> = cheapest.into_iter().collect();
        routes.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        routes
    }

    /// Number of observations per agent, most active first.
    pub fn agent_counts(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for obs in &self.observations {
            *counts.entry(obs.agent.as_str()).or_default() += 1;
        }
        let mut agents: Vec<_> = counts
            .into_iter()
            .map(|(agent, count)| (agent.to_string(), count))
            .collect();
        agents.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        agents
    }
}

/// Overview written next to each saved snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub collection_timestamp: DateTime<Utc>,
    pub snapshot_date: String,
    pub total_flights: usize,
    pub routes_covered: usize,
    pub active_agents: usize,
    pub price_range_min: f64,
    pub price_range_max: f64,
    pub average_price: f64,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
}

impl SnapshotSummary {
    /// Returns `None` for an empty snapshot.
    pub fn from_snapshot(snapshot: &Snapshot, collected_at: DateTime<Utc>) -> Option<Self> {
        let obs = &snapshot.observations;
        let first = obs.first()?;

        let mut price_min = first.price_eur;
        let mut price_max = first.price_eur;
        let mut price_sum = 0.0;
        let mut date_start = first.depart_date;
        let mut date_end = first.depart_date;
        let mut routes = BTreeSet::new();
        let mut agents = BTreeSet::new();

        for o in obs {
            price_min = price_min.min(o.price_eur);
            price_max = price_max.max(o.price_eur);
            price_sum += o.price_eur;
            date_start = date_start.min(o.depart_date);
            date_end = date_end.max(o.depart_date);
            routes.insert((o.origin.as_str(), o.destination.as_str()));
            agents.insert(o.agent.as_str());
        }

        Some(Self {
            collection_timestamp: collected_at,
            snapshot_date: date_key(snapshot.date),
            total_flights: obs.len(),
            routes_covered: routes.len(),
            active_agents: agents.len(),
            price_range_min: price_min,
            price_range_max: price_max,
            average_price: price_sum / obs.len() as f64,
            date_range_start: date_start,
            date_range_end: date_end,
        })
    }
}

/// Formats a date as its `YYYYMMDD` snapshot key.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Parses a `YYYYMMDD` snapshot key.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, SnapshotError> {
    if key.len() != 8 || !key.chars().all(|c| c.is_ascii_digit()) {
        return Err(SnapshotError::InvalidDateKey(key.to_string()));
    }
    NaiveDate::parse_from_str(key, "%Y%m%d")
        .map_err(|_| SnapshotError::InvalidDateKey(key.to_string()))
}

/// Reads and writes snapshots below a root directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date_key(date))
    }

    pub fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.snapshot_dir(date).join(SNAPSHOT_FILE)
    }

    /// Loads the snapshot for `date`.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::NotFound`] when no snapshot exists for the date,
    /// [`SnapshotError::Malformed`] for a row that cannot be read or fails
    /// validation, and [`SnapshotError::Empty`] when the table has no rows.
    #[tracing::instrument(skip(self), fields(date = %date))]
    pub fn load(&self, date: NaiveDate) -> Result<Snapshot, SnapshotError> {
        let path = self.snapshot_path(date);
        if !path.exists() {
            return Err(SnapshotError::NotFound(path));
        }

        let mut rdr = csv::Reader::from_path(&path)?;
        let mut observations = Vec::new();

        for (idx, result) in rdr.deserialize::<PriceObservation>().enumerate() {
            // Header is line 1.
            let row = idx + 2;
            let obs = result.map_err(|e| SnapshotError::Malformed {
                path: path.clone(),
                row,
                reason: e.to_string(),
            })?;
            obs.validate().map_err(|reason| SnapshotError::Malformed {
                path: path.clone(),
                row,
                reason,
            })?;
            observations.push(obs);
        }

        if observations.is_empty() {
            return Err(SnapshotError::Empty(path));
        }

        debug!(records = observations.len(), "Snapshot loaded");
        Ok(Snapshot::new(date, observations))
    }

    /// Writes the snapshot table, one table per route and a JSON summary.
    ///
    /// Every row is validated first; a row that [`SnapshotStore::load`] would
    /// reject fails the save with [`SnapshotError::Malformed`] and nothing is written.
    #[tracing::instrument(skip(self, snapshot), fields(date = %snapshot.date, records = snapshot.len()))]
    pub fn save(
        &self,
        snapshot: &Snapshot,
        collected_at: DateTime<Utc>,
    ) -> Result<SnapshotSummary, SnapshotError> {
        let dir = self.snapshot_dir(snapshot.date);
        let summary = SnapshotSummary::from_snapshot(snapshot, collected_at)
            .ok_or_else(|| SnapshotError::Empty(dir.join(SNAPSHOT_FILE)))?;

        for (idx, obs) in snapshot.observations.iter().enumerate() {
            obs.validate().map_err(|reason| SnapshotError::Malformed {
                path: dir.join(SNAPSHOT_FILE),
                // Row numbers as they would appear in the written file.
                row: idx + 2,
                reason,
            })?;
        }

        let breakdown_dir = dir.join(ROUTE_BREAKDOWN_DIR);
        fs::create_dir_all(&breakdown_dir)?;

        let mut by_route: BTreeMap<(&str, &str), Vec<&PriceObservation>> = BTreeMap::new();
        for obs in &snapshot.observations {
            by_route
                .entry((obs.origin.as_str(), obs.destination.as_str()))
                .or_default()
                .push(obs);
        }
        for ((origin, destination), rows) in by_route {
            let file = format!(
                "{}_{}_prices.csv",
                origin.to_lowercase(),
                destination.to_lowercase()
            );
            write_records(&breakdown_dir.join(file), rows)?;
        }

        write_records(&dir.join(SNAPSHOT_FILE), &snapshot.observations)?;
        fs::write(
            dir.join(SUMMARY_FILE),
            serde_json::to_string_pretty(&summary)?,
        )?;

        info!(dir = %dir.display(), "Snapshot saved");
        Ok(summary)
    }

    /// Date keys of all stored snapshots, oldest first.
    pub fn list(&self) -> Result<Vec<NaiveDate>, SnapshotError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut dates = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Ok(date) = parse_date_key(&name) {
                if entry.path().join(SNAPSHOT_FILE).exists() {
                    dates.push(date);
                }
            }
        }

        dates.sort();
        Ok(dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn write_snapshot(store: &SnapshotStore, day: NaiveDate, body: &str) {
        let dir = store.snapshot_dir(day);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SNAPSHOT_FILE), body).unwrap();
    }

    #[test]
    fn test_parse_date_key() {
        assert_eq!(parse_date_key("20250701").unwrap(), date(2025, 7, 1));
        assert!(matches!(
            parse_date_key("2025-07-01"),
            Err(SnapshotError::InvalidDateKey(_))
        ));
        assert!(parse_date_key("20251301").is_err());
        assert!(parse_date_key("2025070").is_err());
        assert_eq!(date_key(date(2025, 7, 1)), "20250701");
    }

    #[test]
    fn test_load_missing_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let err = store.load(date(2025, 7, 1)).unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)));
    }

    #[test]
    fn test_load_ignores_extra_columns() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let day = date(2025, 7, 1);
        write_snapshot(
            &store,
            day,
            "origin,destination,depart_date,return_date,gate,price_eur,trip_class,number_of_changes,distance,actual\n\
             BCN,MAD,2025-07-15,,AgentX,80.0,0,0,483,True\n\
             BCN,MAD,2025-07-15,2025-07-20,AgentY,92.5,0,1.0,483,True\n",
        );

        let snapshot = store.load(day).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.observations[0].agent, "AgentX");
        assert_eq!(snapshot.observations[0].return_date, None);
        assert_eq!(snapshot.observations[1].return_date, Some(date(2025, 7, 20)));
        // "1.0" is not a valid u32 and is dropped rather than failing the row
        assert_eq!(snapshot.observations[1].number_of_changes, None);
    }

    #[test]
    fn test_load_rejects_negative_price() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let day = date(2025, 7, 1);
        write_snapshot(
            &store,
            day,
            "origin,destination,depart_date,gate,price_eur\nBCN,MAD,2025-07-15,AgentX,-1\n",
        );

        match store.load(day).unwrap_err() {
            SnapshotError::Malformed { row, .. } => assert_eq!(row, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_rejects_bad_airport_code() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let day = date(2025, 7, 1);
        write_snapshot(
            &store,
            day,
            "origin,destination,depart_date,gate,price_eur\nBARCELONA,MAD,2025-07-15,AgentX,10\n",
        );

        assert!(matches!(
            store.load(day),
            Err(SnapshotError::Malformed { .. })
        ));
    }

    #[test]
    fn test_load_empty_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let day = date(2025, 7, 1);
        write_snapshot(&store, day, "origin,destination,depart_date,gate,price_eur\n");

        assert!(matches!(store.load(day), Err(SnapshotError::Empty(_))));
    }

    #[test]
    fn test_save_then_load_and_list() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let day = date(2025, 7, 1);
        let snapshot = Snapshot::new(
            day,
            vec![
                PriceObservation::new("BCN", "MAD", date(2025, 7, 15), "AgentX", 80.0),
                PriceObservation::new("IST", "NRT", date(2025, 8, 10), "AgentY", 500.0),
            ],
        );

        let summary = store.save(&snapshot, Utc::now()).unwrap();
        assert_eq!(summary.snapshot_date, "20250701");
        assert_eq!(summary.total_flights, 2);
        assert_eq!(summary.routes_covered, 2);
        assert_eq!(summary.price_range_max, 500.0);
        assert_eq!(summary.average_price, 290.0);
        assert_eq!(summary.date_range_end, date(2025, 8, 10));

        let dir = store.snapshot_dir(day);
        assert!(dir.join(SUMMARY_FILE).exists());
        assert!(dir.join(ROUTE_BREAKDOWN_DIR).join("bcn_mad_prices.csv").exists());
        assert!(dir.join(ROUTE_BREAKDOWN_DIR).join("ist_nrt_prices.csv").exists());

        assert_eq!(store.load(day).unwrap(), snapshot);
        assert_eq!(store.list().unwrap(), vec![day]);
    }

    #[test]
    fn test_save_rejects_rows_load_would_reject() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let day = date(2025, 7, 1);
        let snapshot = Snapshot::new(
            day,
            vec![
                PriceObservation::new("BCN", "MAD", date(2025, 7, 15), "AgentX", 80.0),
                PriceObservation::new("BCN", "MAD", date(2025, 7, 15), "", 75.0),
            ],
        );

        match store.save(&snapshot, Utc::now()).unwrap_err() {
            SnapshotError::Malformed { row, reason, .. } => {
                assert_eq!(row, 3);
                assert_eq!(reason, "empty gate");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!store.snapshot_dir(day).exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_save_empty_snapshot_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let snapshot = Snapshot::new(date(2025, 7, 1), vec![]);
        assert!(matches!(
            store.save(&snapshot, Utc::now()),
            Err(SnapshotError::Empty(_))
        ));
    }

    #[test]
    fn test_list_skips_unrelated_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        write_snapshot(&store, date(2025, 7, 2), "origin\n");
        write_snapshot(&store, date(2025, 7, 1), "origin\n");
        fs::create_dir_all(tmp.path().join("notes")).unwrap();
        fs::create_dir_all(tmp.path().join("20250703")).unwrap();

        assert_eq!(
            store.list().unwrap(),
            vec![date(2025, 7, 1), date(2025, 7, 2)]
        );
    }

    #[test]
    fn test_cheapest_and_agent_counts() {
        let d = date(2025, 7, 15);
        let snapshot = Snapshot::new(
            date(2025, 7, 1),
            vec![
                PriceObservation::new("BCN", "MAD", d, "AgentX", 80.0),
                PriceObservation::new("BCN", "MAD", d, "AgentY", 60.0),
                PriceObservation::new("IST", "NRT", d, "AgentX", 500.0),
            ],
        );

        assert_eq!(
            snapshot.cheapest_by_route(),
            vec![("BCN→MAD".to_string(), 60.0), ("IST→NRT".to_string(), 500.0)]
        );
        assert_eq!(
            snapshot.agent_counts(),
            vec![("AgentX".to_string(), 2), ("AgentY".to_string(), 1)]
        );
    }
}
