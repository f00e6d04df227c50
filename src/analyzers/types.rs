//! Data types used by the comparison pipeline.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Identity of a quoted flight across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FlightKey {
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    pub agent: String,
}

impl FlightKey {
    /// `origin→destination`, the grouping key for route summaries.
    pub fn route(&self) -> String {
        route_label(&self.origin, &self.destination)
    }
}

pub fn route_label(origin: &str, destination: &str) -> String {
    format!("{origin}→{destination}")
}

/// Qualitative bucket for a single percentage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ChangeBucket {
    #[serde(rename = "Major Drop")]
    MajorDrop,
    #[serde(rename = "Minor Drop")]
    MinorDrop,
    Stable,
    #[serde(rename = "Minor Increase")]
    MinorIncrease,
    #[serde(rename = "Major Increase")]
    MajorIncrease,
    /// Both prices were zero, so no ratio exists.
    Undefined,
}

impl ChangeBucket {
    /// All buckets in ascending order, `Undefined` last.
    pub const ALL: [ChangeBucket; 6] = [
        ChangeBucket::MajorDrop,
        ChangeBucket::MinorDrop,
        ChangeBucket::Stable,
        ChangeBucket::MinorIncrease,
        ChangeBucket::MajorIncrease,
        ChangeBucket::Undefined,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChangeBucket::MajorDrop => "Major Drop",
            ChangeBucket::MinorDrop => "Minor Drop",
            ChangeBucket::Stable => "Stable",
            ChangeBucket::MinorIncrease => "Minor Increase",
            ChangeBucket::MajorIncrease => "Major Increase",
            ChangeBucket::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for ChangeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label derived from an agent's mean percentage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PricingStrategy {
    #[serde(rename = "Aggressive Increase")]
    AggressiveIncrease,
    #[serde(rename = "Moderate Increase")]
    ModerateIncrease,
    Stable,
    #[serde(rename = "Moderate Decrease")]
    ModerateDecrease,
    #[serde(rename = "Aggressive Decrease")]
    AggressiveDecrease,
    /// The agent has no finite percentage change to average.
    Undefined,
}

impl PricingStrategy {
    pub fn label(self) -> &'static str {
        match self {
            PricingStrategy::AggressiveIncrease => "Aggressive Increase",
            PricingStrategy::ModerateIncrease => "Moderate Increase",
            PricingStrategy::Stable => "Stable",
            PricingStrategy::ModerateDecrease => "Moderate Decrease",
            PricingStrategy::AggressiveDecrease => "Aggressive Decrease",
            PricingStrategy::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for PricingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One matched pair of observations and the movement between them.
///
/// `change_pct` is `±inf` when the old price is zero and the new one is not,
/// and `NaN` when both are zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaRecord {
    pub key: FlightKey,
    pub price_old: f64,
    pub price_new: f64,
    pub price_diff: f64,
    pub change_pct: f64,
    pub change_bucket: ChangeBucket,
}

/// Per-agent statistics over a delta table.
///
/// Percentage statistics only consider finite changes and are `None` when
/// the agent has none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSummary {
    pub agent: String,
    pub total_flights: usize,
    pub avg_price_diff: f64,
    pub std_price_diff: f64,
    pub avg_change_pct: Option<f64>,
    pub min_change_pct: Option<f64>,
    pub max_change_pct: Option<f64>,
    pub avg_current_price: f64,
    pub pricing_strategy: PricingStrategy,
}

/// Per-route statistics over a delta table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub route: String,
    pub total_flights: usize,
    pub avg_price_diff: f64,
    pub std_price_diff: f64,
    pub avg_change_pct: Option<f64>,
    pub min_change_pct: Option<f64>,
    pub max_change_pct: Option<f64>,
    pub distinct_agents: usize,
}

/// Headline scalars of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineStats {
    pub total_flights: usize,
    pub changed_flights: usize,
    pub changed_share_pct: Option<f64>,
    pub avg_change_pct: Option<f64>,
    pub max_increase: Option<f64>,
    pub max_decrease: Option<f64>,
    pub active_agents: usize,
    pub routes_monitored: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketCount {
    pub bucket: ChangeBucket,
    pub count: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentShare {
    pub agent: String,
    pub count: usize,
    pub share_pct: f64,
}

/// Everything produced by one comparison of two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub older_date: NaiveDate,
    pub newer_date: NaiveDate,
    pub headline: HeadlineStats,
    pub bucket_distribution: Vec<BucketCount>,
    pub agent_share: Vec<AgentShare>,
    pub agents: Vec<AgentSummary>,
    pub routes: Vec<RouteSummary>,
    pub deltas: Vec<DeltaRecord>,
}
