use crate::analyzers::classify::pricing_strategy;
use crate::analyzers::types::{AgentSummary, DeltaRecord, RouteSummary};
use crate::analyzers::utility::{max, mean, min, sample_stddev};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Statistics shared by agent and route summaries.
struct GroupStats {
    count: usize,
    avg_price_diff: f64,
    std_price_diff: f64,
    avg_change_pct: Option<f64>,
    min_change_pct: Option<f64>,
    max_change_pct: Option<f64>,
}

impl GroupStats {
    /// `records` is never empty: groups only exist for keys that were seen.
    fn from_records(records: &[&DeltaRecord]) -> Self {
        let diffs: Vec<f64> = records.iter().map(|r| r.price_diff).collect();
        let avg_price_diff = mean(&diffs).unwrap_or(0.0);

        // Zero-price flights carry ±inf/NaN and would swamp the group mean.
        let pcts: Vec<f64> = records
            .iter()
            .map(|r| r.change_pct)
            .filter(|p| p.is_finite())
            .collect();

        Self {
            count: records.len(),
            avg_price_diff,
            std_price_diff: sample_stddev(&diffs, avg_price_diff),
            avg_change_pct: mean(&pcts),
            min_change_pct: min(&pcts),
            max_change_pct: max(&pcts),
        }
    }
}

/// Descending by mean change, groups without a mean last, ties by key.
fn by_change_desc(a: (Option<f64>, &str), b: (Option<f64>, &str)) -> Ordering {
    let by_pct = match (a.0, b.0) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_pct.then_with(|| a.1.cmp(b.1))
}

/// Summarizes price movement per selling agent.
pub fn aggregate_by_agent(records: &[DeltaRecord]) -> Vec<AgentSummary> {
    let mut groups: BTreeMap<&str, Vec<&DeltaRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.key.agent.as_str()).or_default().push(r);
    }

    let mut summaries: Vec<AgentSummary> = groups
        .into_iter()
        .map(|(agent, group)| {
            let stats = GroupStats::from_records(&group);
            let current: Vec<f64> = group.iter().map(|r| r.price_new).collect();

            AgentSummary {
                agent: agent.to_string(),
                total_flights: stats.count,
                avg_price_diff: stats.avg_price_diff,
                std_price_diff: stats.std_price_diff,
                avg_change_pct: stats.avg_change_pct,
                min_change_pct: stats.min_change_pct,
                max_change_pct: stats.max_change_pct,
                avg_current_price: mean(&current).unwrap_or(0.0),
                pricing_strategy: pricing_strategy(stats.avg_change_pct),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        by_change_desc(
            (a.avg_change_pct, a.agent.as_str()),
            (b.avg_change_pct, b.agent.as_str()),
        )
    });
    summaries
}

/// Summarizes price movement per `origin→destination` route.
pub fn aggregate_by_route(records: &[DeltaRecord]) -> Vec<RouteSummary> {
    let mut groups: BTreeMap<String, Vec<&DeltaRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.key.route()).or_default().push(r);
    }

    let mut summaries: Vec<RouteSummary> = groups
        .into_iter()
        .map(|(route, group)| {
            let stats = GroupStats::from_records(&group);
            let agents: BTreeSet<&str> = group.iter().map(|r| r.key.agent.as_str()).collect();

            RouteSummary {
                route,
                total_flights: stats.count,
                avg_price_diff: stats.avg_price_diff,
                std_price_diff: stats.std_price_diff,
                avg_change_pct: stats.avg_change_pct,
                min_change_pct: stats.min_change_pct,
                max_change_pct: stats.max_change_pct,
                distinct_agents: agents.len(),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        by_change_desc(
            (a.avg_change_pct, a.route.as_str()),
            (b.avg_change_pct, b.route.as_str()),
        )
    });
    summaries
}
