use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::analyzers::types::{
    AgentShare, AgentSummary, BucketCount, ChangeBucket, ComparisonReport, DeltaRecord,
    HeadlineStats, RouteSummary,
};
use crate::analyzers::utility::{max, mean, min, pct};

/// Headline scalars over a delta table. Every mean and extreme is `None` when
/// there is nothing to reduce.
pub fn headline(deltas: &[DeltaRecord]) -> HeadlineStats {
    let total = deltas.len();
    let changed = deltas.iter().filter(|d| d.price_diff != 0.0).count();

    let diffs: Vec<f64> = deltas.iter().map(|d| d.price_diff).collect();
    let pcts: Vec<f64> = deltas
        .iter()
        .map(|d| d.change_pct)
        .filter(|p| p.is_finite())
        .collect();

    let agents: BTreeSet<&str> = deltas.iter().map(|d| d.key.agent.as_str()).collect();
    let routes: BTreeSet<(&str, &str)> = deltas
        .iter()
        .map(|d| (d.key.origin.as_str(), d.key.destination.as_str()))
        .collect();

    HeadlineStats {
        total_flights: total,
        changed_flights: changed,
        changed_share_pct: (total > 0).then(|| pct(changed, total)),
        avg_change_pct: mean(&pcts),
        max_increase: max(&diffs),
        max_decrease: min(&diffs),
        active_agents: agents.len(),
        routes_monitored: routes.len(),
    }
}

/// Record count per bucket, in bucket order. Buckets with no records are kept.
pub fn bucket_distribution(deltas: &[DeltaRecord]) -> Vec<BucketCount> {
    let mut counts: BTreeMap<ChangeBucket, usize> = BTreeMap::new();
    for d in deltas {
        *counts.entry(d.change_bucket).or_default() += 1;
    }

    ChangeBucket::ALL
        .iter()
        .map(|&bucket| {
            let count = counts.get(&bucket).copied().unwrap_or(0);
            BucketCount {
                bucket,
                count,
                share_pct: pct(count, deltas.len()),
            }
        })
        .collect()
}

/// Share of matched flights quoted by each agent, largest first.
pub fn agent_share(deltas: &[DeltaRecord]) -> Vec<AgentShare> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for d in deltas {
        *counts.entry(d.key.agent.as_str()).or_default() += 1;
    }

    let mut shares: Vec<AgentShare> = counts
        .into_iter()
        .map(|(agent, count)| AgentShare {
            agent: agent.to_string(),
            count,
            share_pct: pct(count, deltas.len()),
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.agent.cmp(&b.agent)));
    shares
}

/// Combines the delta table and both summaries into one report.
pub fn assemble(
    older: NaiveDate,
    newer: NaiveDate,
    deltas: Vec<DeltaRecord>,
    agents: Vec<AgentSummary>,
    routes: Vec<RouteSummary>,
) -> ComparisonReport {
    ComparisonReport {
        older_date: older,
        newer_date: newer,
        headline: headline(&deltas),
        bucket_distribution: bucket_distribution(&deltas),
        agent_share: agent_share(&deltas),
        agents,
        routes,
        deltas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::FlightKey;

    fn record(origin: &str, agent: &str, old: f64, new: f64) -> DeltaRecord {
        DeltaRecord::new(
            FlightKey {
                origin: origin.to_string(),
                destination: "MAD".to_string(),
                depart_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                agent: agent.to_string(),
            },
            old,
            new,
        )
    }

    #[test]
    fn test_headline_empty() {
        let h = headline(&[]);
        assert_eq!(h.total_flights, 0);
        assert_eq!(h.changed_flights, 0);
        assert_eq!(h.changed_share_pct, None);
        assert_eq!(h.avg_change_pct, None);
        assert_eq!(h.max_increase, None);
        assert_eq!(h.max_decrease, None);
        assert_eq!(h.active_agents, 0);
        assert_eq!(h.routes_monitored, 0);
    }

    #[test]
    fn test_headline_values() {
        let deltas = vec![
            record("BCN", "A", 100.0, 110.0),
            record("BCN", "B", 100.0, 100.0),
            record("IST", "A", 200.0, 150.0),
            record("ESB", "C", 0.0, 20.0),
        ];
        let h = headline(&deltas);
        assert_eq!(h.total_flights, 4);
        assert_eq!(h.changed_flights, 3);
        assert_eq!(h.changed_share_pct, Some(75.0));
        // (10 + 0 - 25) / 3, the infinite change is left out
        assert_eq!(h.avg_change_pct, Some(-5.0));
        assert_eq!(h.max_increase, Some(20.0));
        assert_eq!(h.max_decrease, Some(-50.0));
        assert_eq!(h.active_agents, 3);
        assert_eq!(h.routes_monitored, 3);
    }

    #[test]
    fn test_bucket_distribution_keeps_all_buckets() {
        let deltas = vec![record("BCN", "A", 100.0, 100.0), record("BCN", "B", 100.0, 110.0)];
        let dist = bucket_distribution(&deltas);
        assert_eq!(dist.len(), ChangeBucket::ALL.len());
        let stable = dist.iter().find(|b| b.bucket == ChangeBucket::Stable).unwrap();
        assert_eq!(stable.count, 1);
        assert_eq!(stable.share_pct, 50.0);
        assert_eq!(dist.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_agent_share_order() {
        let deltas = vec![
            record("BCN", "B", 1.0, 1.0),
            record("BCN", "A", 1.0, 1.0),
            record("IST", "B", 1.0, 1.0),
            record("ESB", "C", 1.0, 1.0),
        ];
        let shares: Vec<(String, usize)> = agent_share(&deltas)
            .into_iter()
            .map(|s| (s.agent, s.count))
            .collect();
        assert_eq!(
            shares,
            vec![
                ("B".to_string(), 2),
                ("A".to_string(), 1),
                ("C".to_string(), 1)
            ]
        );
    }
}
