use std::collections::HashMap;

use crate::analyzers::classify::classify;
use crate::analyzers::types::{DeltaRecord, FlightKey};
use crate::snapshot::Snapshot;

/// Percentage change from `price_old`.
///
/// A zero old price has no ratio: the result is `+inf` or `-inf` following
/// the sign of `price_diff`, and `NaN` when the price stayed at zero.
pub fn change_pct(price_old: f64, price_diff: f64) -> f64 {
    if price_old == 0.0 {
        if price_diff > 0.0 {
            f64::INFINITY
        } else if price_diff < 0.0 {
            f64::NEG_INFINITY
        } else {
            f64::NAN
        }
    } else {
        price_diff / price_old * 100.0
    }
}

impl DeltaRecord {
    pub fn new(key: FlightKey, price_old: f64, price_new: f64) -> Self {
        let price_diff = price_new - price_old;
        let change_pct = change_pct(price_old, price_diff);
        Self {
            key,
            price_old,
            price_new,
            price_diff,
            change_pct,
            change_bucket: classify(change_pct),
        }
    }
}

/// Inner-joins `newer` against `older` on [`FlightKey`].
///
/// Flights present on only one side are dropped. Repeated keys are not
/// collapsed: a key seen `n` times in `newer` and `m` times in `older`
/// yields `n * m` records. Output follows `newer`'s row order, then
/// `older`'s row order within a key.
pub fn compare(older: &Snapshot, newer: &Snapshot) -> Vec<DeltaRecord> {
    let mut old_prices: HashMap<FlightKey, Vec<f64>> = HashMap::new();
    for obs in &older.observations {
        old_prices.entry(obs.key()).or_default().push(obs.price_eur);
    }

    let mut deltas = Vec::new();
    for obs in &newer.observations {
        let key = obs.key();
        let Some(prices) = old_prices.get(&key) else {
            continue;
        };
        for &price_old in prices {
            deltas.push(DeltaRecord::new(key.clone(), price_old, obs.price_eur));
        }
    }

    tracing::debug!(
        older = older.len(),
        newer = newer.len(),
        matched = deltas.len(),
        "Snapshots joined"
    );

    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::ChangeBucket;
    use crate::snapshot::PriceObservation;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(origin: &str, destination: &str, agent: &str, price: f64) -> PriceObservation {
        PriceObservation::new(origin, destination, date(2025, 7, 1), agent, price)
    }

    fn snapshot(day: u32, observations: Vec<PriceObservation>) -> Snapshot {
        Snapshot::new(date(2025, 6, day), observations)
    }

    #[test]
    fn test_minor_increase_at_five_percent() {
        let older = snapshot(18, vec![obs("BCN", "MAD", "AgentX", 80.0)]);
        let newer = snapshot(19, vec![obs("BCN", "MAD", "AgentX", 84.0)]);

        let deltas = compare(&older, &newer);
        assert_eq!(deltas.len(), 1);
        let d = &deltas[0];
        assert_eq!(d.price_diff, 4.0);
        assert!((d.change_pct - 5.0).abs() < 1e-9);
        // 5% sits on the cut point and belongs to the lower bucket
        assert_eq!(d.change_bucket, ChangeBucket::MinorIncrease);
    }

    #[test]
    fn test_unmatched_flight_is_dropped() {
        let older = snapshot(
            18,
            vec![
                obs("IST", "NRT", "AgentY", 500.0),
                obs("BCN", "MAD", "AgentX", 80.0),
            ],
        );
        let newer = snapshot(19, vec![obs("BCN", "MAD", "AgentX", 80.0)]);

        let deltas = compare(&older, &newer);
        assert_eq!(deltas.len(), 1);
        assert!(deltas.iter().all(|d| d.key.origin != "IST"));
    }

    #[test]
    fn test_agent_is_part_of_the_key() {
        let older = snapshot(18, vec![obs("BCN", "MAD", "AgentX", 80.0)]);
        let newer = snapshot(19, vec![obs("BCN", "MAD", "AgentY", 80.0)]);
        assert!(compare(&older, &newer).is_empty());
    }

    #[test]
    fn test_no_overlap_yields_empty() {
        let older = snapshot(18, vec![obs("BCN", "MAD", "AgentX", 80.0)]);
        let newer = snapshot(19, vec![obs("IST", "BCN", "AgentX", 80.0)]);
        assert!(compare(&older, &newer).is_empty());
    }

    #[test]
    fn test_duplicate_keys_fan_out() {
        let older = snapshot(
            18,
            vec![
                obs("BCN", "MAD", "AgentX", 80.0),
                obs("BCN", "MAD", "AgentX", 120.0),
            ],
        );
        let newer = snapshot(
            19,
            vec![
                obs("BCN", "MAD", "AgentX", 90.0),
                obs("BCN", "MAD", "AgentX", 100.0),
                obs("BCN", "MAD", "AgentX", 110.0),
            ],
        );

        let deltas = compare(&older, &newer);
        assert_eq!(deltas.len(), 6);
        let pairs: Vec<(f64, f64)> = deltas.iter().map(|d| (d.price_new, d.price_old)).collect();
        assert_eq!(
            pairs,
            vec![
                (90.0, 80.0),
                (90.0, 120.0),
                (100.0, 80.0),
                (100.0, 120.0),
                (110.0, 80.0),
                (110.0, 120.0),
            ]
        );
    }

    #[test]
    fn test_diff_and_pct_arithmetic() {
        let older = snapshot(
            18,
            vec![
                obs("BCN", "MAD", "A", 123.45),
                obs("BCN", "FRA", "A", 99.99),
                obs("IST", "EZE", "A", 1020.0),
            ],
        );
        let newer = snapshot(
            19,
            vec![
                obs("BCN", "MAD", "A", 118.2),
                obs("BCN", "FRA", "A", 99.99),
                obs("IST", "EZE", "A", 1187.31),
            ],
        );

        for d in compare(&older, &newer) {
            assert_eq!(d.price_diff, d.price_new - d.price_old);
            let expected = d.price_diff / d.price_old * 100.0;
            assert!((d.change_pct - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_old_price_policy() {
        assert_eq!(change_pct(0.0, 10.0), f64::INFINITY);
        assert_eq!(change_pct(0.0, -10.0), f64::NEG_INFINITY);
        assert!(change_pct(0.0, 0.0).is_nan());

        let older = snapshot(
            18,
            vec![obs("BCN", "MAD", "A", 0.0), obs("BCN", "FRA", "A", 0.0)],
        );
        let newer = snapshot(
            19,
            vec![obs("BCN", "MAD", "A", 50.0), obs("BCN", "FRA", "A", 0.0)],
        );
        let deltas = compare(&older, &newer);
        assert_eq!(deltas[0].change_bucket, ChangeBucket::MajorIncrease);
        assert_eq!(deltas[1].change_bucket, ChangeBucket::Undefined);
    }

    #[test]
    fn test_compare_is_idempotent() {
        let older = snapshot(
            18,
            vec![
                obs("BCN", "MAD", "A", 80.0),
                obs("BCN", "MAD", "B", 0.0),
                obs("IST", "NRT", "A", 500.0),
            ],
        );
        let newer = snapshot(
            19,
            vec![
                obs("IST", "NRT", "A", 480.0),
                obs("BCN", "MAD", "B", 0.0),
                obs("BCN", "MAD", "A", 81.0),
            ],
        );

        let first = compare(&older, &newer);
        let second = compare(&older, &newer);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.key, b.key);
            assert_eq!(a.price_diff.to_bits(), b.price_diff.to_bits());
            assert_eq!(a.change_pct.to_bits(), b.change_pct.to_bits());
            assert_eq!(a.change_bucket, b.change_bucket);
        }
    }
}
