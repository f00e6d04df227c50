use crate::analyzers::types::{ChangeBucket, PricingStrategy};

/// Buckets a single percentage change. Each cut point belongs to the lower bucket.
///
/// | Range             | Bucket         |
/// |-------------------|----------------|
/// | <= -5             | Major Drop     |
/// | (-5, -1]          | Minor Drop     |
/// | (-1, 1]           | Stable         |
/// | (1, 5]            | Minor Increase |
/// | > 5               | Major Increase |
/// | NaN               | Undefined      |
pub fn classify(change_pct: f64) -> ChangeBucket {
    match change_pct {
        p if p.is_nan() => ChangeBucket::Undefined,
        p if p <= -5.0 => ChangeBucket::MajorDrop,
        p if p <= -1.0 => ChangeBucket::MinorDrop,
        p if p <= 1.0 => ChangeBucket::Stable,
        p if p <= 5.0 => ChangeBucket::MinorIncrease,
        _ => ChangeBucket::MajorIncrease,
    }
}

/// Labels an agent by its mean percentage change.
///
/// | Range        | Strategy            |
/// |--------------|---------------------|
/// | > 5          | Aggressive Increase |
/// | (1, 5]       | Moderate Increase   |
/// | [-1, 1]      | Stable              |
/// | [-5, -1)     | Moderate Decrease   |
/// | < -5         | Aggressive Decrease |
pub fn pricing_strategy(avg_change_pct: Option<f64>) -> PricingStrategy {
    match avg_change_pct {
        None => PricingStrategy::Undefined,
        Some(x) if x.is_nan() => PricingStrategy::Undefined,
        Some(x) if x > 5.0 => PricingStrategy::AggressiveIncrease,
        Some(x) if x > 1.0 => PricingStrategy::ModerateIncrease,
        Some(x) if x.abs() <= 1.0 => PricingStrategy::Stable,
        Some(x) if x >= -5.0 => PricingStrategy::ModerateDecrease,
        Some(_) => PricingStrategy::AggressiveDecrease,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(-50.0), ChangeBucket::MajorDrop);
        assert_eq!(classify(-5.0), ChangeBucket::MajorDrop);
        assert_eq!(classify(-4.99), ChangeBucket::MinorDrop);
        assert_eq!(classify(-1.0), ChangeBucket::MinorDrop);
        assert_eq!(classify(-0.99), ChangeBucket::Stable);
        assert_eq!(classify(0.0), ChangeBucket::Stable);
        assert_eq!(classify(1.0), ChangeBucket::Stable);
        assert_eq!(classify(1.01), ChangeBucket::MinorIncrease);
        assert_eq!(classify(5.0), ChangeBucket::MinorIncrease);
        assert_eq!(classify(5.01), ChangeBucket::MajorIncrease);
    }

    #[test]
    fn test_classify_non_finite() {
        assert_eq!(classify(f64::NAN), ChangeBucket::Undefined);
        assert_eq!(classify(f64::INFINITY), ChangeBucket::MajorIncrease);
        assert_eq!(classify(f64::NEG_INFINITY), ChangeBucket::MajorDrop);
    }

    #[test]
    fn test_classify_is_deterministic() {
        for p in [-5.0, -1.0, 1.0, 5.0, f64::NAN] {
            let first = classify(p);
            for _ in 0..10 {
                assert_eq!(classify(p), first);
            }
        }
    }

    #[test]
    fn test_pricing_strategy_boundaries() {
        assert_eq!(pricing_strategy(Some(5.01)), PricingStrategy::AggressiveIncrease);
        assert_eq!(pricing_strategy(Some(5.0)), PricingStrategy::ModerateIncrease);
        assert_eq!(pricing_strategy(Some(1.01)), PricingStrategy::ModerateIncrease);
        assert_eq!(pricing_strategy(Some(1.0)), PricingStrategy::Stable);
        assert_eq!(pricing_strategy(Some(0.0)), PricingStrategy::Stable);
        assert_eq!(pricing_strategy(Some(-1.0)), PricingStrategy::Stable);
        assert_eq!(pricing_strategy(Some(-1.01)), PricingStrategy::ModerateDecrease);
        assert_eq!(pricing_strategy(Some(-5.0)), PricingStrategy::ModerateDecrease);
        assert_eq!(pricing_strategy(Some(-5.01)), PricingStrategy::AggressiveDecrease);
    }

    #[test]
    fn test_pricing_strategy_without_mean() {
        assert_eq!(pricing_strategy(None), PricingStrategy::Undefined);
    }

    #[test]
    fn test_strategy_differs_from_bucket_at_minus_one() {
        // A single record at -1 is a drop, an agent averaging -1 is stable.
        assert_eq!(classify(-1.0), ChangeBucket::MinorDrop);
        assert_eq!(pricing_strategy(Some(-1.0)), PricingStrategy::Stable);
    }
}
