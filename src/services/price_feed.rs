//! Trait for sources of current fares.

use anyhow::Result;
use fare_tracker::config::Route;
use fare_tracker::snapshot::PriceObservation;

/// Abstraction over a fare provider (e.g., Travelpayouts).
#[async_trait::async_trait]
pub trait PriceFeed: Send + Sync {
    /// Returns the latest known fares for `route`, one observation per fare.
    async fn latest_prices(&self, route: &Route) -> Result<Vec<PriceObservation>>;
}
