use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use fare_tracker::config::Route;
use fare_tracker::fetch::auth::ApiKey;
use fare_tracker::fetch::{BasicClient, HttpClient, fetch_bytes};
use fare_tracker::snapshot::PriceObservation;
use serde::{Deserialize, Deserializer};

use crate::services::price_feed::PriceFeed;

const LATEST_PRICES_URL: &str = "https://api.travelpayouts.com/v2/prices/latest";

#[derive(Deserialize)]
struct LatestPricesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<ApiFare>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ApiFare {
    origin: String,
    destination: String,
    depart_date: NaiveDate,
    #[serde(default, deserialize_with = "lenient_date")]
    return_date: Option<NaiveDate>,
    gate: String,
    value: f64,
    #[serde(default)]
    trip_class: Option<u8>,
    #[serde(default)]
    number_of_changes: Option<u32>,
    #[serde(default)]
    found_at: Option<String>,
}

/// One-way fares come back with an empty or missing return date.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
}

impl From<ApiFare> for PriceObservation {
    fn from(f: ApiFare) -> Self {
        PriceObservation {
            origin: f.origin,
            destination: f.destination,
            depart_date: f.depart_date,
            agent: f.gate,
            price_eur: f.value,
            return_date: f.return_date,
            trip_class: f.trip_class,
            number_of_changes: f.number_of_changes,
            found_at: f.found_at,
        }
    }
}

/// Decodes a `v2/prices/latest` response body.
fn parse_latest_prices(body: &[u8]) -> Result<Vec<PriceObservation>> {
    let resp: LatestPricesResponse =
        serde_json::from_slice(body).context("failed to parse latest prices response")?;

    if !resp.success {
        return Err(anyhow!(
            "API reported failure: {}",
            resp.error.as_deref().unwrap_or("no error message")
        ));
    }

    Ok(resp.data.into_iter().map(PriceObservation::from).collect())
}

/// Fetches EUR fares from the Travelpayouts data API.
pub struct TravelpayoutsClient<C = ApiKey<BasicClient>> {
    http: C,
    limit: usize,
}

impl TravelpayoutsClient {
    pub fn new(token: &str, limit: usize) -> Result<Self> {
        let http = ApiKey::access_token(BasicClient::new()?, token)?;
        Ok(Self::with_client(http, limit))
    }
}

impl<C> TravelpayoutsClient<C> {
    pub fn with_client(http: C, limit: usize) -> Self {
        Self { http, limit }
    }

    fn query(&self, route: &Route) -> Vec<(&'static str, String)> {
        vec![
            ("currency", "eur".to_string()),
            ("origin", route.origin.clone()),
            ("destination", route.destination.clone()),
            ("show_to_affiliates", "true".to_string()),
            ("sorting", "price".to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

#[async_trait]
impl<C: HttpClient> PriceFeed for TravelpayoutsClient<C> {
    #[tracing::instrument(skip(self), fields(route = %route))]
    async fn latest_prices(&self, route: &Route) -> Result<Vec<PriceObservation>> {
        let body = fetch_bytes(&self.http, LATEST_PRICES_URL, &self.query(route))
            .await
            .with_context(|| format!("request for {route} failed"))?;
        parse_latest_prices(&body)
    }
}
