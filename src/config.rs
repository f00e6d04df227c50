use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::analyzers::types::route_label;

/// Routes monitored when no route file is given.
const DEFAULT_ROUTES: &[(&str, &str)] = &[
    ("BCN", "MAD"),
    ("BCN", "FRA"),
    ("IST", "BCN"),
    ("BCN", "IST"),
    ("ESB", "IST"),
    ("IST", "NRT"),
    ("BCN", "LAX"),
    ("IST", "EZE"),
    ("ESB", "LAX"),
    ("NRT", "EZE"),
];

/// An origin/destination pair, stored as `["BCN", "MAD"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    pub fn new(origin: &str, destination: &str) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
        }
    }
}

impl From<(String, String)> for Route {
    fn from((origin, destination): (String, String)) -> Self {
        Self {
            origin,
            destination,
        }
    }
}

impl From<Route> for (String, String) {
    fn from(r: Route) -> Self {
        (r.origin, r.destination)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&route_label(&self.origin, &self.destination))
    }
}

/// The list of routes to collect fares for.
///
/// Stored as a plain JSON array on disk:
/// ```json
/// [["BCN", "MAD"], ["IST", "NRT"]]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RouteConfig {
    routes: Vec<Route>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            routes: DEFAULT_ROUTES
                .iter()
                .map(|(o, d)| Route::new(o, d))
                .collect(),
        }
    }
}

impl RouteConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read route file {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("invalid route file {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let routes: Vec<Route> = serde_json::from_str(content)?;
        if routes.is_empty() {
            bail!("no routes configured");
        }
        for r in &routes {
            for code in [&r.origin, &r.destination] {
                if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                    bail!("'{code}' in route {r} is not a 3-letter airport code");
                }
            }
        }
        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
