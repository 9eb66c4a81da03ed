//! OSRM HTTP adapter for travel-time tables and route geometry.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::coordinate::Coordinate;
use crate::error::{ConfigError, ServiceError};
use crate::traits::{RouteGeometryService, TableRequest, TravelTimeService};

/// Travel profile understood by the public OSRM instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Driving,
    Foot,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Driving => "driving",
            Profile::Foot => "foot",
        }
    }

    /// Public server hosting this profile.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Profile::Driving => "https://routing.openstreetmap.de/routed-car",
            Profile::Foot => "https://routing.openstreetmap.de/routed-foot",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "driving" | "car" => Ok(Profile::Driving),
            "foot" | "walking" => Ok(Profile::Foot),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    /// Overrides the profile's public server.
    pub base_url: Option<String>,
    pub profile: Profile,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            profile: Profile::Driving,
            timeout_secs: 60,
            user_agent: concat!("tour-planner/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl OsrmConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.profile.default_base_url())
            .trim_end_matches('/')
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    pub fn table_url(&self, request: &TableRequest<'_>) -> String {
        let mut url = format!(
            "{}/table/v1/{}/{}?annotations=duration",
            self.config.base_url(),
            self.config.profile,
            join_coordinates(request.coordinates)
        );
        if let Some(sources) = &request.sources {
            url.push_str("&sources=");
            url.push_str(&join_indices(sources));
        }
        if let Some(destinations) = &request.destinations {
            url.push_str("&destinations=");
            url.push_str(&join_indices(destinations));
        }
        url
    }

    pub fn route_url(&self, waypoints: &[Coordinate]) -> String {
        format!(
            "{}/route/v1/{}/{}?overview=full&geometries=geojson",
            self.config.base_url(),
            self.config.profile,
            join_coordinates(waypoints)
        )
    }

    fn get_text(&self, url: &str) -> Result<String, ServiceError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }
}

impl TravelTimeService for OsrmClient {
    fn durations(&self, request: &TableRequest<'_>) -> Result<Vec<Vec<Option<f64>>>, ServiceError> {
        let url = self.table_url(request);
        debug!(
            sources = request.source_count(),
            destinations = request.destination_count(),
            "requesting OSRM table"
        );
        parse_table(&self.get_text(&url)?)
    }
}

impl RouteGeometryService for OsrmClient {
    fn route(&self, waypoints: &[Coordinate]) -> Result<Vec<Coordinate>, ServiceError> {
        let url = self.route_url(waypoints);
        debug!(waypoints = waypoints.len(), "requesting OSRM route");
        parse_route(&self.get_text(&url)?)
    }
}

fn join_coordinates(coordinates: &[Coordinate]) -> String {
    coordinates
        .iter()
        .map(Coordinate::to_osrm)
        .collect::<Vec<_>>()
        .join(";")
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: GeoJsonLineString,
}

#[derive(Debug, Deserialize)]
struct GeoJsonLineString {
    /// GeoJSON order: `[lon, lat]`.
    coordinates: Vec<[f64; 2]>,
}

fn check_code(code: &str, message: Option<String>) -> Result<(), ServiceError> {
    if code == "Ok" {
        return Ok(());
    }
    Err(ServiceError::Rejected {
        code: code.to_string(),
        message: message.unwrap_or_default(),
    })
}

/// Parses a `table/v1` body. Null cells stay `None`.
pub fn parse_table(body: &str) -> Result<Vec<Vec<Option<f64>>>, ServiceError> {
    let response: OsrmTableResponse = serde_json::from_str(body)?;
    check_code(&response.code, response.message)?;
    response
        .durations
        .ok_or_else(|| ServiceError::Malformed("table response has no durations".to_string()))
}

/// Parses a `route/v1` GeoJSON body into (lat, lon) points.
pub fn parse_route(body: &str) -> Result<Vec<Coordinate>, ServiceError> {
    let response: OsrmRouteResponse = serde_json::from_str(body)?;
    check_code(&response.code, response.message)?;
    let route = response.routes.into_iter().next().ok_or(ServiceError::NoRoute)?;
    Ok(route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lon, lat]| Coordinate::new(lat, lon))
        .collect())
}
