//! Planner configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::geometry::GeometryOptions;
use crate::matrix::MatrixOptions;
use crate::osrm::{OsrmConfig, Profile};
use crate::solver::SearchOptions;

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub osrm: OsrmConfig,
    pub matrix: MatrixOptions,
    pub geometry: GeometryOptions,
    pub search: SearchOptions,
    /// Default solver budget when a request does not set one.
    pub time_limit: Duration,
    /// Largest site count accepted in one planning request.
    pub max_sites: usize,
    /// Above this many stops no geometry is fetched.
    pub geometry_max_sites: usize,
    /// A custom start this close to a site reuses that site.
    pub start_tolerance_m: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            osrm: OsrmConfig::default(),
            matrix: MatrixOptions::default(),
            geometry: GeometryOptions::default(),
            search: SearchOptions::default(),
            time_limit: Duration::from_secs(30),
            max_sites: 300,
            geometry_max_sites: 300,
            start_tolerance_m: 10.0,
        }
    }
}

impl PlannerConfig {
    /// Defaults overridden by environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`PlannerConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("TOUR_OSRM_URL").filter(|url| !url.trim().is_empty()) {
            config.osrm.base_url = Some(url);
        }
        if let Some(profile) = lookup("TOUR_PROFILE") {
            config.osrm.profile = Profile::from_str(&profile)?;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TOUR_TIME_LIMIT_SECS")? {
            config.time_limit = Duration::from_secs(secs);
        }
        if let Some(max_sites) = parse_var::<usize>(&lookup, "TOUR_MAX_SITES")? {
            config.max_sites = max_sites;
            config.geometry_max_sites = max_sites;
        }
        if let Some(batch_size) = parse_var::<usize>(&lookup, "TOUR_BATCH_SIZE")? {
            if batch_size == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "TOUR_BATCH_SIZE",
                    value: batch_size.to_string(),
                });
            }
            config.matrix.batch_size = batch_size;
        }
        if let Some(pause_ms) = parse_var::<u64>(&lookup, "TOUR_REQUEST_PAUSE_MS")? {
            config.matrix.pause = Duration::from_millis(pause_ms);
            config.geometry.pause = Duration::from_millis(pause_ms);
        }
        if let Some(in_flight) = parse_var::<usize>(&lookup, "TOUR_MAX_IN_FLIGHT")? {
            config.matrix.max_in_flight = in_flight.max(1);
            config.geometry.max_in_flight = in_flight.max(1);
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
